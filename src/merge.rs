use crate::value::{Table, Value};

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a map for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Map(base_tbl)), Value::Map(overlay_tbl)) => {
                base.insert(key, Value::Map(deep_merge(base_tbl, overlay_tbl)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Copy every key of `inherited` that `local` lacks and return the copied
/// keys. Shallow: a key present in `local` keeps its value even when both
/// sides hold maps.
pub fn fill_missing(local: &mut Table, inherited: &Table) -> Vec<String> {
    let mut copied = Vec::new();
    for (key, value) in inherited {
        if !local.contains_key(key) {
            local.insert(key.clone(), value.clone());
            copied.push(key.clone());
        }
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::table_get;

    fn table(entries: &[(&str, Value)]) -> Table {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn disjoint_keys_merge() {
        let base = table(&[("optimizer", Value::from("adam"))]);
        let overlay = table(&[("epochs", Value::from(30))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["optimizer"], Value::from("adam"));
        assert_eq!(merged["epochs"], Value::from(30));
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let base = table(&[("epochs", Value::from(10))]);
        let overlay = table(&[("epochs", Value::from(30))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["epochs"], Value::from(30));
    }

    #[test]
    fn nested_maps_recurse() {
        let base = table(&[(
            "net",
            Value::Map(table(&[
                ("name", Value::from("resnet18")),
                ("num_layers", Value::from(18)),
            ])),
        )]);
        let overlay = table(&[("net", Value::Map(table(&[("num_layers", Value::from(50))])))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(table_get(&merged, "net.name"), Some(&Value::from("resnet18")));
        assert_eq!(table_get(&merged, "net.num_layers"), Some(&Value::from(50)));
    }

    #[test]
    fn overlay_scalar_replaces_map() {
        let base = table(&[("net", Value::Map(table(&[("name", Value::from("x"))])))]);
        let overlay = table(&[("net", Value::from("flat_string"))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["net"], Value::from("flat_string"));
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = table(&[("epochs", Value::from(10))]);
        assert_eq!(deep_merge(base.clone(), Table::new()), base);
    }

    #[test]
    fn fill_missing_keeps_local_values() {
        let mut local = table(&[("num_layers", Value::from(18))]);
        let inherited = table(&[
            ("num_layers", Value::from(20)),
            ("use_skip", Value::from(true)),
        ]);
        let copied = fill_missing(&mut local, &inherited);
        assert_eq!(copied, vec!["use_skip".to_string()]);
        assert_eq!(local["num_layers"], Value::from(18));
        assert_eq!(local["use_skip"], Value::from(true));
    }

    #[test]
    fn fill_missing_is_shallow() {
        let mut local = table(&[("opt", Value::Map(table(&[("lr", Value::from(0.1))])))]);
        let inherited = table(&[(
            "opt",
            Value::Map(table(&[
                ("lr", Value::from(0.5)),
                ("momentum", Value::from(0.9)),
            ])),
        )]);
        fill_missing(&mut local, &inherited);
        assert!(table_get(&local, "opt.momentum").is_none());
        assert_eq!(table_get(&local, "opt.lr"), Some(&Value::from(0.1)));
    }
}
