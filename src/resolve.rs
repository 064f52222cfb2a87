//! Inheritance resolution: replace every inheritance reference in a tree
//! with the fields of the catalog entry it points at.
//!
//! Resolution works level by level:
//!
//! 1. While the current map holds the reserved key (`base` by default), remove
//!    it, look its dotted path up in the catalog, and copy in every key of the
//!    located entry that the map does not already have. Local values always
//!    win. A copied-in reserved key is picked up on the next iteration, which
//!    is how chained bases resolve.
//! 2. Recurse into every value that is a map, so nested groups can declare
//!    their own base independently.
//!
//! The input tree is never mutated; resolution works on an owned copy. A
//! reference back to an entry the current map was inherited from fails with
//! [`CyclicBase`](RunfigError::CyclicBase) instead of looping.

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::BaseCatalog;
use crate::error::RunfigError;
use crate::merge::fill_missing;
use crate::value::{Table, Value};

/// The default reserved inheritance key.
pub const DEFAULT_BASE_KEY: &str = "base";

/// Resolves inheritance references against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a BaseCatalog,
    base_key: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a BaseCatalog) -> Self {
        Self {
            catalog,
            base_key: DEFAULT_BASE_KEY,
        }
    }

    /// Use a different reserved key for inheritance references.
    pub fn with_base_key(mut self, base_key: &'a str) -> Self {
        self.base_key = base_key;
        self
    }

    pub fn base_key(&self) -> &str {
        self.base_key
    }

    /// Resolve every inheritance reference in `tree`, at any depth.
    pub fn resolve(&self, tree: &Table) -> Result<Table, RunfigError> {
        let mut resolved = tree.clone();
        self.resolve_level(&mut resolved, "", &[])?;
        Ok(resolved)
    }

    /// `lineage` lists the catalog entries the current map was copied from.
    fn resolve_level(
        &self,
        table: &mut Table,
        at: &str,
        lineage: &[String],
    ) -> Result<(), RunfigError> {
        let mut chain: Vec<String> = Vec::new();
        // Copied-in key -> index in `chain` of the entry that supplied it.
        let mut inherited: BTreeMap<String, usize> = BTreeMap::new();
        while let Some(reference) = table.remove(self.base_key) {
            let key = join(at, self.base_key);
            let path = base_path(&reference, &key)?;
            if lineage.contains(&path) || chain.contains(&path) {
                let mut cycle: Vec<&str> = lineage.iter().chain(&chain).map(String::as_str).collect();
                cycle.push(&path);
                return Err(RunfigError::CyclicBase {
                    chain: cycle.join(" -> "),
                });
            }
            let base = self.catalog.lookup(&path)?;
            debug!(at = %display_at(at), base = %path, "Resolved base");
            let supplier = chain.len();
            inherited.extend(fill_missing(table, base).into_iter().map(|key| (key, supplier)));
            chain.push(path);
        }

        for (key, value) in table.iter_mut() {
            if let Value::Map(sub) = value {
                // An inherited group descends from its supplier and the entries
                // that led to it, not from entries later in the chain.
                let sub_lineage: Vec<String> = match inherited.get(key) {
                    Some(&supplier) => lineage.iter().chain(&chain[..=supplier]).cloned().collect(),
                    None => lineage.to_vec(),
                };
                self.resolve_level(sub, &join(at, key), &sub_lineage)?;
            }
        }
        Ok(())
    }
}

/// Resolve `tree` against `catalog` with the default reserved key.
pub fn resolve(tree: &Table, catalog: &BaseCatalog) -> Result<Table, RunfigError> {
    Resolver::new(catalog).resolve(tree)
}

/// Validate the value of a reserved key and return its dotted path.
fn base_path(reference: &Value, key: &str) -> Result<String, RunfigError> {
    let invalid = |reason: String| RunfigError::InvalidBaseKey {
        key: key.to_string(),
        reason,
    };
    let Value::String(path) = reference else {
        return Err(invalid(format!(
            "expected a dotted path string, found {}",
            reference.type_name()
        )));
    };
    if path.trim().is_empty() {
        return Err(invalid("the path is empty".into()));
    }
    if path.split('.').any(str::is_empty) {
        return Err(invalid(format!("'{path}' has an empty segment")));
    }
    Ok(path.clone())
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn display_at(at: &str) -> &str {
    if at.is_empty() { "<root>" } else { at }
}
