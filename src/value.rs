//! The configuration tree shared by every stage of the pipeline.
//!
//! A [`Table`] maps non-empty string keys to [`Value`]s. Values are a closed
//! tagged union, so every walk over a tree (merging, resolving, prompting,
//! serializing) is an exhaustive `match`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::RunfigError;

/// A nested configuration map.
pub type Table = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Sequence(Vec<Value>),
    /// Fixed-arity, order-preserving. Distinct from [`Value::Sequence`].
    Tuple(Vec<Value>),
    /// Unordered and deduplicated; build with [`Value::set`].
    Set(Vec<Value>),
    Date(NaiveDate),
    Map(Table),
}

impl Value {
    /// Build a set, dropping duplicate items while keeping first occurrences.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Value {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(unique)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Date(_) => "date",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Map(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Value::Map(t) => Some(t),
            _ => None,
        }
    }

    /// Render the value in the literal grammar understood by
    /// [`parse_literal`](crate::literal::parse_literal).
    ///
    /// Top-level strings are written raw; strings nested in collections are
    /// quoted so the text parses back to the same structure.
    pub fn to_literal(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => {
                let mut out = String::new();
                write_nested(other, &mut out);
                out
            }
        }
    }
}

fn write_nested(value: &Value, out: &mut String) {
    match value {
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&format!("{f:?}")),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::String(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Value::Date(d) => out.push_str(&d.to_string()),
        Value::Sequence(items) => write_items(items, "[", "]", out),
        Value::Tuple(items) if items.len() == 1 => {
            out.push('(');
            write_nested(&items[0], out);
            out.push_str(",)");
        }
        Value::Tuple(items) => write_items(items, "(", ")", out),
        Value::Set(items) if items.is_empty() => out.push_str("set()"),
        Value::Set(items) => write_items(items, "{", "}", out),
        Value::Map(table) => {
            out.push('{');
            for (i, (k, v)) in table.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_nested(&Value::String(k.clone()), out);
                out.push_str(": ");
                write_nested(v, out);
            }
            out.push('}');
        }
    }
}

fn write_items(items: &[Value], open: &str, close: &str, out: &mut String) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_nested(item, out);
    }
    out.push_str(close);
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

/// Plain serde view of a tree: tuples and sets become sequences, dates
/// become ISO strings. Used for JSON output, which has no tags.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.to_string()),
            Value::Sequence(items) | Value::Tuple(items) | Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(table) => {
                let mut map = serializer.serialize_map(Some(table.len()))?;
                for (k, v) in table {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Typed extraction of a [`Value`], used by
/// [`RunConfig::get_as`](crate::RunConfig::get_as).
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for PathBuf {
    const EXPECTED: &'static str = "path string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(PathBuf::from)
    }
}

impl FromValue for NaiveDate {
    const EXPECTED: &'static str = "date";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for Table {
    const EXPECTED: &'static str = "map";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_table().cloned()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const EXPECTED: &'static str = "sequence";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// Navigate a [`Table`] by dotted key path (e.g. `"net.num_layers"`).
pub fn table_get<'a>(table: &'a Table, dotted_key: &str) -> Option<&'a Value> {
    let (path, leaf) = match dotted_key.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, dotted_key),
    };

    let tbl = match path {
        Some(path) => {
            let mut current = table;
            for segment in path.split('.') {
                current = current.get(segment)?.as_table()?;
            }
            current
        }
        None => table,
    };

    tbl.get(leaf)
}

/// Write `value` at a dotted key path, creating intermediate maps.
///
/// A non-map value sitting on the path is replaced by a map.
pub fn table_set(table: &mut Table, dotted_key: &str, value: Value) {
    let mut segments = dotted_key.split('.').peekable();
    let mut current = table;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(Table::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(Table::new());
        }
        let Value::Map(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Typed lookup shared by the run handle and the CLI `get` command.
pub fn get_typed<T: FromValue>(table: &Table, dotted_key: &str) -> Result<T, RunfigError> {
    let value =
        table_get(table, dotted_key).ok_or_else(|| RunfigError::KeyNotFound(dotted_key.into()))?;
    T::from_value(value).ok_or_else(|| RunfigError::TypeMismatch {
        key: dotted_key.into(),
        expected: T::EXPECTED,
        found: value.type_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn set_deduplicates() {
        let set = Value::set(vec![Value::from(1), Value::from(2), Value::from(1)]);
        match set {
            Value::Set(items) => assert_eq!(items.len(), 2),
            other => panic!("Expected Set, got {other:?}"),
        }
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = Value::set(vec![Value::from("a"), Value::from("b")]);
        let b = Value::set(vec![Value::from("b"), Value::from("a")]);
        assert_eq!(a, b);
    }

    #[test]
    fn tuple_is_not_sequence() {
        let tuple = Value::Tuple(vec![Value::from(1), Value::from(2)]);
        let seq = Value::Sequence(vec![Value::from(1), Value::from(2)]);
        assert_ne!(tuple, seq);
    }

    #[test]
    fn literal_top_level_string_is_raw() {
        assert_eq!(Value::from("hello world").to_literal(), "hello world");
    }

    #[test]
    fn literal_nested_strings_are_quoted() {
        let v = Value::Sequence(vec![Value::from(1), Value::from("test")]);
        assert_eq!(v.to_literal(), "[1, \"test\"]");
    }

    #[test]
    fn literal_floats_keep_fraction() {
        assert_eq!(Value::from(2.0).to_literal(), "2.0");
        assert_eq!(Value::from(1e-5).to_literal(), "1e-5");
    }

    #[test]
    fn literal_single_tuple_has_trailing_comma() {
        let v = Value::Tuple(vec![Value::from(7)]);
        assert_eq!(v.to_literal(), "(7,)");
    }

    #[test]
    fn literal_empty_set() {
        assert_eq!(Value::set(Vec::<Value>::new()).to_literal(), "set()");
    }

    #[test]
    fn literal_date() {
        assert_eq!(Value::from(date(2020, 1, 31)).to_literal(), "2020-01-31");
    }

    #[test]
    fn table_get_nested() {
        let mut table = Table::new();
        table_set(&mut table, "net.num_layers", Value::from(18));
        assert_eq!(table_get(&table, "net.num_layers"), Some(&Value::from(18)));
        assert!(table_get(&table, "net.missing").is_none());
        assert!(table_get(&table, "net.num_layers.deeper").is_none());
    }

    #[test]
    fn table_set_replaces_scalar_on_path() {
        let mut table = Table::new();
        table.insert("a".into(), Value::from(1));
        table_set(&mut table, "a.b", Value::from(2));
        assert_eq!(table_get(&table, "a.b"), Some(&Value::from(2)));
    }

    #[test]
    fn get_typed_reports_mismatch() {
        let mut table = Table::new();
        table.insert("lr".into(), Value::from(0.001));
        let err = get_typed::<i64>(&table, "lr").unwrap_err();
        match err {
            RunfigError::TypeMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "integer");
                assert_eq!(found, "float");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn get_typed_sequence() {
        let mut table = Table::new();
        table.insert("splits".into(), Value::from(vec![70i64, 20, 10]));
        let splits: Vec<i64> = get_typed(&table, "splits").unwrap();
        assert_eq!(splits, vec![70, 20, 10]);
        assert!(get_typed::<Vec<String>>(&table, "splits").is_err());
    }

    #[test]
    fn serializes_to_plain_json() {
        let mut table = Table::new();
        table.insert("t".into(), Value::Tuple(vec![Value::from(1), Value::from(true)]));
        table.insert("d".into(), Value::from(date(2021, 3, 4)));
        let json = serde_json::to_string(&Value::Map(table)).unwrap();
        assert_eq!(json, r#"{"d":"2021-03-04","t":[1,true]}"#);
    }
}
