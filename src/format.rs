//! Reading and writing configuration trees.
//!
//! The on-disk format is picked from the file extension. Both formats carry
//! the three value kinds they lack natively through tags:
//!
//! | Value | YAML | TOML |
//! |-------|------|------|
//! | tuple | `!tuple [1, 2]` | `{ "!tuple" = [1, 2] }` |
//! | set   | `!set [1, 2]`   | `{ "!set" = [1, 2] }` |
//! | date  | `!date 2020-01-31` | native local date `2020-01-31` |
//!
//! YAML input also accepts plain `2020-01-31` scalars as dates, and the
//! `!!set` and `!!python/tuple` tags other emitters write.
//!
//! Parsing and rendering are pure functions over strings; [`read_map`] and
//! [`write_map`] are the I/O wrappers.

use std::borrow::Cow;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde_yaml::value::{Tag, TaggedValue};

use crate::error::RunfigError;
use crate::literal::looks_like_date;
use crate::value::{Table, Value};

const TUPLE_TAG: &str = "tuple";
const SET_TAG: &str = "set";
const DATE_TAG: &str = "date";
/// `!!python/tuple`, as PyYAML writes tuples.
const PY_TUPLE_TAG: &str = "python/tuple";
/// Core tags whose content loads like an untagged value.
const PLAIN_CORE_TAGS: &[&str] = &["int", "float", "bool", "null", "map", "seq", "timestamp"];
/// Routes the `!!` handle to local tags. The loader drops core tags on
/// collections, so `!!set` and `!!python/tuple` would otherwise be lost.
const LOCAL_CORE_TAGS: &str = "%TAG !! !";
const TOML_TUPLE_KEY: &str = "!tuple";
const TOML_SET_KEY: &str = "!set";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

impl Format {
    /// Pick the format for a path from its extension, or `None` if unknown.
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Parse a document. `path` is only used for error messages.
    pub fn parse(self, content: &str, path: &Path) -> Result<Table, RunfigError> {
        match self {
            Format::Yaml => parse_yaml(content, path),
            Format::Toml => parse_toml(content, path),
        }
    }

    pub fn render(self, table: &Table, path: &Path) -> Result<String, RunfigError> {
        match self {
            Format::Yaml => {
                let doc = serde_yaml::Value::Mapping(yaml_mapping(table));
                serde_yaml::to_string(&doc).map_err(|e| RunfigError::YamlError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Format::Toml => {
                let toml_err = |reason: String| RunfigError::TomlError {
                    path: path.to_path_buf(),
                    reason,
                };
                let doc = toml_table(table).map_err(toml_err)?;
                toml::to_string(&doc).map_err(|e| toml_err(e.to_string()))
            }
        }
    }
}

fn format_for(path: &Path) -> Result<Format, RunfigError> {
    Format::from_path(path).ok_or_else(|| RunfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

/// Read a file into a [`Table`]. Fails with
/// [`MalformedConfig`](RunfigError::MalformedConfig) unless the top-level
/// value is a string-keyed map.
pub fn read_map(path: &Path) -> Result<Table, RunfigError> {
    let format = format_for(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| RunfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    format.parse(&content, path)
}

/// Write a [`Table`] to a file, creating parent directories as needed.
pub fn write_map(table: &Table, path: &Path) -> Result<(), RunfigError> {
    let content = format_for(path)?.render(table, path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| RunfigError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| RunfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn malformed(path: &Path, reason: impl Into<String>) -> RunfigError {
    RunfigError::MalformedConfig {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

fn parse_yaml(content: &str, path: &Path) -> Result<Table, RunfigError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(&localize_core_tags(content)).map_err(|e| RunfigError::YamlError {
            path: path.to_path_buf(),
            source: e,
        })?;
    match doc {
        serde_yaml::Value::Mapping(mapping) => {
            yaml_to_table(mapping).map_err(|reason| malformed(path, reason))
        }
        // An empty document is an empty config.
        serde_yaml::Value::Null => Ok(Table::new()),
        other => Err(malformed(
            path,
            format!("top-level value should be a map, found {}", yaml_kind(&other)),
        )),
    }
}

fn localize_core_tags(content: &str) -> Cow<'_, str> {
    if !content.contains("!!") || content.contains("%TAG !!") {
        return Cow::Borrowed(content);
    }
    let explicit_start = content
        .lines()
        .find(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .is_some_and(|line| line.starts_with('%') || line.starts_with("---"));
    let start = if explicit_start { "" } else { "---\n" };
    Cow::Owned(format!("{LOCAL_CORE_TAGS}\n{start}{content}"))
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a map",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn yaml_to_table(mapping: serde_yaml::Mapping) -> Result<Table, String> {
    let mut table = Table::new();
    for (key, value) in mapping {
        let serde_yaml::Value::String(key) = key else {
            return Err(format!("keys should be strings, found {}", yaml_kind(&key)));
        };
        if key.is_empty() {
            return Err("keys should not be empty".into());
        }
        let value = yaml_to_value(value).map_err(|reason| format!("{reason} at key '{key}'"))?;
        table.insert(key, value);
    }
    Ok(table)
}

fn yaml_to_value(value: serde_yaml::Value) -> Result<Value, String> {
    match value {
        serde_yaml::Value::Null => Err("null values are not supported".into()),
        serde_yaml::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("unsupported number {n}")),
        },
        serde_yaml::Value::String(s) => Ok(plain_scalar(s)),
        serde_yaml::Value::Sequence(items) => Ok(Value::Sequence(yaml_items(items)?)),
        serde_yaml::Value::Mapping(mapping) => yaml_to_table(mapping).map(Value::Map),
        serde_yaml::Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            if tag == TUPLE_TAG || tag == PY_TUPLE_TAG {
                let serde_yaml::Value::Sequence(items) = value else {
                    return Err("!tuple expects a sequence".into());
                };
                Ok(Value::Tuple(yaml_items(items)?))
            } else if tag == SET_TAG {
                match value {
                    serde_yaml::Value::Sequence(items) => Ok(Value::set(yaml_items(items)?)),
                    // `!!set {a: null, b: null}`: members are the keys.
                    serde_yaml::Value::Mapping(mapping) => {
                        let mut members = Vec::with_capacity(mapping.len());
                        for (member, marker) in mapping {
                            if !marker.is_null() {
                                return Err("!!set members should map to null".into());
                            }
                            members.push(yaml_to_value(member)?);
                        }
                        Ok(Value::set(members))
                    }
                    _ => Err("!set expects a sequence or a map of null values".into()),
                }
            } else if tag == DATE_TAG {
                let serde_yaml::Value::String(s) = value else {
                    return Err("!date expects a YYYY-MM-DD string".into());
                };
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|e| format!("invalid date '{s}': {e}"))
            } else if tag == "str" {
                match value {
                    serde_yaml::Value::String(s) => Ok(Value::String(s)),
                    serde_yaml::Value::Null => Ok(Value::String(String::new())),
                    serde_yaml::Value::Bool(b) => Ok(Value::String(b.to_string())),
                    serde_yaml::Value::Number(n) => Ok(Value::String(n.to_string())),
                    other => Err(format!("!!str expects a scalar, found {}", yaml_kind(&other))),
                }
            } else if PLAIN_CORE_TAGS.iter().any(|name| tag == *name) {
                yaml_to_value(value)
            } else {
                Err(format!("unknown tag {tag}"))
            }
        }
    }
}

/// Plain scalars shaped `YYYY-MM-DD` are dates, as YAML timestamps are.
fn plain_scalar(s: String) -> Value {
    if looks_like_date(&s)
        && let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
    {
        return Value::Date(date);
    }
    Value::String(s)
}

fn yaml_items(items: Vec<serde_yaml::Value>) -> Result<Vec<Value>, String> {
    items.into_iter().map(yaml_to_value).collect()
}

fn yaml_mapping(table: &Table) -> serde_yaml::Mapping {
    table
        .iter()
        .map(|(k, v)| (serde_yaml::Value::String(k.clone()), to_yaml(v)))
        .collect()
}

fn to_yaml(value: &Value) -> serde_yaml::Value {
    let tagged = |tag: &str, value: serde_yaml::Value| {
        serde_yaml::Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tag),
            value,
        }))
    };
    match value {
        Value::Integer(i) => serde_yaml::Value::Number((*i).into()),
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::Boolean(b) => serde_yaml::Value::Bool(*b),
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Sequence(items) => serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect()),
        Value::Tuple(items) => tagged(
            TUPLE_TAG,
            serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect()),
        ),
        Value::Set(items) => tagged(
            SET_TAG,
            serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect()),
        ),
        Value::Date(d) => tagged(DATE_TAG, serde_yaml::Value::String(d.to_string())),
        Value::Map(table) => serde_yaml::Value::Mapping(yaml_mapping(table)),
    }
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

fn parse_toml(content: &str, path: &Path) -> Result<Table, RunfigError> {
    let doc: toml::Table = toml::from_str(content).map_err(|e| RunfigError::TomlError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    toml_to_table(doc).map_err(|reason| malformed(path, reason))
}

fn toml_to_table(doc: toml::Table) -> Result<Table, String> {
    let mut table = Table::new();
    for (key, value) in doc {
        if key.is_empty() {
            return Err("keys should not be empty".into());
        }
        let value = from_toml(value).map_err(|reason| format!("{reason} at key '{key}'"))?;
        table.insert(key, value);
    }
    Ok(table)
}

fn from_toml(value: toml::Value) -> Result<Value, String> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s)),
        toml::Value::Integer(i) => Ok(Value::Integer(i)),
        toml::Value::Float(f) => Ok(Value::Float(f)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(b)),
        toml::Value::Datetime(dt) => match (dt.date, dt.time, dt.offset) {
            (Some(d), None, None) => {
                NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
                    .map(Value::Date)
                    .ok_or_else(|| format!("invalid date {dt}"))
            }
            // Date-times are outside the value model; keep their text.
            _ => Ok(Value::String(dt.to_string())),
        },
        toml::Value::Array(items) => items
            .into_iter()
            .map(from_toml)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        toml::Value::Table(mut tbl) => {
            if tbl.len() == 1 {
                for (key, tag) in [(TOML_TUPLE_KEY, TUPLE_TAG), (TOML_SET_KEY, SET_TAG)] {
                    if let Some(inner) = tbl.remove(key) {
                        let toml::Value::Array(items) = inner else {
                            return Err(format!("'{key}' expects an array"));
                        };
                        let items = items
                            .into_iter()
                            .map(from_toml)
                            .collect::<Result<Vec<_>, _>>()?;
                        return Ok(if tag == TUPLE_TAG {
                            Value::Tuple(items)
                        } else {
                            Value::set(items)
                        });
                    }
                }
            }
            toml_to_table(tbl).map(Value::Map)
        }
    }
}

fn toml_table(table: &Table) -> Result<toml::Table, String> {
    table
        .iter()
        .map(|(k, v)| {
            to_toml(v)
                .map(|v| (k.clone(), v))
                .map_err(|reason| format!("{reason} at key '{k}'"))
        })
        .collect()
}

fn toml_array(items: &[Value]) -> Result<toml::Value, String> {
    items
        .iter()
        .map(to_toml)
        .collect::<Result<Vec<_>, _>>()
        .map(toml::Value::Array)
}

fn to_toml(value: &Value) -> Result<toml::Value, String> {
    let tagged = |key: &str, items: &[Value]| -> Result<toml::Value, String> {
        let mut tbl = toml::Table::new();
        tbl.insert(key.to_string(), toml_array(items)?);
        Ok(toml::Value::Table(tbl))
    };
    Ok(match value {
        Value::Integer(i) => toml::Value::Integer(*i),
        Value::Float(f) => toml::Value::Float(*f),
        Value::Boolean(b) => toml::Value::Boolean(*b),
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Sequence(items) => toml_array(items)?,
        Value::Tuple(items) => tagged(TOML_TUPLE_KEY, items)?,
        Value::Set(items) => tagged(TOML_SET_KEY, items)?,
        Value::Date(d) => toml::Value::Datetime(toml_date(*d)?),
        Value::Map(table) => toml::Value::Table(toml_table(table)?),
    })
}

/// TOML local dates cover years 0 to 9999.
fn toml_date(d: NaiveDate) -> Result<toml::value::Datetime, String> {
    let year = u16::try_from(d.year())
        .ok()
        .filter(|year| *year <= 9999)
        .ok_or_else(|| format!("date {d} is outside the years TOML can hold"))?;
    let (Ok(month), Ok(day)) = (u8::try_from(d.month()), u8::try_from(d.day())) else {
        return Err(format!("date {d} cannot be written as TOML"));
    };
    Ok(toml::value::Datetime {
        date: Some(toml::value::Date { year, month, day }),
        time: None,
        offset: None,
    })
}

/// Path of a config file's base name without extension (`net/resnet.yaml` → `resnet`).
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()?.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rich_table() -> Table {
        let mut inner = Table::new();
        inner.insert("name".into(), Value::from("cifar10"));
        inner.insert("splits".into(), Value::from(vec![70i64, 20, 10]));

        let mut table = Table::new();
        table.insert("dataset".into(), Value::Map(inner));
        table.insert(
            "shape".into(),
            Value::Tuple(vec![Value::from(1), Value::from(true), Value::from("test")]),
        );
        table.insert(
            "classes".into(),
            Value::set(vec![Value::from(1), Value::from(5), Value::from(6)]),
        );
        table.insert("start".into(), Value::from(date(2020, 1, 1)));
        table.insert("lr".into(), Value::from(5e-3));
        table
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.yaml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.toml")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("b.json")), None);
        assert_eq!(Format::from_path(Path::new("README")), None);
    }

    #[test]
    fn yaml_round_trip_through_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/run.yaml");
        let table = rich_table();
        write_map(&table, &path).unwrap();
        assert_eq!(read_map(&path).unwrap(), table);
    }

    #[test]
    fn toml_round_trip_through_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        let table = rich_table();
        write_map(&table, &path).unwrap();
        assert_eq!(read_map(&path).unwrap(), table);
    }

    #[test]
    fn yaml_tags_are_written() {
        let path = Path::new("run.yaml");
        let text = Format::Yaml.render(&rich_table(), path).unwrap();
        assert!(text.contains("!tuple"));
        assert!(text.contains("!set"));
        assert!(text.contains("!date"));
    }

    #[test]
    fn yaml_tags_are_read() {
        let content = "t: !tuple [1, true, test]\ns: !set [a, b, a]\nd: !date 2021-06-30\n";
        let table = Format::Yaml.parse(content, Path::new("x.yaml")).unwrap();
        assert_eq!(
            table["t"],
            Value::Tuple(vec![Value::from(1), Value::from(true), Value::from("test")])
        );
        assert_eq!(table["s"], Value::set(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(table["d"], Value::from(date(2021, 6, 30)));
    }

    #[test]
    fn yaml_plain_date_is_read_as_date() {
        let table = Format::Yaml
            .parse("start: 2020-01-31
label: 2020-01-31x
bad: 2020-13-45
", Path::new("x.yaml"))
            .unwrap();
        assert_eq!(table["start"], Value::from(date(2020, 1, 31)));
        assert_eq!(table["label"], Value::from("2020-01-31x"));
        assert_eq!(table["bad"], Value::from("2020-13-45"));
    }

    #[test]
    fn yaml_core_set_and_python_tuple_are_read() {
        let content = "s: !!set {a: null, b: null}
t: !!python/tuple [1, 2]
";
        let table = Format::Yaml.parse(content, Path::new("x.yaml")).unwrap();
        assert_eq!(table["s"], Value::set(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(table["t"], Value::Tuple(vec![Value::from(1), Value::from(2)]));
    }

    #[test]
    fn yaml_core_tags_keep_their_meaning() {
        let content = "# run\n---\nday: !!str 2020-01-31\nn: !!int 3\nt: !!python/tuple [a, 1]\n";
        let table = Format::Yaml.parse(content, Path::new("x.yaml")).unwrap();
        assert_eq!(table["day"], Value::from("2020-01-31"));
        assert_eq!(table["n"], Value::from(3));
        assert_eq!(table["t"], Value::Tuple(vec![Value::from("a"), Value::from(1)]));
    }

    #[test]
    fn yaml_core_set_with_values_is_malformed() {
        let err = Format::Yaml
            .parse("s: !!set {a: 1}
", Path::new("x.yaml"))
            .unwrap_err();
        assert!(matches!(err, RunfigError::MalformedConfig { .. }));
    }

    #[test]
    fn toml_rejects_dates_out_of_range() {
        let mut table = Table::new();
        table.insert("ancient".into(), Value::from(date(-44, 3, 15)));
        match Format::Toml.render(&table, Path::new("x.toml")).unwrap_err() {
            RunfigError::TomlError { reason, .. } => assert!(reason.contains("'ancient'")),
            other => panic!("Expected TomlError, got {other:?}"),
        }
        table.insert("ancient".into(), Value::from(date(12000, 1, 1)));
        assert!(Format::Toml.render(&table, Path::new("x.toml")).is_err());
    }

    #[test]
    fn toml_native_date_is_read() {
        let table = Format::Toml
            .parse("start = 2020-05-17\n", Path::new("x.toml"))
            .unwrap();
        assert_eq!(table["start"], Value::from(date(2020, 5, 17)));
    }

    #[test]
    fn top_level_sequence_is_malformed() {
        let err = Format::Yaml
            .parse("- 1\n- 2\n", Path::new("wrong.yaml"))
            .unwrap_err();
        match err {
            RunfigError::MalformedConfig { path, reason } => {
                assert_eq!(path, PathBuf::from("wrong.yaml"));
                assert!(reason.contains("sequence"));
            }
            other => panic!("Expected MalformedConfig, got {other:?}"),
        }
    }

    #[test]
    fn non_string_keys_are_malformed() {
        let err = Format::Yaml
            .parse("1: one\n", Path::new("wrong.yaml"))
            .unwrap_err();
        assert!(matches!(err, RunfigError::MalformedConfig { .. }));
    }

    #[test]
    fn null_values_are_malformed() {
        let err = Format::Yaml
            .parse("a:\n  b: ~\n", Path::new("wrong.yaml"))
            .unwrap_err();
        match err {
            RunfigError::MalformedConfig { reason, .. } => assert!(reason.contains("'b'")),
            other => panic!("Expected MalformedConfig, got {other:?}"),
        }
    }

    #[test]
    fn empty_yaml_is_empty_table() {
        let table = Format::Yaml.parse("", Path::new("empty.yaml")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = read_map(Path::new("config.ini")).unwrap_err();
        assert!(matches!(err, RunfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_map(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, RunfigError::IoError { .. }));
    }
}
