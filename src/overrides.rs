//! Command-line overrides of the form `--dotted.key=value`.
//!
//! Each argument is split into a dotted key and a literal value, then all
//! overrides are expanded into the nested table needed for a deep-merge on
//! top of the resolved run tree.

use crate::error::RunfigError;
use crate::literal::parse_literal;
use crate::value::{Table, Value, table_set};

/// Parse one `-*key=value` argument. Any number of leading dashes is
/// accepted; the value is parsed with the literal grammar.
pub fn parse_override(arg: &str) -> Result<(String, Value), RunfigError> {
    let invalid = |reason: &str| RunfigError::InvalidOverride {
        arg: arg.to_string(),
        reason: reason.to_string(),
    };
    let body = arg.trim_start_matches('-');
    let (key, value) = body
        .split_once('=')
        .ok_or_else(|| invalid("expected key=value"))?;
    if key.is_empty() {
        return Err(invalid("the key is empty"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(invalid("keys may only contain letters, digits, '_' and '.'"));
    }
    if key.split('.').any(str::is_empty) {
        return Err(invalid("the key has an empty segment"));
    }
    if value.starts_with('=') {
        return Err(invalid("use a single '=' between key and value"));
    }
    Ok((key.to_string(), parse_literal(value)))
}

/// Parse every argument, stopping at the first invalid one.
pub fn parse_overrides<S: AsRef<str>>(args: &[S]) -> Result<Vec<(String, Value)>, RunfigError> {
    args.iter().map(|arg| parse_override(arg.as_ref())).collect()
}

/// Convert dotted-key overrides into a nested [`Table`].
///
/// `("net.num_layers", 50)` becomes `{net: {num_layers: 50}}`.
///
/// If multiple entries target the same key, the last one wins.
pub fn overrides_to_table(entries: &[(String, Value)]) -> Table {
    let mut table = Table::new();
    for (dotted_key, value) in entries {
        table_set(&mut table, dotted_key, value.clone());
    }
    table
}
