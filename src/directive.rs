//! The directive grammar embedded in template string values.
//!
//! | Directive | Prompt | Payload |
//! |-----------|--------|---------|
//! | `@BOOL(true)`, `@BOOL(false)` | toggle | required, case-insensitive |
//! | `@DATE`, `@DATE(today)`, `@DATE(2020-01-31)` | date picker | optional |
//! | `@FILE`, `@FILE(path/to/default)` | file picker | optional |
//! | `@OPTIONS(1; 2; 3)`, `@OPTIONS(a, b)` | choice | required |
//! | `@BASE(net.resnet)` | base selection | required dotted catalog path |
//!
//! Tags are case-sensitive. The payload is everything between the first `(`
//! and the final `)`. A string whose shape matches no directive (e.g.
//! `@BOOL()`, `@DATE(tomorrow)`, `@bool(true)`) is an ordinary literal. A
//! string that has a directive's shape but an unusable payload (an
//! impossible date, an empty option list) is an
//! [`InvalidDirective`](RunfigError::InvalidDirective).
//!
//! Matchers are tried in the order of [`MATCHERS`]; the first match wins.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::RunfigError;
use crate::literal::{looks_like_date, parse_literal};
use crate::value::Value;

/// Default of a date directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDefault {
    /// The date the prompt is built.
    Today,
    Fixed(NaiveDate),
}

impl DateDefault {
    pub fn to_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            DateDefault::Today => today,
            DateDefault::Fixed(date) => date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    Bool {
        default: bool,
    },
    Date {
        default: Option<DateDefault>,
    },
    File {
        default: Option<PathBuf>,
    },
    /// `labels[i]` is the entry text shown to the operator, `values[i]` its
    /// parsed literal.
    Options {
        labels: Vec<String>,
        values: Vec<Value>,
    },
    /// Choose one file entry under the catalog directory `dir`.
    Base {
        dir: String,
    },
}

/// How a template value is treated when building prompts.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Directive(DirectiveKind),
    /// A nested map: a non-editable group whose children are walked.
    Group,
    /// Anything else, passed through as an editable literal.
    Literal,
}

/// Outcome of one matcher: `None` if the text does not have its shape,
/// `Some(Err(reason))` if it does but the payload is unusable.
type MatchResult = Option<Result<DirectiveKind, String>>;

/// A directive tag and the function that parses its payload. The payload is
/// `None` for the bare form (`@DATE`).
pub struct Matcher {
    pub tag: &'static str,
    pub parse: fn(Option<&str>) -> MatchResult,
}

/// Matchers in priority order.
pub const MATCHERS: &[Matcher] = &[
    Matcher {
        tag: "@BOOL",
        parse: match_bool,
    },
    Matcher {
        tag: "@DATE",
        parse: match_date,
    },
    Matcher {
        tag: "@FILE",
        parse: match_file,
    },
    Matcher {
        tag: "@OPTIONS",
        parse: match_options,
    },
    Matcher {
        tag: "@BASE",
        parse: match_base,
    },
];

/// Classify the template value found at `key` (a dotted path, used for
/// error messages).
pub fn classify(key: &str, value: &Value) -> Result<Classified, RunfigError> {
    match value {
        Value::Map(_) => Ok(Classified::Group),
        Value::String(text) => match parse_directive(text) {
            Some(Ok(kind)) => Ok(Classified::Directive(kind)),
            Some(Err(reason)) => Err(RunfigError::InvalidDirective {
                key: key.to_string(),
                reason,
            }),
            None => Ok(Classified::Literal),
        },
        _ => Ok(Classified::Literal),
    }
}

/// Run the matchers over `text` in priority order.
pub fn parse_directive(text: &str) -> MatchResult {
    MATCHERS.iter().find_map(|matcher| {
        let payload = split_payload(text, matcher.tag)?;
        (matcher.parse)(payload)
    })
}

/// `Some(None)` for the bare tag, `Some(Some(payload))` for `TAG(payload)`,
/// `None` if `text` is neither.
fn split_payload<'t>(text: &'t str, tag: &str) -> Option<Option<&'t str>> {
    let rest = text.strip_prefix(tag)?;
    if rest.is_empty() {
        return Some(None);
    }
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(Some(inner))
}

fn match_bool(payload: Option<&str>) -> MatchResult {
    let payload = payload?.trim();
    if payload.eq_ignore_ascii_case("true") {
        Some(Ok(DirectiveKind::Bool { default: true }))
    } else if payload.eq_ignore_ascii_case("false") {
        Some(Ok(DirectiveKind::Bool { default: false }))
    } else {
        None
    }
}

fn match_date(payload: Option<&str>) -> MatchResult {
    let Some(payload) = payload else {
        return Some(Ok(DirectiveKind::Date { default: None }));
    };
    let payload = payload.trim();
    if payload.eq_ignore_ascii_case("today") {
        return Some(Ok(DirectiveKind::Date {
            default: Some(DateDefault::Today),
        }));
    }
    if !looks_like_date(payload) {
        return None;
    }
    Some(
        NaiveDate::parse_from_str(payload, "%Y-%m-%d")
            .map(|date| DirectiveKind::Date {
                default: Some(DateDefault::Fixed(date)),
            })
            .map_err(|e| format!("invalid date '{payload}': {e}")),
    )
}

fn match_file(payload: Option<&str>) -> MatchResult {
    match payload {
        None => Some(Ok(DirectiveKind::File { default: None })),
        Some(path) if path.trim().is_empty() => None,
        Some(path) => Some(Ok(DirectiveKind::File {
            default: Some(PathBuf::from(path.trim())),
        })),
    }
}

fn match_options(payload: Option<&str>) -> MatchResult {
    let payload = payload?;
    let separator = if payload.contains(';') { ';' } else { ',' };
    let labels: Vec<String> = payload
        .split(separator)
        .map(|entry| entry.trim().to_string())
        .collect();
    if labels.iter().all(String::is_empty) {
        return Some(Err("the option list is empty".into()));
    }
    if let Some(pos) = labels.iter().position(String::is_empty) {
        return Some(Err(format!("option {} is empty", pos + 1)));
    }
    let values = labels.iter().map(|label| parse_literal(label)).collect();
    Some(Ok(DirectiveKind::Options { labels, values }))
}

fn match_base(payload: Option<&str>) -> MatchResult {
    let dir = payload?.trim();
    if dir.is_empty() {
        return Some(Err("the catalog path is empty".into()));
    }
    let valid = dir
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !dir.split('.').any(str::is_empty);
    if !valid {
        return Some(Err(format!("'{dir}' is not a dotted catalog path")));
    }
    Some(Ok(DirectiveKind::Base {
        dir: dir.to_string(),
    }))
}
