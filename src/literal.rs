//! Best-effort literal parsing for operator input.
//!
//! Text typed into a prompt, listed in an `@OPTIONS(...)` directive, or passed
//! as a command-line override is parsed into a typed [`Value`] when it looks
//! like one, and kept as the raw string otherwise:
//!
//! | Input | Value |
//! |-------|-------|
//! | `18`, `-5` | integer |
//! | `1.5`, `1e-4` | float |
//! | `true`, `False` | boolean |
//! | `2020-01-31` | date |
//! | `"x"`, `'x'` | string (quotes stripped) |
//! | `[1, 2]` | sequence |
//! | `(1, 2)`, `(1,)` | tuple |
//! | `{1, 2}`, `set()` | set |
//! | `{"k": 1}`, `{}` | map |
//! | anything else | the raw string |

use chrono::NaiveDate;

use crate::value::{Table, Value};

/// Parse `input` as a literal, falling back to the raw string.
pub fn parse_literal(input: &str) -> Value {
    try_parse_literal(input).unwrap_or_else(|| Value::String(input.to_string()))
}

/// Parse `input` as a literal, or `None` if it is not one.
pub fn try_parse_literal(input: &str) -> Option<Value> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos == parser.chars.len() {
        Some(value)
    } else {
        None
    }
}

/// Classify a bare (unquoted, undelimited) token.
/// Tries: bool → date → integer → float.
fn parse_bare(token: &str) -> Option<Value> {
    if token.eq_ignore_ascii_case("true") {
        return Some(Value::Boolean(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(false));
    }
    if looks_like_date(token) {
        return NaiveDate::parse_from_str(token, "%Y-%m-%d")
            .ok()
            .map(Value::Date);
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    // Only numeric-looking tokens, so "inf" / "NaN" stay strings.
    let numeric_start = token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if numeric_start && let Ok(f) = token.parse::<f64>() {
        return Some(Value::Float(f));
    }
    None
}

/// `YYYY-MM-DD` shape, without checking that the date exists.
pub(crate) fn looks_like_date(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '[' => {
                self.pos += 1;
                let (items, _) = self.items(']')?;
                Some(Value::Sequence(items))
            }
            '(' => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.items(')')?;
                if items.len() == 1 && !trailing_comma {
                    items.pop()
                } else {
                    Some(Value::Tuple(items))
                }
            }
            '{' => {
                self.pos += 1;
                self.brace()
            }
            '"' | '\'' => self.quoted().map(Value::String),
            _ => {
                let token = self.bare();
                if token == "set" && self.eat('(') && self.eat(')') {
                    return Some(Value::set(Vec::new()));
                }
                parse_bare(&token)
            }
        }
    }

    /// Comma-separated values up to `close`. Reports whether the list ended
    /// with a trailing comma.
    fn items(&mut self, close: char) -> Option<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Some((items, false));
        }
        loop {
            items.push(self.value()?);
            if self.eat(close) {
                return Some((items, false));
            }
            if !self.eat(',') {
                return None;
            }
            if self.eat(close) {
                return Some((items, true));
            }
        }
    }

    /// Set or map body after `{`.
    fn brace(&mut self) -> Option<Value> {
        if self.eat('}') {
            return Some(Value::Map(Table::new()));
        }
        let first = self.value()?;
        if self.eat(':') {
            let mut table = Table::new();
            let mut key = first;
            loop {
                let Value::String(k) = key else {
                    return None;
                };
                if k.is_empty() {
                    return None;
                }
                let v = self.value()?;
                table.insert(k, v);
                if self.eat('}') {
                    return Some(Value::Map(table));
                }
                if !self.eat(',') {
                    return None;
                }
                if self.eat('}') {
                    return Some(Value::Map(table));
                }
                key = self.value()?;
                if !self.eat(':') {
                    return None;
                }
            }
        }
        let mut items = vec![first];
        loop {
            if self.eat('}') {
                return Some(Value::set(items));
            }
            if !self.eat(',') {
                return None;
            }
            if self.eat('}') {
                return Some(Value::set(items));
            }
            items.push(self.value()?);
        }
    }

    fn quoted(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                c if c == quote => return Some(out),
                '\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !"[](){},:'\"".contains(c))
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}
