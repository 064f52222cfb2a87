//! Prompt descriptors built from a template, and the extraction of typed
//! values from operator answers.
//!
//! Every template leaf becomes one [`Prompt`], and every nested map becomes a
//! non-editable [`PromptKind::Group`] followed by the prompts of its
//! children. Prompts keep the dotted key they were built from, so assembling
//! the answers back into a tree is a sequence of
//! [`table_set`](crate::value::table_set) calls.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::catalog::BaseCatalog;
use crate::directive::{self, Classified, DirectiveKind};
use crate::error::RunfigError;
use crate::literal::parse_literal;
use crate::resolve::DEFAULT_BASE_KEY;
use crate::value::{Table, Value};

/// Knobs for building prompts.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    /// Reserved key written by base-selection prompts.
    pub base_key: String,
    /// Spaces of label indentation per nesting level.
    pub label_indent: usize,
    /// Value of `@DATE(today)`.
    pub today: NaiveDate,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            base_key: DEFAULT_BASE_KEY.to_string(),
            label_indent: 3,
            today: chrono::Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Dotted path of the template value.
    pub key: String,
    /// Indented last key segment.
    pub label: String,
    pub depth: usize,
    pub kind: PromptKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptKind {
    Group,
    /// Free text, parsed as a literal.
    Text { initial: String },
    Date { initial: Option<NaiveDate> },
    File { initial: PathBuf },
    /// Index 0 is `true`, index 1 is `false`.
    Toggle { initial: bool },
    Choice {
        labels: Vec<String>,
        values: Vec<Value>,
    },
    /// `labels[i]` is a file stem, `paths[i]` its dotted catalog path.
    Base {
        labels: Vec<String>,
        paths: Vec<String>,
    },
}

/// A raw answer as reported by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Date(NaiveDate),
    Path(PathBuf),
    Index(usize),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(text) => write!(f, "{text}"),
            Answer::Date(date) => write!(f, "{date}"),
            Answer::Path(path) => write!(f, "{}", path.display()),
            Answer::Index(index) => write!(f, "#{index}"),
        }
    }
}

const TOGGLE_LABELS: [&str; 2] = ["true", "false"];

impl Prompt {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, PromptKind::Group)
    }

    /// Labels of a selection prompt, `None` for other kinds.
    pub fn choices(&self) -> Option<Vec<String>> {
        match &self.kind {
            PromptKind::Toggle { .. } => Some(TOGGLE_LABELS.iter().map(|s| s.to_string()).collect()),
            PromptKind::Choice { labels, .. } | PromptKind::Base { labels, .. } => {
                Some(labels.clone())
            }
            _ => None,
        }
    }

    /// The pre-populated answer, if the prompt has one.
    pub fn initial_answer(&self) -> Option<Answer> {
        match &self.kind {
            PromptKind::Group => None,
            PromptKind::Text { initial } => Some(Answer::Text(initial.clone())),
            PromptKind::Date { initial } => initial.map(Answer::Date),
            PromptKind::File { initial } => Some(Answer::Path(initial.clone())),
            PromptKind::Toggle { initial } => Some(Answer::Index(if *initial { 0 } else { 1 })),
            PromptKind::Choice { .. } | PromptKind::Base { .. } => Some(Answer::Index(0)),
        }
    }

    /// Check that `answer` fits this prompt.
    pub fn validate(&self, answer: &Answer) -> Result<(), RunfigError> {
        let invalid = |reason: String| RunfigError::InvalidAnswer {
            key: self.key.clone(),
            reason,
        };
        match (&self.kind, answer) {
            (PromptKind::Group, _) => Err(invalid("groups take no answer".into())),
            (PromptKind::Text { .. }, Answer::Text(_))
            | (PromptKind::Date { .. }, Answer::Date(_))
            | (PromptKind::File { .. }, Answer::Path(_)) => Ok(()),
            (_, Answer::Index(index)) => match self.choices() {
                Some(choices) if *index < choices.len() => Ok(()),
                Some(choices) => Err(invalid(format!(
                    "choice {index} is out of range, there are {} choices",
                    choices.len()
                ))),
                None => Err(invalid("this prompt is not a selection".into())),
            },
            (kind, answer) => Err(invalid(format!(
                "a {} answer does not fit a {} prompt",
                answer_kind(answer),
                kind_name(kind)
            ))),
        }
    }

    /// The tree value for `answer`. `None` for groups.
    pub fn extract(
        &self,
        answer: Option<&Answer>,
        base_key: &str,
    ) -> Result<Option<Value>, RunfigError> {
        if self.is_group() {
            return Ok(None);
        }
        let Some(answer) = answer else {
            return Err(RunfigError::MissingAnswer {
                key: self.key.clone(),
            });
        };
        self.validate(answer)?;
        let value = match (&self.kind, answer) {
            (PromptKind::Text { .. }, Answer::Text(text)) => parse_literal(text),
            (PromptKind::Date { .. }, Answer::Date(date)) => Value::Date(*date),
            (PromptKind::File { .. }, Answer::Path(path)) => {
                Value::String(path.to_string_lossy().into_owned())
            }
            (PromptKind::Toggle { .. }, Answer::Index(index)) => Value::Boolean(*index == 0),
            (PromptKind::Choice { values, .. }, Answer::Index(index)) => values[*index].clone(),
            (PromptKind::Base { paths, .. }, Answer::Index(index)) => {
                let mut reference = Table::new();
                reference.insert(base_key.to_string(), Value::String(paths[*index].clone()));
                Value::Map(reference)
            }
            _ => {
                return Err(RunfigError::InvalidAnswer {
                    key: self.key.clone(),
                    reason: "answer does not fit the prompt".into(),
                });
            }
        };
        Ok(Some(value))
    }

    /// Human-readable rendering of `answer` for this prompt.
    pub fn display_answer(&self, answer: Option<&Answer>) -> String {
        match (answer, self.choices()) {
            (None, _) => String::new(),
            (Some(Answer::Index(index)), Some(choices)) => {
                choices.get(*index).cloned().unwrap_or_default()
            }
            (Some(answer), _) => answer.to_string(),
        }
    }
}

fn answer_kind(answer: &Answer) -> &'static str {
    match answer {
        Answer::Text(_) => "text",
        Answer::Date(_) => "date",
        Answer::Path(_) => "path",
        Answer::Index(_) => "selection",
    }
}

pub(crate) fn kind_name(kind: &PromptKind) -> &'static str {
    match kind {
        PromptKind::Group => "group",
        PromptKind::Text { .. } => "text",
        PromptKind::Date { .. } => "date",
        PromptKind::File { .. } => "file",
        PromptKind::Toggle { .. } => "toggle",
        PromptKind::Choice { .. } => "choice",
        PromptKind::Base { .. } => "base",
    }
}

/// Walk `template` depth-first and build one prompt per node.
///
/// Fails on the first invalid directive, before any prompt is shown.
pub fn build_prompts(
    template: &Table,
    catalog: &BaseCatalog,
    options: &PromptOptions,
) -> Result<Vec<Prompt>, RunfigError> {
    let mut prompts = Vec::new();
    walk(template, "", 0, catalog, options, &mut prompts)?;
    Ok(prompts)
}

fn walk(
    table: &Table,
    prefix: &str,
    depth: usize,
    catalog: &BaseCatalog,
    options: &PromptOptions,
    prompts: &mut Vec<Prompt>,
) -> Result<(), RunfigError> {
    for (segment, value) in table {
        let key = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{prefix}.{segment}")
        };
        let label = format!("{}{segment}", " ".repeat(options.label_indent * depth));
        let kind = match directive::classify(&key, value)? {
            Classified::Group => PromptKind::Group,
            Classified::Literal => PromptKind::Text {
                initial: value.to_literal(),
            },
            Classified::Directive(kind) => directive_prompt(&key, kind, catalog, options)?,
        };
        prompts.push(Prompt {
            key: key.clone(),
            label,
            depth,
            kind,
        });
        if let Value::Map(children) = value {
            walk(children, &key, depth + 1, catalog, options, prompts)?;
        }
    }
    Ok(())
}

fn directive_prompt(
    key: &str,
    kind: DirectiveKind,
    catalog: &BaseCatalog,
    options: &PromptOptions,
) -> Result<PromptKind, RunfigError> {
    Ok(match kind {
        DirectiveKind::Bool { default } => PromptKind::Toggle { initial: default },
        DirectiveKind::Date { default } => PromptKind::Date {
            initial: default.map(|d| d.to_date(options.today)),
        },
        DirectiveKind::File { default } => PromptKind::File {
            initial: default.unwrap_or_default(),
        },
        DirectiveKind::Options { labels, values } => PromptKind::Choice { labels, values },
        DirectiveKind::Base { dir } => {
            let invalid = |reason: String| RunfigError::InvalidDirective {
                key: key.to_string(),
                reason,
            };
            let entries = catalog
                .options_under(&dir)
                .ok_or_else(|| invalid(format!("'{dir}' is not a catalog directory")))?;
            if entries.is_empty() {
                return Err(invalid(format!("no bases under '{dir}'")));
            }
            let (labels, paths) = entries.into_iter().unzip();
            PromptKind::Base { labels, paths }
        }
    })
}
