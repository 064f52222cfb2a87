//! Operations behind the `runfig` subcommands, and the [`Report`] enum that
//! callers use to display results.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::builder::Runfig;
use crate::catalog::BaseCatalog;
use crate::error::RunfigError;
use crate::format::{self, Format};
use crate::prompt::{PromptKind, kind_name};
use crate::session::{FormRenderer, InteractiveSession};
use crate::settings::Settings;
use crate::types::Action;
use crate::value::{Table, Value};

/// Result of an operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// A rendered run tree (YAML or JSON).
    Tree(String),
    /// Confirmation that a run tree was written to a file.
    Written { path: PathBuf },
    /// A single resolved value in literal form.
    KeyValue { key: String, value: String },
    /// Flattened dotted key-value pairs.
    Listing { entries: Vec<(String, String)> },
    /// One row per prompt: label, prompt kind and initial value or choices.
    Prompts { rows: Vec<(String, String, String)> },
    /// Dotted catalog paths.
    Bases { entries: Vec<String> },
    /// The commented settings template.
    Template(String),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Tree(text) | Report::Template(text) => write!(f, "{}", text.trim_end()),
            Report::Written { path } => write!(f, "Run written to {}", path.display()),
            Report::KeyValue { key, value } => write!(f, "{key} = {value}"),
            Report::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
            Report::Prompts { rows } => {
                let width = rows.iter().map(|(label, _, _)| label.chars().count()).max().unwrap_or(0);
                for (i, (label, kind, detail)) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let line = format!("{label:<width$}  [{kind}] {detail}");
                    write!(f, "{}", line.trim_end())?;
                }
                Ok(())
            }
            Report::Bases { entries } => write!(f, "{}", entries.join("\n")),
        }
    }
}

/// Execute `action`. Templates are materialized through `renderer`.
pub fn handle(
    action: &Action,
    settings: &Settings,
    renderer: &mut dyn FormRenderer,
) -> Result<Report, RunfigError> {
    match action {
        Action::Resolve {
            run_file,
            base_dir,
            overrides,
            output,
            json,
        } => {
            let run = Runfig::builder()
                .settings(settings.clone())
                .base_dir(base_dir)
                .run_file(run_file)
                .cli_args(overrides)
                .load_with(renderer)?;
            match output {
                Some(path) => write_tree(run.tree(), path),
                None if *json => render_json(run.tree()),
                None => render_yaml(run.tree()),
            }
        }
        Action::Compose {
            template,
            base_dir,
            overrides,
            output,
            out_dir,
        } => {
            let run = Runfig::builder()
                .settings(settings.clone())
                .base_dir(base_dir)
                .template_file(template)
                .cli_args(overrides)
                .create_out_dir(*out_dir)
                .load_with(renderer)?;
            match output {
                Some(path) => write_tree(run.tree(), path),
                None => render_yaml(run.tree()),
            }
        }
        Action::Prompts { template, base_dir } => {
            let catalog = BaseCatalog::load(base_dir)?;
            let template = format::read_map(template)?;
            let session = InteractiveSession::new(&template, &catalog, settings.prompt_options())?;
            let form = session.form();
            let rows = form
                .prompts()
                .iter()
                .enumerate()
                .map(|(i, prompt)| {
                    let detail = match (&prompt.kind, prompt.choices()) {
                        (PromptKind::Group, _) => String::new(),
                        (_, Some(choices)) => choices.join(" | "),
                        _ => form.display_answer(i),
                    };
                    (prompt.label.clone(), kind_name(&prompt.kind).to_string(), detail)
                })
                .collect();
            Ok(Report::Prompts { rows })
        }
        Action::Bases { base_dir, dir } => {
            let catalog = BaseCatalog::load(base_dir)?;
            let entries = match dir {
                Some(dir) => catalog
                    .options_under(dir)
                    .ok_or_else(|| RunfigError::UnresolvedBase {
                        path: dir.clone(),
                        reason: "not a catalog directory".into(),
                    })?
                    .into_iter()
                    .map(|(_, path)| path)
                    .collect(),
                None => catalog.entries().map(str::to_string).collect(),
            };
            Ok(Report::Bases { entries })
        }
        Action::Get {
            run_file,
            key,
            base_dir,
        } => {
            let run = Runfig::builder()
                .settings(settings.clone())
                .base_dir(base_dir)
                .run_file(run_file)
                .load_with(renderer)?;
            match run.get(key)? {
                Value::Map(table) => {
                    let mut entries = Vec::new();
                    flatten(table, key, &mut entries);
                    Ok(Report::Listing { entries })
                }
                value => Ok(Report::KeyValue {
                    key: key.clone(),
                    value: value.to_literal(),
                }),
            }
        }
        Action::Settings => Ok(Report::Template(Settings::template())),
    }
}

fn write_tree(tree: &Table, path: &Path) -> Result<Report, RunfigError> {
    format::write_map(tree, path)?;
    Ok(Report::Written {
        path: path.to_path_buf(),
    })
}

fn render_yaml(tree: &Table) -> Result<Report, RunfigError> {
    Ok(Report::Tree(Format::Yaml.render(tree, Path::new("<stdout>"))?))
}

fn render_json(tree: &Table) -> Result<Report, RunfigError> {
    serde_json::to_string_pretty(tree)
        .map(Report::Tree)
        .map_err(|e| RunfigError::MalformedConfig {
            path: PathBuf::from("<stdout>"),
            reason: e.to_string(),
        })
}

/// Flatten `table` into dotted `key = literal` pairs. Empty maps are kept as
/// leaves.
fn flatten(table: &Table, prefix: &str, out: &mut Vec<(String, String)>) {
    for (segment, value) in table {
        let key = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{prefix}.{segment}")
        };
        match value {
            Value::Map(children) if !children.is_empty() => flatten(children, &key, out),
            leaf => out.push((key, leaf.to_literal())),
        }
    }
}
