//! The resolved configuration of one run.
//!
//! [`RunConfig`] is an immutable handle returned by
//! [`RunfigBuilder::load`](crate::RunfigBuilder::load). Pass it (or a
//! reference to it) to the code that needs configuration; [`RunConfig::copy`]
//! hands out an owned tree that can be mutated freely.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::RunfigError;
use crate::format;
use crate::settings::Settings;
use crate::value::{FromValue, Table, Value, get_typed, table_get};

/// Key holding the run name in a run tree.
pub const RUN_NAME_KEY: &str = "run_name";

/// Internal key recording the output directory in a saved run file.
/// Stripped on load; never visible through [`RunConfig`].
pub const OUT_DIR_KEY: &str = "__out_dir__";

/// What to do when a run tree carries no `run_name`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunNameStrategy {
    /// Name the run after the current local time.
    #[default]
    Date,
    /// Fail with [`RunNameRequired`](RunfigError::RunNameRequired).
    Required,
}

impl RunNameStrategy {
    /// Pick the run name for `tree`.
    pub fn run_name(self, tree: &Table, date_format: &str) -> Result<String, RunfigError> {
        if let Some(name) = tree.get(RUN_NAME_KEY) {
            let name = name.to_literal();
            if name.trim().is_empty() {
                return Err(RunfigError::EmptyRunName);
            }
            return Ok(name.trim().to_string());
        }
        match self {
            RunNameStrategy::Date => Ok(chrono::Local::now().format(date_format).to_string()),
            RunNameStrategy::Required => Err(RunfigError::RunNameRequired),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    tree: Table,
    run_name: String,
    out_dir: Option<PathBuf>,
}

impl RunConfig {
    pub(crate) fn new(tree: Table, run_name: String, out_dir: Option<PathBuf>) -> Self {
        Self {
            tree,
            run_name,
            out_dir,
        }
    }

    /// Value at a dotted key.
    pub fn get(&self, dotted_key: &str) -> Result<&Value, RunfigError> {
        table_get(&self.tree, dotted_key).ok_or_else(|| RunfigError::KeyNotFound(dotted_key.into()))
    }

    /// Typed value at a dotted key.
    ///
    /// ```ignore
    /// let layers: i64 = run.get_as("net.num_layers")?;
    /// ```
    pub fn get_as<T: FromValue>(&self, dotted_key: &str) -> Result<T, RunfigError> {
        get_typed(&self.tree, dotted_key)
    }

    /// An owned copy of the whole tree.
    pub fn copy(&self) -> Table {
        self.tree.clone()
    }

    pub fn tree(&self) -> &Table {
        &self.tree
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// The run's output directory, if one was created or reused.
    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }
}

/// Remove the out-dir marker from a loaded tree, returning its path.
pub(crate) fn take_out_dir_marker(tree: &mut Table) -> Option<PathBuf> {
    match tree.remove(OUT_DIR_KEY)? {
        Value::String(path) => Some(PathBuf::from(path)),
        _ => None,
    }
}

/// Create `settings.output_root/run_name` and save `tree` into it, with the
/// out-dir marker so that re-running from the saved file reuses the
/// directory.
pub(crate) fn create_out_dir(
    tree: &Table,
    run_name: &str,
    settings: &Settings,
) -> Result<PathBuf, RunfigError> {
    check_dir_name(run_name)?;
    let out_dir = settings.out_dir_for(run_name);
    std::fs::create_dir_all(&out_dir).map_err(|e| RunfigError::IoError {
        path: out_dir.clone(),
        source: e,
    })?;
    let mut saved = tree.clone();
    saved.insert(
        OUT_DIR_KEY.into(),
        Value::String(out_dir.to_string_lossy().into_owned()),
    );
    let run_file = out_dir.join(&settings.run_file_name);
    format::write_map(&saved, &run_file)?;
    info!(out_dir = %out_dir.display(), "Created run directory");
    Ok(out_dir)
}

/// The run name becomes one directory under the output root.
fn check_dir_name(run_name: &str) -> Result<(), RunfigError> {
    let reason = if run_name.contains(['/', '\\']) {
        "a run name used as a directory cannot contain path separators"
    } else if run_name == "." || run_name == ".." {
        "a run name used as a directory cannot be '.' or '..'"
    } else {
        return Ok(());
    };
    Err(RunfigError::InvalidAnswer {
        key: RUN_NAME_KEY.into(),
        reason: reason.into(),
    })
}
