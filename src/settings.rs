//! Engine settings: reserved keys, output locations and prompt layout.
//!
//! Settings are layered with confique, highest priority first:
//!
//! 1. `RUNFIG_*` environment variables
//! 2. `runfig.toml` in the current working directory
//! 3. `runfig.toml` in the platform config directory
//! 4. built-in defaults
//!
//! Missing files are skipped.

use std::path::PathBuf;

use confique::Config;
use tracing::debug;

use crate::error::RunfigError;
use crate::prompt::PromptOptions;
use crate::types::SearchPath;

/// File name searched for in every [`SearchPath`].
pub const SETTINGS_FILE: &str = "runfig.toml";

const APP_NAME: &str = "runfig";

#[derive(Config, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Reserved key holding an inheritance reference.
    #[config(default = "base", env = "RUNFIG_BASE_KEY")]
    pub base_key: String,

    /// Directory under which run output directories are created.
    #[config(default = "logs", env = "RUNFIG_OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// Name of the run file written into each output directory.
    #[config(default = "run.yaml")]
    pub run_file_name: String,

    /// Spaces of prompt label indentation per nesting level.
    #[config(default = 3)]
    pub label_indent: usize,

    /// chrono format used to generate run names from the current time.
    #[config(default = "%Y-%m-%d-%H-%M-%S")]
    pub run_name_date_format: String,
}

impl Settings {
    /// Built-in defaults only.
    pub fn defaults() -> Result<Self, RunfigError> {
        Ok(Settings::builder().load()?)
    }

    /// Layer env vars over the platform and working-directory settings files.
    pub fn discover() -> Result<Self, RunfigError> {
        Self::load_from(&[SearchPath::Platform, SearchPath::Cwd])
    }

    /// Load from `runfig.toml` in each search path. Paths are listed in
    /// priority-ascending order: the last one wins. Env vars win over all.
    pub fn load_from(paths: &[SearchPath]) -> Result<Self, RunfigError> {
        let mut builder = Settings::builder().env();
        for sp in paths.iter().rev() {
            let Some(dir) = resolve_search_path(sp) else {
                continue;
            };
            let file = dir.join(SETTINGS_FILE);
            if file.is_file() {
                debug!(path = %file.display(), "Using settings file");
                builder = builder.file(file);
            }
        }
        Ok(builder.load()?)
    }

    /// Commented TOML template of every setting with its default.
    pub fn template() -> String {
        confique::toml::template::<Settings>(confique::toml::FormatOptions::default())
    }

    /// Prompt options derived from these settings, dated today.
    pub fn prompt_options(&self) -> PromptOptions {
        PromptOptions {
            base_key: self.base_key.clone(),
            label_indent: self.label_indent,
            ..PromptOptions::default()
        }
    }

    /// Output directory of the run called `run_name`.
    pub fn out_dir_for(&self, run_name: &str) -> PathBuf {
        self.output_root.join(run_name)
    }
}

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// Returns `None` if the path cannot be resolved (e.g. no platform config
/// directory on this system).
pub fn resolve_search_path(sp: &SearchPath) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", APP_NAME)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}
