use std::path::PathBuf;

/// Where to search for the settings file.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// Current working directory.
    Cwd,
    /// An explicit absolute path.
    Path(PathBuf),
}

/// A runfig operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Resolve a concrete run file against the catalog.
    Resolve {
        run_file: PathBuf,
        base_dir: PathBuf,
        overrides: Vec<String>,
        output: Option<PathBuf>,
        json: bool,
    },
    /// Materialize a template interactively.
    Compose {
        template: PathBuf,
        base_dir: PathBuf,
        overrides: Vec<String>,
        output: Option<PathBuf>,
        out_dir: bool,
    },
    /// Outline the prompts a template would show, without prompting.
    Prompts { template: PathBuf, base_dir: PathBuf },
    /// List catalog entries, optionally only those under a dotted directory.
    Bases {
        base_dir: PathBuf,
        dir: Option<String>,
    },
    /// Print one value of a resolved run file.
    Get {
        run_file: PathBuf,
        key: String,
        base_dir: PathBuf,
    },
    /// Print the commented settings template.
    Settings,
}
