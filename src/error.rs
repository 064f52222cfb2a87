use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum RunfigError {
    #[error("Malformed config {path}: {reason}")]
    MalformedConfig { path: PathBuf, reason: String },

    #[error("Duplicate base name '{name}' in {dir}")]
    DuplicateName { name: String, dir: PathBuf },

    #[error("Cannot find base '{path}': {reason}")]
    UnresolvedBase { path: String, reason: String },

    #[error("Invalid base reference '{key}': {reason}")]
    InvalidBaseKey { key: String, reason: String },

    #[error("Cyclic base chain: {chain}")]
    CyclicBase { chain: String },

    #[error("Invalid directive at '{key}': {reason}")]
    InvalidDirective { key: String, reason: String },

    #[error("Run name is empty — enter a name before saving")]
    EmptyRunName,

    #[error("Run name is required — set 'run_name' or pick a run name strategy")]
    RunNameRequired,

    #[error("Invalid answer for '{key}': {reason}")]
    InvalidAnswer { key: String, reason: String },

    #[error("No value provided for '{key}'")]
    MissingAnswer { key: String },

    #[error("Materialization aborted by the operator")]
    Aborted,

    #[error("Unsupported config format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to parse {path}: {source}")]
    YamlError {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    TomlError { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings error: {0}")]
    SettingsError(#[from] confique::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("'{key}' is {found} but {expected} was requested")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid override '{arg}': {reason}")]
    InvalidOverride { arg: String, reason: String },

    #[error("Base directory is required — call .base_dir() on the builder")]
    BaseDirRequired,

    #[error("No run file or template — call .run_file() or .template_file() on the builder")]
    RunSourceRequired,

    #[cfg(feature = "tui")]
    #[error("Terminal error: {0}")]
    TerminalError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_base_names_full_path() {
        let err = RunfigError::UnresolvedBase {
            path: "net.resnet.resnet50".into(),
            reason: "no entry 'resnet50'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("net.resnet.resnet50"));
        assert!(msg.contains("resnet50"));
    }

    #[test]
    fn invalid_directive_names_key() {
        let err = RunfigError::InvalidDirective {
            key: "dataset.date".into(),
            reason: "invalid date".into(),
        };
        assert!(err.to_string().contains("dataset.date"));
    }

    #[test]
    fn base_dir_required_formats() {
        let err = RunfigError::BaseDirRequired;
        assert!(err.to_string().contains("base_dir"));
    }
}
