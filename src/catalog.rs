//! The catalog of reusable partial configurations.
//!
//! A catalog is loaded from a directory tree. Every config file becomes an
//! entry keyed by its file stem, and every subdirectory becomes a nested
//! entry keyed by its name:
//!
//! ```text
//! bases/
//!   net/
//!     efficientnet.yaml     → net.efficientnet
//!     resnet/
//!       resnet18.yaml       → net.resnet.resnet18
//! ```
//!
//! Dotted paths into the catalog are what inheritance references and
//! `@BASE(...)` directives point at. The catalog is read-only once built.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::RunfigError;
use crate::format::{self, Format};
use crate::value::{Table, Value};

#[derive(Debug, Clone, Default)]
pub struct BaseCatalog {
    root: Option<PathBuf>,
    tree: Table,
    /// Dotted paths of entries loaded from files.
    files: BTreeSet<String>,
    /// Dotted paths of entries loaded from directories.
    dirs: BTreeSet<String>,
}

impl BaseCatalog {
    /// A catalog with no entries. Every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every config file under `root`, recursively.
    pub fn load(root: &Path) -> Result<Self, RunfigError> {
        let mut catalog = BaseCatalog {
            root: Some(root.to_path_buf()),
            ..Self::default()
        };
        catalog.tree = catalog.load_dir(root, "")?;
        debug!(
            root = %root.display(),
            files = catalog.files.len(),
            "Loaded base catalog"
        );
        Ok(catalog)
    }

    /// Build a catalog from `(dotted path, contents)` pairs, as if each pair
    /// were a file at the matching location.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Table)>,
        S: AsRef<str>,
    {
        let mut catalog = Self::default();
        for (dotted, table) in entries {
            let dotted = dotted.as_ref();
            let mut prefix = String::new();
            let segments: Vec<&str> = dotted.split('.').collect();
            for segment in &segments[..segments.len() - 1] {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                catalog.dirs.insert(prefix.clone());
            }
            crate::value::table_set(&mut catalog.tree, dotted, Value::Map(table));
            catalog.files.insert(dotted.to_string());
        }
        catalog
    }

    fn load_dir(&mut self, dir: &Path, prefix: &str) -> Result<Table, RunfigError> {
        let io_err = |e| RunfigError::IoError {
            path: dir.to_path_buf(),
            source: e,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            paths.push(entry.map_err(io_err)?.path());
        }
        paths.sort();

        let mut table = Table::new();
        for path in paths {
            let Some(name) = entry_name(&path) else {
                trace!(path = %path.display(), "Skipping unnamed entry");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let dotted = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            let value = if path.is_dir() {
                let nested = self.load_dir(&path, &dotted)?;
                self.dirs.insert(dotted.clone());
                nested
            } else if Format::from_path(&path).is_some() {
                let loaded = format::read_map(&path)?;
                trace!(entry = %dotted, "Loaded base");
                self.files.insert(dotted.clone());
                loaded
            } else {
                trace!(path = %path.display(), "Skipping non-config file");
                continue;
            };

            if table.contains_key(&name) {
                return Err(RunfigError::DuplicateName {
                    name,
                    dir: dir.to_path_buf(),
                });
            }
            table.insert(name, Value::Map(value));
        }
        Ok(table)
    }

    /// The directory the catalog was loaded from, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn tree(&self) -> &Table {
        &self.tree
    }

    /// Dotted paths of all file entries, sorted.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Whether `dotted` names a directory of the catalog.
    pub fn is_dir(&self, dotted: &str) -> bool {
        self.dirs.contains(dotted)
    }

    /// Descend one segment at a time to the map at `dotted`.
    ///
    /// The path may end inside a file's contents as long as it lands on a map.
    pub fn lookup(&self, dotted: &str) -> Result<&Table, RunfigError> {
        let mut current = &self.tree;
        let mut walked = String::new();
        for segment in dotted.split('.') {
            let next = current.get(segment).ok_or_else(|| RunfigError::UnresolvedBase {
                path: dotted.to_string(),
                reason: if walked.is_empty() {
                    format!("no entry '{segment}' in the catalog")
                } else {
                    format!("no entry '{segment}' under '{walked}'")
                },
            })?;
            if !walked.is_empty() {
                walked.push('.');
            }
            walked.push_str(segment);
            current = next.as_table().ok_or_else(|| RunfigError::UnresolvedBase {
                path: dotted.to_string(),
                reason: format!("'{walked}' is {}, not a map", next.type_name()),
            })?;
        }
        Ok(current)
    }

    /// Every file entry transitively under the directory `dotted`, as
    /// `(file stem, dotted path)` pairs sorted by dotted path.
    ///
    /// Returns `None` if `dotted` is not a directory of the catalog.
    pub fn options_under(&self, dotted: &str) -> Option<Vec<(String, String)>> {
        if !self.is_dir(dotted) {
            return None;
        }
        let prefix = format!("{dotted}.");
        Some(
            self.files
                .iter()
                .filter(|path| path.starts_with(&prefix))
                .map(|path| {
                    let stem = path.rsplit('.').next().unwrap_or(path).to_string();
                    (stem, path.clone())
                })
                .collect(),
        )
    }
}

/// Catalog key for a directory entry: the file stem for files, the name
/// for directories.
fn entry_name(path: &Path) -> Option<String> {
    if path.is_dir() {
        path.file_name()?.to_str().map(str::to_string)
    } else {
        format::file_stem(path)
    }
}
