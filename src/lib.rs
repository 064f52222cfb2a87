//! Compose run configurations from a catalog of inheritable bases and
//! interactive templates.
//!
//! Experiments, jobs and pipelines tend to share most of their
//! configuration. Runfig keeps the shared parts in a **base catalog**, a
//! directory of small YAML or TOML files, and lets each run say which of
//! them it builds on:
//!
//! ```yaml
//! # run.yaml
//! run_name: exp1
//! dataset:
//!   base: dataset.cifar.cifar100
//! net:
//!   base: net.resnet.resnet18
//!   num_layers: 34
//! ```
//!
//! ```ignore
//! let run = Runfig::builder()
//!     .base_dir("bases")
//!     .run_file("run.yaml")
//!     .cli_args(std::env::args().skip(1))
//!     .load()?;
//! let layers: i64 = run.get_as("net.num_layers")?;
//! ```
//!
//! # Inheritance
//!
//! Any map may carry the reserved key (`base` by default) holding a dotted
//! catalog path. Resolution replaces the reference with every field of the
//! referenced entry that the map does not set itself:
//!
//! - **Local wins.** A key present in the map is never overwritten.
//! - **Chains.** An entry may carry its own reference; it is followed until
//!   none is left. A chain that comes back on itself fails with
//!   [`CyclicBase`](RunfigError::CyclicBase).
//! - **Per level.** Nested maps resolve their own references independently,
//!   including maps copied in from a base.
//!
//! # Templates
//!
//! A template is a run file whose string values may be **directives**:
//! `@BOOL(true)`, `@DATE(today)`, `@FILE(path)`, `@OPTIONS(sgd; adam)` and
//! `@BASE(net.resnet)`. Loading a template builds one prompt per value and
//! drives a [`FormRenderer`] through an edit phase and a recap phase where
//! the run name is confirmed. The answers are assembled into a run tree and
//! resolved like any run file. With the `tui` feature (on by default)
//! [`RunfigBuilder::load`] paints the form in the terminal.
//!
//! # Layer precedence
//!
//! ```text
//! Catalog bases         base: dataset.cifar.cifar100
//!        ↑ overridden by
//! Run file / answers    local keys
//!        ↑ overridden by
//! Overrides             --net.num_layers=50, .cli_override()
//! ```
//!
//! # Runs
//!
//! [`RunConfig`] is an immutable handle on the resolved tree. Every run has
//! a name, taken from `run_name` or generated from the current time
//! ([`RunNameStrategy`]). With
//! [`create_out_dir`](RunfigBuilder::create_out_dir) the builder creates
//! `output_root/run_name` and saves the final tree there; loading that saved
//! file later reuses the same directory.
//!
//! # Engine settings
//!
//! The reserved key, output root and prompt layout come from [`Settings`],
//! layered with confique from `runfig.toml` files and `RUNFIG_*` environment
//! variables.
//!
//! # Error handling
//!
//! All fallible operations return [`RunfigError`]. Errors name the file,
//! dotted key or catalog path at fault. Enable the `rich-errors` feature
//! for [miette](https://docs.rs/miette) diagnostics.

pub mod error;
pub mod types;

mod builder;
pub mod catalog;
#[cfg(feature = "clap")]
pub mod cli;
pub mod directive;
pub mod format;
pub mod literal;
pub(crate) mod merge;
pub mod ops;
pub mod overrides;
pub mod prompt;
pub mod resolve;
pub mod run;
pub mod session;
pub mod settings;
#[cfg(feature = "tui")]
pub mod tui;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use builder::{Runfig, RunfigBuilder, resolve_tree};
pub use catalog::BaseCatalog;
pub use error::RunfigError;
pub use ops::Report;
pub use prompt::{Answer, Prompt, PromptKind, PromptOptions};
pub use resolve::{Resolver, resolve};
pub use run::{RunConfig, RunNameStrategy};
pub use session::{Form, FormAction, FormRenderer, InteractiveSession, Phase, materialize};
pub use settings::Settings;
pub use types::{Action, SearchPath};
pub use value::{FromValue, Table, Value};
