//! Clap adapter for the `runfig` binary.
//!
//! The only bridge to the core is [`Cli::into_action()`], which converts
//! clap-parsed arguments into a framework-free [`Action`](crate::Action).
//! From there, all logic flows through [`ops::handle`](crate::ops::handle).

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::types::Action;

/// Compose run configurations from a catalog of inheritable bases.
#[derive(Debug, Parser)]
#[command(name = "runfig", version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Catalog location shared by every subcommand that resolves bases.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Root directory of the base catalog.
    #[arg(short, long, value_name = "DIR")]
    pub base_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve every base reference of a run file and print the result.
    Resolve {
        run_file: PathBuf,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Override a value after resolution (repeatable).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Write the resolved run to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print JSON instead of YAML.
        #[arg(long)]
        json: bool,
    },
    /// Fill in a template interactively and print the resolved run.
    Compose {
        template: PathBuf,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Override a value after resolution (repeatable).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Write the resolved run to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Create the run's output directory and save the run file into it.
        #[arg(long)]
        out_dir: bool,
    },
    /// Show the prompts a template would ask, without prompting.
    Prompts {
        template: PathBuf,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// List catalog entries.
    Bases {
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Only list entries under this dotted directory (e.g. "net.resnet").
        dir: Option<String>,
    },
    /// Print one value of a resolved run file.
    Get {
        run_file: PathBuf,
        /// Dotted key path (e.g. "net.num_layers").
        key: String,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Print a commented template of the engine settings.
    Settings,
}

impl Cli {
    /// Convert clap-parsed args into a framework-agnostic `Action`.
    pub fn into_action(self) -> Action {
        match self.command {
            Command::Resolve {
                run_file,
                catalog,
                overrides,
                output,
                json,
            } => Action::Resolve {
                run_file,
                base_dir: catalog.base_dir,
                overrides,
                output,
                json,
            },
            Command::Compose {
                template,
                catalog,
                overrides,
                output,
                out_dir,
            } => Action::Compose {
                template,
                base_dir: catalog.base_dir,
                overrides,
                output,
                out_dir,
            },
            Command::Prompts { template, catalog } => Action::Prompts {
                template,
                base_dir: catalog.base_dir,
            },
            Command::Bases { catalog, dir } => Action::Bases {
                base_dir: catalog.base_dir,
                dir,
            },
            Command::Get {
                run_file,
                key,
                catalog,
            } => Action::Get {
                run_file,
                key,
                base_dir: catalog.base_dir,
            },
            Command::Settings => Action::Settings,
        }
    }
}
