use clap::Parser;
use tracing_subscriber::EnvFilter;

use runfig::cli::Cli;
use runfig::tui::TerminalRenderer;
use runfig::{RunfigError, Settings, ops};

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Ignore the error raised if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), RunfigError> {
    let settings = Settings::discover()?;
    let report = ops::handle(&cli.into_action(), &settings, &mut TerminalRenderer::new())?;
    println!("{report}");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
