mod commands;
mod display;
mod scan;

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const VULNERABLE: u8 = 1;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "gemaudit")]
#[command(version, about = "Audit a Gemfile.lock for vulnerable gems and insecure sources", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    check: commands::Check,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a project's lockfile against the advisory database (default)
    Check(commands::Check),

    /// Print the version and the number of known advisories
    Version(commands::Version),

    /// Count advisories per gem
    Stats(commands::Stats),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Some(Commands::Check(cmd)) => cmd.verbose,
        None => cli.check.verbose,
        Some(_) => false,
    };
    init_tracing(verbose);

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let result = match cli.command {
        Some(Commands::Check(cmd)) => cmd.run(),
        None => cli.check.run(),
        Some(Commands::Version(cmd)) => cmd.run().map(|()| false),
        Some(Commands::Stats(cmd)) => cmd.run().map(|()| false),
    };

    match result {
        Ok(true) => ExitCode::from(exit_codes::VULNERABLE),
        Ok(false) => ExitCode::from(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
