//! Tessera CLI
//!
//! Command-line entry points for setting up a project and running
//! registered components.

mod builtins;
mod cli;
mod commands;
mod error;
mod interactive;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr. `RUST_LOG` wins unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(cmd) => execute_command(cmd),
        None => {
            println!("{} configuration registry", "tessera".green().bold());
            println!();
            println!("Run {} for available commands.", "tessera --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Setup {
            dir,
            external_paths,
            external_json,
            save_dir,
            fail_on_invalid,
        } => commands::run_setup(
            &dir,
            commands::SetupFlags {
                external_paths,
                external_json,
                save_dir,
                fail_on_invalid,
            },
        ),
        Commands::Run {
            key,
            dir,
            set,
            interactive,
        } => commands::run_component(&dir, key.as_deref(), &set, interactive),
        Commands::List {
            dir,
            namespace,
            name,
            tag,
            json,
        } => commands::run_list(&dir, namespace.as_deref(), name.as_deref(), &tag, json),
    }
}
