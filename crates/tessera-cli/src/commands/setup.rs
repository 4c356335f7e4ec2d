//! Setup command implementation

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde_json::json;
use tessera_core::{SetupOptions, SetupReport};

use super::prepare_registry;
use crate::error::{CliError, Result};

/// Directory below the project receiving the key listings.
pub const OUTPUT_DIR: &str = "registrations";
pub const VALID_KEYS_FILE: &str = "valid_keys.json";
pub const INVALID_KEYS_FILE: &str = "invalid_keys.json";

/// Command-line flags layered over `tessera.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupFlags {
    pub external_paths: Vec<String>,
    pub external_json: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    pub fail_on_invalid: bool,
}

impl SetupFlags {
    /// Merge into the options read from the project directory. Flags add
    /// external directories and override the save directory; either side
    /// can enable `fail_on_invalid`.
    pub fn apply(self, mut options: SetupOptions) -> Result<SetupOptions> {
        for path in self.external_paths {
            if !options.external_directories.contains(&path) {
                options.external_directories.push(path);
            }
        }
        if let Some(json) = &self.external_json {
            options = options.with_external_json(json)?;
        }
        if self.save_dir.is_some() {
            options.save_directory = self.save_dir;
        }
        options.fail_on_invalid |= self.fail_on_invalid;
        Ok(options)
    }
}

/// Run the setup command
pub fn run_setup(dir: &Path, flags: SetupFlags) -> Result<()> {
    let options = flags.apply(SetupOptions::load(dir)?)?;
    let (registry, report) = prepare_registry(dir, &options)?;

    let output = write_report(dir, &report)?;

    println!("{}", "Setup".bold());
    println!();
    println!("{}:       {}", "Path".dimmed(), dir.display());
    let namespaces: Vec<&str> = registry.namespaces().collect();
    println!("{}: {}", "Namespaces".dimmed(), namespaces.join(", ").cyan());
    println!("{}:     {}", "Output".dimmed(), output.display());
    println!();

    println!(
        "{} {} valid key(s)",
        "+".green(),
        report.valid_keys.len().to_string().green()
    );
    if report.is_clean() {
        println!("{} No invalid keys", "+".green());
    } else {
        println!(
            "{} {} invalid key(s)",
            "!".yellow(),
            report.invalid_keys.len().to_string().yellow()
        );
        for (key, error) in &report.invalid_keys {
            println!("  {} {}", "-".red(), key.to_string().cyan());
            for line in error.lines() {
                println!("      {}", line.dimmed());
            }
        }
    }

    if options.fail_on_invalid && !report.is_clean() {
        return Err(CliError::InvalidKeys {
            count: report.invalid_keys.len(),
        });
    }
    Ok(())
}

/// Write both key listings, returning the directory holding them.
fn write_report(dir: &Path, report: &SetupReport) -> Result<PathBuf> {
    let output = dir.join(OUTPUT_DIR);
    fs::create_dir_all(&output)?;

    let valid: Vec<serde_json::Value> = report.valid_keys.iter().map(|key| key.to_json()).collect();
    fs::write(
        output.join(VALID_KEYS_FILE),
        serde_json::to_string_pretty(&valid)?,
    )?;

    let invalid: Vec<serde_json::Value> = report
        .invalid_keys
        .iter()
        .map(|(key, error)| json!({ "key": key.to_json(), "error": error }))
        .collect();
    fs::write(
        output.join(INVALID_KEYS_FILE),
        serde_json::to_string_pretty(&invalid)?,
    )?;

    tracing::debug!("Wrote key listings to {}", output.display());
    Ok(output)
}
