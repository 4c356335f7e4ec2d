//! Command implementations for tessera-cli

pub mod list;
pub mod run;
pub mod setup;

pub use list::run_list;
pub use run::run_component;
pub use setup::{SetupFlags, run_setup};

use std::path::Path;

use tessera_core::{
    ManifestFileScanner, Overrides, Registry, SetupOptions, SetupReport, Value,
};

use crate::builtins;
use crate::error::{CliError, Result};

/// Set up a registry for `dir` with the options of its `tessera.toml`.
pub(crate) fn prepare_registry(
    dir: &Path,
    options: &SetupOptions,
) -> Result<(Registry, SetupReport)> {
    let mut registry = Registry::new();
    let report = registry.setup(dir, &builtins::manifest(), options, &ManifestFileScanner::new())?;
    Ok((registry, report))
}

/// Parse `name=value` pairs. Values go through [`Value::parse_literal`].
pub(crate) fn parse_overrides(pairs: &[String]) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| {
                CliError::user(format!("Invalid override '{pair}', expected name=value"))
            })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::user(format!(
                "Invalid override '{pair}', parameter name is empty"
            )));
        }
        overrides.insert(name.to_string(), Value::parse_literal(value.trim()));
    }
    Ok(overrides)
}
