//! Run command implementation

use std::path::Path;

use tessera_core::{RegistrationKey, SetupOptions};
use tracing::info;

use super::{parse_overrides, prepare_registry};
use crate::error::{CliError, Result};
use crate::interactive;

/// Run the component registered under `key`.
///
/// Without a key, `interactive` must be set and the key is picked with
/// prompts. Overrides apply to the root configuration only.
pub fn run_component(
    dir: &Path,
    key: Option<&str>,
    set: &[String],
    interactive: bool,
) -> Result<()> {
    let overrides = parse_overrides(set)?;
    let options = SetupOptions::load(dir)?;
    let (registry, _) = prepare_registry(dir, &options)?;

    let key: RegistrationKey = match key {
        Some(text) => text.parse()?,
        None if interactive => interactive::select_key(&registry)?,
        None => {
            return Err(CliError::user(
                "No key given. Pass a registration key or use --interactive",
            ));
        }
    };

    let resolved = registry.resolve_key(&key)?;
    info!("Running {resolved}");
    registry.run_component(&resolved, &overrides)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_without_prompt() {
        let temp = TempDir::new().unwrap();
        let err = run_component(temp.path(), None, &[], false).unwrap_err();
        assert!(matches!(err, CliError::User { .. }));
    }

    #[test]
    fn test_non_runnable_component() {
        let temp = TempDir::new().unwrap();
        let err = run_component(temp.path(), Some("name:formatter--namespace:demo"), &[], false)
            .unwrap_err();
        assert!(matches!(err, CliError::Core(tessera_core::Error::NotRunnable { .. })));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unknown_parameter_override() {
        let temp = TempDir::new().unwrap();
        let err = run_component(
            temp.path(),
            Some("name:greeter--namespace:demo"),
            &["volume=11".to_string()],
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(tessera_core::Error::NonExistingParameter { .. })
        ));
    }
}
