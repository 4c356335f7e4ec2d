//! Setup options read from `tessera.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings file looked up in the setup directory.
pub const SETTINGS_FILENAME: &str = "tessera.toml";
/// Clone target for external git directories, relative to the setup directory.
pub const DEFAULT_SAVE_DIRECTORY: &str = "external";

/// Options of [`crate::Registry::setup`].
///
/// ```toml
/// external_directories = ["../shared", "https://example.com/org/models.git"]
/// save_directory = "deps"
/// fail_on_invalid = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    /// Local directories or git URLs providing extra namespaces.
    pub external_directories: Vec<String>,
    /// Where git URLs are cloned.
    pub save_directory: Option<PathBuf>,
    /// Treat any invalid key as a setup failure.
    pub fail_on_invalid: bool,
}

impl SetupOptions {
    /// Load `tessera.toml` from `directory`. A missing file yields defaults.
    pub fn load(directory: &Path) -> Result<Self> {
        let path = directory.join(SETTINGS_FILENAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        Self::parse(&content, &path)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Self::parse(content, Path::new(SETTINGS_FILENAME))
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Append external directories listed in a JSON array file.
    ///
    /// # Errors
    ///
    /// Fails if the file does not exist, is not a `.json` file or does not
    /// hold an array of strings.
    pub fn with_external_json(mut self, path: &Path) -> Result<Self> {
        if path.extension().is_none_or(|ext| ext != "json") {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                format: "json".to_string(),
                message: "expected a .json file".to_string(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let directories: Vec<String> = serde_json::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "json".to_string(),
            message: e.to_string(),
        })?;
        for directory in directories {
            if !self.external_directories.contains(&directory) {
                self.external_directories.push(directory);
            }
        }
        Ok(self)
    }

    /// Clone target for `directory`. Relative save directories are resolved
    /// against it.
    pub fn save_directory_for(&self, directory: &Path) -> PathBuf {
        match &self.save_directory {
            Some(save) if save.is_absolute() => save.clone(),
            Some(save) => directory.join(save),
            None => directory.join(DEFAULT_SAVE_DIRECTORY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        assert_eq!(SetupOptions::load(temp.path()).unwrap(), SetupOptions::default());
    }

    #[test]
    fn test_load_settings_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(SETTINGS_FILENAME),
            "external_directories = [\"../shared\"]\nfail_on_invalid = true\n",
        )
        .unwrap();

        let options = SetupOptions::load(temp.path()).unwrap();
        assert_eq!(options.external_directories, vec!["../shared"]);
        assert!(options.fail_on_invalid);
        assert_eq!(
            options.save_directory_for(temp.path()),
            temp.path().join(DEFAULT_SAVE_DIRECTORY)
        );
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            SetupOptions::from_toml("fail_on_invalid = \"yes\""),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_external_json() {
        let temp = TempDir::new().unwrap();
        let json = temp.path().join("external.json");
        fs::write(&json, r#"["a", "b", "a"]"#).unwrap();

        let options = SetupOptions::default().with_external_json(&json).unwrap();
        assert_eq!(options.external_directories, vec!["a", "b"]);

        let txt = temp.path().join("external.txt");
        fs::write(&txt, "[]").unwrap();
        assert!(SetupOptions::default().with_external_json(&txt).is_err());
        assert!(
            SetupOptions::default()
                .with_external_json(&temp.path().join("missing.json"))
                .is_err()
        );
    }

    #[test]
    fn test_relative_save_directory() {
        let options = SetupOptions {
            save_directory: Some(PathBuf::from("deps")),
            ..SetupOptions::default()
        };
        assert_eq!(
            options.save_directory_for(Path::new("/work")),
            PathBuf::from("/work/deps")
        );
    }
}
