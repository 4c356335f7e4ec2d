//! [`TestProject`] builder for setup and discovery scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tessera_core::discovery::{CONFIGURATIONS_DIR, REGISTRATIONS_FILE};
use tessera_core::settings::SETTINGS_FILENAME;

/// A temporary project directory with helpers for writing registration
/// listings and settings, and for asserting on setup output.
///
/// # Example
///
/// ```rust,no_run
/// use tessera_test_utils::project::TestProject;
///
/// let project = TestProject::new();
/// project.write_listing("nlp", &[("register", "nlp")]);
/// project.write_settings("fail_on_invalid = true\n");
/// project.assert_file_exists("nlp/configurations/registrations.toml");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `<provider>/configurations/registrations.toml` listing one
    /// `(method, namespace)` call site per entry.
    pub fn write_listing(&self, provider: &str, call_sites: &[(&str, &str)]) -> PathBuf {
        let dir = self.root().join(provider).join(CONFIGURATIONS_DIR);
        fs::create_dir_all(&dir).unwrap();

        let mut content = String::new();
        for (method, namespace) in call_sites {
            content.push_str(&format!(
                "[[registration]]\nmethod = \"{method}\"\nnamespace = \"{namespace}\"\n\n"
            ));
        }
        let path = dir.join(REGISTRATIONS_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `tessera.toml` at the project root.
    pub fn write_settings(&self, content: &str) {
        fs::write(self.root().join(SETTINGS_FILENAME), content).unwrap();
    }

    /// Write an arbitrary file relative to the root, creating parents.
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        full_path
    }

    /// Parse a JSON file relative to the root.
    ///
    /// # Panics
    /// Panics if the file cannot be read or is not valid JSON.
    pub fn read_json(&self, path: &str) -> serde_json::Value {
        let full_path = self.root().join(path);
        let content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Invalid JSON in {}: {e}", full_path.display()))
    }

    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }
}
