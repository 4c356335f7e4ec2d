//! Discovery of registration namespaces and the registration manifest.
//!
//! Registrations themselves are plain [`Registration`] descriptors collected
//! in a [`RegistrationManifest`]. Discovery only maps namespaces to the
//! directories that provide them, so the registry can tell which namespaces
//! a dependency may point into.
//!
//! The shipped [`ManifestFileScanner`] looks for call-site listings:
//!
//! ```text
//! project/
//!   nlp/
//!     configurations/
//!       registrations.toml
//! ```
//!
//! ```toml
//! [[registration]]
//! method = "register"
//! namespace = "nlp"
//! function = "register_encoders"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::registry::Registration;

/// Recognized registration entry points.
pub const REGISTRATION_METHODS: &[&str] = &["register", "register_method"];
/// Directory holding a namespace's registration listing.
pub const CONFIGURATIONS_DIR: &str = "configurations";
/// Call-site listing file inside [`CONFIGURATIONS_DIR`].
pub const REGISTRATIONS_FILE: &str = "registrations.toml";

/// One registration entry point found by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub method: String,
    pub namespace: String,
    /// Enclosing function, when known.
    #[serde(default)]
    pub function: Option<String>,
}

/// A namespace and the directory that provides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredNamespace {
    pub namespace: String,
    pub directory: PathBuf,
    pub call_sites: Vec<CallSite>,
}

/// Collaborator that finds registration namespaces below a directory.
pub trait NamespaceScanner {
    fn scan(&self, directory: &Path) -> Result<Vec<DiscoveredNamespace>>;
}

#[derive(Debug, Deserialize)]
struct RegistrationsFile {
    #[serde(default)]
    registration: Vec<CallSite>,
}

/// Scanner reading `configurations/registrations.toml` listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestFileScanner;

impl ManifestFileScanner {
    pub fn new() -> Self {
        Self
    }

    fn collect_listings(&self, directory: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
            {
                continue;
            }
            if path.file_name().is_some_and(|n| n == CONFIGURATIONS_DIR) {
                let listing = path.join(REGISTRATIONS_FILE);
                if listing.is_file() {
                    found.push(listing);
                }
            }
            self.collect_listings(&path, found)?;
        }
        Ok(())
    }

    fn read_listing(&self, path: &Path) -> Result<Vec<CallSite>> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file: RegistrationsFile = toml::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            format: "toml".to_string(),
            message: e.to_string(),
        })?;

        let mut call_sites = Vec::with_capacity(file.registration.len());
        for call_site in file.registration {
            if REGISTRATION_METHODS.contains(&call_site.method.as_str()) {
                call_sites.push(call_site);
            } else {
                warn!(
                    "Skipping unknown registration method '{}' in {}",
                    call_site.method,
                    path.display()
                );
            }
        }
        Ok(call_sites)
    }
}

impl NamespaceScanner for ManifestFileScanner {
    fn scan(&self, directory: &Path) -> Result<Vec<DiscoveredNamespace>> {
        if !directory.is_dir() {
            return Err(Error::InvalidDirectory {
                path: directory.to_path_buf(),
            });
        }

        let mut listings = Vec::new();
        self.collect_listings(directory, &mut listings)?;
        listings.sort();

        let mut namespaces: BTreeMap<String, DiscoveredNamespace> = BTreeMap::new();
        for listing in listings {
            // <provider>/configurations/registrations.toml
            let provider = listing
                .parent()
                .and_then(Path::parent)
                .unwrap_or(directory)
                .to_path_buf();
            for call_site in self.read_listing(&listing)? {
                let entry = namespaces
                    .entry(call_site.namespace.clone())
                    .or_insert_with(|| DiscoveredNamespace {
                        namespace: call_site.namespace.clone(),
                        directory: provider.clone(),
                        call_sites: Vec::new(),
                    });
                if entry.directory != provider {
                    return Err(Error::DuplicateNamespace {
                        namespace: call_site.namespace,
                        existing: entry.directory.clone(),
                    });
                }
                entry.call_sites.push(call_site);
            }
        }

        debug!(
            "Discovered {} namespace(s) under {}",
            namespaces.len(),
            directory.display()
        );
        Ok(namespaces.into_values().collect())
    }
}

/// Explicit list of registrations, applied by [`crate::Registry::apply_manifest`].
///
/// ```
/// use tessera_core::{Configuration, Registration, RegistrationManifest};
///
/// let mut manifest = RegistrationManifest::new();
/// manifest
///     .register(Registration::new("demo", "first", || Ok(Configuration::new())))
///     .register(Registration::new("demo", "second", || Ok(Configuration::new())));
/// assert_eq!(manifest.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistrationManifest {
    registrations: Vec<Registration>,
}

impl RegistrationManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    pub fn extend(&mut self, other: RegistrationManifest) -> &mut Self {
        self.registrations.extend(other.registrations);
        self
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Namespaces of every registration, sorted.
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.registrations.iter().map(Registration::namespace).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Turn external directory specs into local directories.
///
/// Existing directories are canonicalized. Anything else is treated as a
/// git URL and cloned below `save_directory`; an existing clone is reused.
///
/// # Errors
///
/// Returns `Error::InvalidDirectory` for a spec that is neither.
pub fn resolve_external_directories(
    directories: &[String],
    save_directory: &Path,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(directories.len());
    for spec in directories {
        let path = Path::new(spec);
        if path.is_dir() {
            resolved.push(dunce::canonicalize(path).map_err(|e| Error::io(path, e))?);
            continue;
        }

        let invalid = || Error::InvalidDirectory {
            path: PathBuf::from(spec),
        };
        if !looks_like_git_url(spec) {
            return Err(invalid());
        }

        let target = save_directory.join(clone_name(spec).ok_or_else(invalid)?);
        if !target.is_dir() {
            fs::create_dir_all(save_directory).map_err(|e| Error::io(save_directory, e))?;
            debug!("Cloning {} into {}", spec, target.display());
            git2::Repository::clone(spec, &target).map_err(|e| {
                warn!("Failed to clone {spec}: {e}");
                invalid()
            })?;
        }
        resolved.push(dunce::canonicalize(&target).map_err(|e| Error::io(&target, e))?);
    }
    Ok(resolved)
}

fn looks_like_git_url(spec: &str) -> bool {
    spec.contains("://") || spec.starts_with("git@") || spec.ends_with(".git")
}

fn clone_name(spec: &str) -> Option<String> {
    let last = spec
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?
        .trim_end_matches(".git");
    (!last.is_empty()).then(|| last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_listing(root: &Path, provider: &str, content: &str) {
        let dir = root.join(provider).join(CONFIGURATIONS_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(REGISTRATIONS_FILE), content).unwrap();
    }

    #[test]
    fn test_scan_groups_call_sites_by_namespace() {
        let temp = TempDir::new().unwrap();
        write_listing(
            temp.path(),
            "nlp",
            r#"
[[registration]]
method = "register"
namespace = "nlp"
function = "register_encoders"

[[registration]]
method = "register_method"
namespace = "nlp"

[[registration]]
method = "decorate"
namespace = "nlp"
"#,
        );

        let found = ManifestFileScanner::new().scan(temp.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].namespace, "nlp");
        assert_eq!(found[0].directory, temp.path().join("nlp"));
        assert_eq!(found[0].call_sites.len(), 2);
        assert_eq!(
            found[0].call_sites[0].function.as_deref(),
            Some("register_encoders")
        );
    }

    #[test]
    fn test_scan_rejects_namespace_in_two_directories() {
        let temp = TempDir::new().unwrap();
        let listing = "[[registration]]\nmethod = \"register\"\nnamespace = \"shared\"\n";
        write_listing(temp.path(), "a", listing);
        write_listing(temp.path(), "b", listing);

        assert!(matches!(
            ManifestFileScanner::new().scan(temp.path()),
            Err(Error::DuplicateNamespace { .. })
        ));
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ManifestFileScanner::new().scan(&temp.path().join("missing")),
            Err(Error::InvalidDirectory { .. })
        ));
    }

    #[test]
    fn test_scan_reports_malformed_listing() {
        let temp = TempDir::new().unwrap();
        write_listing(temp.path(), "broken", "[[registration]]\nmethod = 3\n");
        assert!(matches!(
            ManifestFileScanner::new().scan(temp.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_resolve_existing_directory() {
        let temp = TempDir::new().unwrap();
        let spec = temp.path().to_string_lossy().to_string();
        let resolved = resolve_external_directories(&[spec], temp.path()).unwrap();
        assert_eq!(resolved, vec![dunce::canonicalize(temp.path()).unwrap()]);
    }

    #[test]
    fn test_resolve_rejects_unknown_spec() {
        let temp = TempDir::new().unwrap();
        let spec = temp.path().join("nowhere").to_string_lossy().to_string();
        assert!(matches!(
            resolve_external_directories(&[spec], temp.path()),
            Err(Error::InvalidDirectory { .. })
        ));
    }

    #[test]
    fn test_clone_name() {
        assert_eq!(
            clone_name("https://example.com/org/models.git").as_deref(),
            Some("models")
        );
        assert_eq!(clone_name("git@example.com:org/tools").as_deref(), Some("tools"));
        assert_eq!(clone_name("https://").as_deref(), None);
    }
}
