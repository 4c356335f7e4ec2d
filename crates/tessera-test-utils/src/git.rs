//! Git repositories standing in for remote external directories.

use std::fs;
use std::path::Path;

use tessera_core::discovery::{CONFIGURATIONS_DIR, REGISTRATIONS_FILE};

/// Initialises an empty git repository using `git2`.
///
/// # Panics
/// Panics if `git2::Repository::init` fails.
pub fn real_git_repo(path: &Path) -> git2::Repository {
    git2::Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "real_git_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

/// Initialises a git repository whose single commit provides `namespace`
/// through a `configurations/registrations.toml` listing at its root.
///
/// Returns a `file://` URL that [`tessera_core::discovery::resolve_external_directories`]
/// treats as a git remote.
///
/// # Panics
/// Panics if any filesystem or git operation fails.
pub fn provider_repo_with_commit(path: &Path, namespace: &str) -> String {
    let repo = real_git_repo(path);

    let listing_dir = path.join(CONFIGURATIONS_DIR);
    fs::create_dir_all(&listing_dir)
        .unwrap_or_else(|e| panic!("provider_repo_with_commit: failed to create listing dir: {e}"));
    fs::write(
        listing_dir.join(REGISTRATIONS_FILE),
        format!("[[registration]]\nmethod = \"register\"\nnamespace = \"{namespace}\"\n"),
    )
    .unwrap_or_else(|e| panic!("provider_repo_with_commit: failed to write listing: {e}"));

    let commit = || -> Result<git2::Oid, git2::Error> {
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = git2::Signature::now("Test User", "test@test.com")?;
        repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            "Initial commit",
            &tree,
            &[],
        )
    };
    commit().unwrap_or_else(|e| panic!("provider_repo_with_commit: commit failed: {e}"));

    format!("file://{}", path.display())
}
