//! Error types for tessera-core

use std::path::PathBuf;

use crate::configuration::ValidationReport;
use crate::key::RegistrationKey;

/// Result type for tessera-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering, resolving or building.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid registration key '{input}': {reason}")]
    KeyParse { input: String, reason: String },

    #[error("Key {key} depends on namespace '{namespace}' which is not covered. Known namespaces: {known:?}")]
    NamespaceNotFound {
        key: RegistrationKey,
        namespace: String,
        known: Vec<String>,
    },

    #[error("A configuration has already been registered with key {key}")]
    AlreadyRegistered { key: RegistrationKey },

    #[error("Parameter '{name}' already exists")]
    AlreadyExistingParameter { name: String },

    #[error("Condition '{name}' already exists")]
    AlreadyExistingCondition { name: String },

    #[error("Cannot find any parameter with name '{name}'")]
    NonExistingParameter { name: String },

    #[error("The registry has already been expanded; no further registrations are allowed")]
    AlreadyExpanded,

    #[error("Namespace '{namespace}' is already mapped to {existing}")]
    DuplicateNamespace { namespace: String, existing: PathBuf },

    #[error("Could not find registered configuration {key}. Did you register it?")]
    NotRegistered { key: RegistrationKey },

    #[error("Key {key} matches {} registrations: {}", .candidates.len(), render_keys(.candidates))]
    AmbiguousKey {
        key: RegistrationKey,
        candidates: Vec<RegistrationKey>,
    },

    #[error("Registered configuration {key} is not bound to any component")]
    NotBound { key: RegistrationKey },

    #[error("Component {key} is not runnable")]
    NotRunnable { key: RegistrationKey },

    #[error("Expected {key} to build a '{expected}' configuration but got '{actual}'")]
    InvalidConfigurationType {
        key: RegistrationKey,
        expected: String,
        actual: String,
    },

    #[error("The dependency graph is not a DAG. Cycle edges:\n{}", render_edges(.edges))]
    NotADag {
        edges: Vec<(RegistrationKey, RegistrationKey)>,
    },

    #[error("Disconnected dependency graph: {} not reachable from {root}", render_keys(.nodes))]
    DisconnectedGraph {
        root: RegistrationKey,
        nodes: Vec<RegistrationKey>,
    },

    #[error("{0}")]
    ValidationFailure(ValidationReport),

    #[error("The provided path does not exist or is not a directory: {path}")]
    InvalidDirectory { path: PathBuf },

    #[error("Component failure: {message}")]
    Component { message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} at {path}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },
}

/// Coarse classification of an [`Error`], used by callers to decide how to
/// report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed key, unknown namespace.
    Identity,
    /// Duplicate key or parameter, registration after expansion.
    Registration,
    /// Cycles, disconnected subgraphs, unusable directories.
    Graph,
    /// Aggregated parameter and condition failures.
    Validation,
    /// Missing, ambiguous or unbound keys.
    Lookup,
    /// Component failures, I/O and parse errors.
    Internal,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn component(message: impl Into<String>) -> Self {
        Self::Component {
            message: message.into(),
        }
    }

    pub(crate) fn key_parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyParse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::KeyParse { .. } | Error::NamespaceNotFound { .. } => ErrorKind::Identity,
            Error::AlreadyRegistered { .. }
            | Error::AlreadyExistingParameter { .. }
            | Error::AlreadyExistingCondition { .. }
            | Error::NonExistingParameter { .. }
            | Error::AlreadyExpanded
            | Error::DuplicateNamespace { .. }
            | Error::InvalidConfigurationType { .. } => ErrorKind::Registration,
            Error::NotADag { .. }
            | Error::DisconnectedGraph { .. }
            | Error::InvalidDirectory { .. } => ErrorKind::Graph,
            Error::ValidationFailure(_) => ErrorKind::Validation,
            Error::NotRegistered { .. }
            | Error::AmbiguousKey { .. }
            | Error::NotBound { .. }
            | Error::NotRunnable { .. } => ErrorKind::Lookup,
            Error::Component { .. } | Error::Io { .. } | Error::Parse { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

fn render_keys(keys: &[RegistrationKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_edges(edges: &[(RegistrationKey, RegistrationKey)]) -> String {
    edges
        .iter()
        .map(|(from, to)| format!("{from} -> {to}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> RegistrationKey {
        RegistrationKey::new("testing", name, Vec::<String>::new()).unwrap()
    }

    #[test]
    fn test_cycle_message_lists_every_edge() {
        let error = Error::NotADag {
            edges: vec![(key("a"), key("b")), (key("b"), key("a"))],
        };
        let message = error.to_string();
        assert!(message.contains("name:a--namespace:testing -> name:b--namespace:testing"));
        assert!(message.contains("name:b--namespace:testing -> name:a--namespace:testing"));
        assert_eq!(error.kind(), ErrorKind::Graph);
    }

    #[test]
    fn test_ambiguous_message_counts_candidates() {
        let error = Error::AmbiguousKey {
            key: key("a"),
            candidates: vec![key("a"), key("b")],
        };
        assert!(error.to_string().contains("matches 2 registrations"));
        assert_eq!(error.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::AlreadyExpanded.kind(), ErrorKind::Registration);
        assert_eq!(Error::component("boom").kind(), ErrorKind::Internal);
        assert_eq!(
            Error::key_parse("x", "missing name").kind(),
            ErrorKind::Identity
        );
    }
}
