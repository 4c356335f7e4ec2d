//! Registration and resolution core for tessera.
//!
//! Independently authored [`Configuration`] schemas are registered under a
//! [`RegistrationKey`], declare dependencies on each other through
//! key-valued parameters, and are resolved on demand into a validated
//! dependency tree or a live [`Component`].
//!
//! # Example
//!
//! ```
//! use tessera_core::{Configuration, ParamSpec, Registration, Registry};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register_configuration(Registration::new("demo", "greeter", || {
//!         let mut config = Configuration::named("Greeter");
//!         config.add(ParamSpec::new("message").value("hello").required())?;
//!         Ok(config)
//!     }))
//!     .unwrap();
//!
//! let key = "name:greeter--namespace:demo".parse().unwrap();
//! let config = registry.build_configuration(&key).unwrap();
//! assert_eq!(config.value("message").unwrap().as_str(), Some("hello"));
//! ```

pub mod component;
pub mod configuration;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod key;
pub mod param;
pub mod registry;
pub mod resolution;
pub mod settings;
pub mod value;

pub use component::{Component, ComponentFactory, ComponentHandle, RunnableComponent};
pub use configuration::{
    Condition, ConditionStage, Configuration, ValidationReport, ValidationResult,
};
pub use discovery::{
    CallSite, DiscoveredNamespace, ManifestFileScanner, NamespaceScanner, RegistrationManifest,
    REGISTRATION_METHODS,
};
pub use error::{Error, ErrorKind, Result};
pub use graph::DependencyGraph;
pub use key::{KeyQuery, KeyRecord, RegistrationKey};
pub use param::{Param, ParamSpec};
pub use registry::{ConfigConstructor, Registration, Registry, SetupReport};
pub use resolution::{ConfigurationInfo, ResolutionInfo, ResolvedNode};
pub use settings::SetupOptions;
pub use value::{ParamType, Value};

/// Parameter overrides keyed by parameter name, in application order.
pub type Overrides = indexmap::IndexMap<String, Value>;
