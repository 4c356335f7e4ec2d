//! Bookkeeping records of the registry.
//!
//! [`ConfigurationInfo`] is what the registry stores per key.
//! [`ResolutionInfo`] is the per-call accumulator of a DAG resolution: an
//! arena of resolved nodes indexed by key, in build order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::Overrides;
use crate::component::{ComponentFactory, ComponentHandle};
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::key::RegistrationKey;
use crate::registry::ConfigConstructor;
use crate::value::Value;

/// Everything bound to one registration key.
#[derive(Clone)]
pub struct ConfigurationInfo {
    /// Expected [`Configuration::source`] of constructed configurations.
    pub config_type: Option<String>,
    pub constructor: ConfigConstructor,
    pub component: Option<ComponentFactory>,
    /// Instantiate dependencies into components before this component.
    pub build_recursively: bool,
    /// Template this entry was expanded from.
    pub variant_of: Option<RegistrationKey>,
    /// Overrides applied to the template; empty for templates.
    pub variant_overrides: Overrides,
}

impl ConfigurationInfo {
    /// Run the constructor.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfigurationType` when the constructed
    /// configuration does not have the registered type.
    pub fn build(&self, key: &RegistrationKey) -> Result<Configuration> {
        let config = (self.constructor)()?;
        match &self.config_type {
            Some(expected) if expected != config.source() => Err(Error::InvalidConfigurationType {
                key: key.clone(),
                expected: expected.clone(),
                actual: config.source().to_string(),
            }),
            _ => Ok(config),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.component.is_some()
    }

    /// The entry of one variant combination of this template.
    pub fn variant(&self, template: &RegistrationKey, overrides: Overrides) -> ConfigurationInfo {
        let base = Arc::clone(&self.constructor);
        let applied = overrides.clone();
        let constructor: ConfigConstructor = Arc::new(move || base()?.variant(&applied));
        ConfigurationInfo {
            config_type: self.config_type.clone(),
            constructor,
            component: self.component.clone(),
            build_recursively: self.build_recursively,
            variant_of: Some(template.clone()),
            variant_overrides: overrides,
        }
    }
}

impl fmt::Debug for ConfigurationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationInfo")
            .field("config_type", &self.config_type)
            .field("bound", &self.is_bound())
            .field("build_recursively", &self.build_recursively)
            .field("variant_of", &self.variant_of)
            .field("variant_overrides", &self.variant_overrides)
            .finish_non_exhaustive()
    }
}

/// One built node of a resolution.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub key: RegistrationKey,
    /// Validated configuration with every dependency replaced by its built
    /// configuration.
    pub configuration: Configuration,
    /// Dependency parameters as canonical registered keys, before
    /// substitution.
    pub dependencies: IndexMap<String, Value>,
    pub component: Option<ComponentHandle>,
}

/// Ordered, memoized result of one resolution call.
#[derive(Debug, Clone)]
pub struct ResolutionInfo {
    root: RegistrationKey,
    nodes: Vec<ResolvedNode>,
    index: HashMap<RegistrationKey, usize>,
}

impl ResolutionInfo {
    pub fn new(root: RegistrationKey) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn root(&self) -> &RegistrationKey {
        &self.root
    }

    /// Record a built node and return its index. A key that is already
    /// present keeps its first node.
    pub fn add(&mut self, node: ResolvedNode) -> usize {
        if let Some(&index) = self.index.get(&node.key) {
            return index;
        }
        let index = self.nodes.len();
        self.index.insert(node.key.clone(), index);
        self.nodes.push(node);
        index
    }

    pub fn contains(&self, key: &RegistrationKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn index_of(&self, key: &RegistrationKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &RegistrationKey) -> Option<&ResolvedNode> {
        self.index_of(key).map(|i| &self.nodes[i])
    }

    pub fn configuration(&self, key: &RegistrationKey) -> Option<&Configuration> {
        self.get(key).map(|node| &node.configuration)
    }

    pub fn component(&self, key: &RegistrationKey) -> Option<&ComponentHandle> {
        self.get(key).and_then(|node| node.component.as_ref())
    }

    /// Attach the instantiated component of a resolved node. Returns `false`
    /// if the key was never resolved.
    pub fn set_component(&mut self, key: &RegistrationKey, handle: ComponentHandle) -> bool {
        match self.index_of(key) {
            Some(i) => {
                self.nodes[i].component = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Keys in build order: dependencies before dependents.
    pub fn order(&self) -> Vec<&RegistrationKey> {
        self.nodes.iter().map(|node| &node.key).collect()
    }

    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_configuration(&self) -> Option<&Configuration> {
        self.configuration(&self.root)
    }

    pub fn into_root_configuration(mut self) -> Option<Configuration> {
        let index = self.index_of(&self.root)?;
        Some(self.nodes.swap_remove(index).configuration)
    }
}
