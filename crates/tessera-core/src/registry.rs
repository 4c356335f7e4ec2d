//! The configuration registry.
//!
//! A [`Registry`] maps every [`RegistrationKey`] to the [`ConfigurationInfo`]
//! needed to construct it. Building a key goes through the same stages every
//! time:
//!
//! 1. the dependency subgraph reachable from the key is collected,
//! 2. it is checked to be acyclic and connected,
//! 3. configurations are built bottom-up, each dependency key replaced by
//!    the built dependency and every node validated,
//! 4. optionally, components are instantiated bottom-up.
//!
//! Any failure aborts the call; nothing is committed to the catalog.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::Overrides;
use crate::component::{Component, ComponentFactory, ComponentHandle};
use crate::configuration::Configuration;
use crate::discovery::{self, NamespaceScanner, RegistrationManifest};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::key::{KeyQuery, RegistrationKey};
use crate::resolution::{ConfigurationInfo, ResolutionInfo, ResolvedNode};
use crate::settings::SetupOptions;
use crate::value::Value;

/// Produces the default configuration of a registration.
pub type ConfigConstructor = Arc<dyn Fn() -> Result<Configuration> + Send + Sync>;

/// Descriptor of one registration.
///
/// ```
/// use tessera_core::{Configuration, Registration};
///
/// let registration =
///     Registration::new("nlp", "tokenizer", || Ok(Configuration::named("Tokenizer")))
///         .tag("fast")
///         .config_type("Tokenizer")
///         .build_recursively(false);
/// assert_eq!(
///     registration.key().unwrap().to_string(),
///     "name:tokenizer--tags:[fast]--namespace:nlp"
/// );
/// ```
#[derive(Clone)]
pub struct Registration {
    namespace: String,
    name: String,
    tags: BTreeSet<String>,
    config_type: Option<String>,
    constructor: ConfigConstructor,
    component: Option<ComponentFactory>,
    build_recursively: bool,
}

impl Registration {
    pub fn new<F>(namespace: impl Into<String>, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Configuration> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            tags: BTreeSet::new(),
            config_type: None,
            constructor: Arc::new(constructor),
            component: None,
            build_recursively: true,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Require constructed configurations to carry this source name.
    pub fn config_type(mut self, config_type: impl Into<String>) -> Self {
        self.config_type = Some(config_type.into());
        self
    }

    /// Bind a component factory.
    pub fn component<F, C>(mut self, factory: F) -> Self
    where
        F: Fn(&Configuration) -> Result<C> + Send + Sync + 'static,
        C: Component,
    {
        self.component = Some(Arc::new(move |config: &Configuration| {
            let component: Arc<dyn Component> = Arc::new(factory(config)?);
            Ok(component)
        }));
        self
    }

    pub fn build_recursively(mut self, build_recursively: bool) -> Self {
        self.build_recursively = build_recursively;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> Result<RegistrationKey> {
        RegistrationKey::new(
            self.namespace.clone(),
            self.name.clone(),
            self.tags.iter().cloned(),
        )
    }

    fn into_info(self) -> ConfigurationInfo {
        ConfigurationInfo {
            config_type: self.config_type,
            constructor: self.constructor,
            component: self.component,
            build_recursively: self.build_recursively,
            variant_of: None,
            variant_overrides: Overrides::new(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("config_type", &self.config_type)
            .field("bound", &self.component.is_some())
            .field("build_recursively", &self.build_recursively)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Registry::setup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    /// Keys whose configuration builds and validates.
    pub valid_keys: Vec<RegistrationKey>,
    /// Keys that fail, with the failure message.
    pub invalid_keys: Vec<(RegistrationKey, String)>,
}

impl SetupReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_keys.is_empty()
    }
}

/// Catalog of registered configurations.
///
/// The registry is an explicit value: build one per process (or per test)
/// and pass it to whoever resolves keys.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<RegistrationKey, ConfigurationInfo>,
    expanded: bool,
    /// Covered namespaces and the directory providing each, if discovered.
    namespaces: BTreeMap<String, Option<PathBuf>>,
    registration_context: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every registration, namespace and flag.
    pub fn initialize(&mut self) {
        self.entries.clear();
        self.expanded = false;
        self.namespaces.clear();
        self.registration_context = None;
    }

    pub fn teardown(&mut self) {
        debug!("Tearing down registry with {} entries", self.entries.len());
        self.initialize();
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Namespace whose registrations are currently being applied.
    pub fn registration_context(&self) -> Option<&str> {
        self.registration_context.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &RegistrationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &RegistrationKey> {
        self.entries.keys()
    }

    // Registration

    /// Register a configuration.
    ///
    /// The default configuration is constructed once to check that every
    /// dependency pointing outside the registration's namespace targets a
    /// covered namespace.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExpanded` once [`Registry::expand_variants`] ran
    /// - `Error::AlreadyRegistered` for an exact duplicate key
    /// - `Error::NamespaceNotFound` for a dependency into an unknown namespace
    pub fn register_configuration(
        &mut self,
        registration: Registration,
    ) -> Result<RegistrationKey> {
        if self.expanded {
            return Err(Error::AlreadyExpanded);
        }
        let key = registration.key()?;
        if key.is_wildcard() {
            return Err(Error::KeyParse {
                input: key.to_string(),
                reason: "wildcards are only allowed in queries".to_string(),
            });
        }
        if self.entries.contains_key(&key) {
            return Err(Error::AlreadyRegistered { key });
        }

        let info = registration.into_info();
        let config = info.build(&key)?;
        for dependency in referenced_keys(&config) {
            if dependency.namespace() != key.namespace()
                && !self.is_namespace_covered(dependency.namespace())
            {
                return Err(Error::NamespaceNotFound {
                    key: key.clone(),
                    namespace: dependency.namespace().to_string(),
                    known: self.namespaces.keys().cloned().collect(),
                });
            }
        }

        self.namespaces
            .entry(key.namespace().to_string())
            .or_insert(None);
        debug!("Registered {key}");
        self.entries.insert(key.clone(), info);
        Ok(key)
    }

    /// Register one variant combination of an already registered template.
    ///
    /// The new key is the template key plus one `param=value` tag per
    /// override, and its constructor applies the overrides to the template's
    /// configuration.
    pub fn register_configuration_from_variant(
        &mut self,
        template: &RegistrationKey,
        overrides: Overrides,
    ) -> Result<RegistrationKey> {
        if self.expanded {
            return Err(Error::AlreadyExpanded);
        }
        let info = self.entry(template)?;
        let key = template.from_variant(&overrides)?;
        if self.entries.contains_key(&key) {
            return Err(Error::AlreadyRegistered { key });
        }
        let variant = info.variant(template, overrides);
        debug!("Registered variant {key}");
        self.entries.insert(key.clone(), variant);
        Ok(key)
    }

    /// Apply every registration of a manifest, all or nothing.
    ///
    /// Namespaces of the manifest count as covered while it is applied, so
    /// registrations may depend on each other across namespaces in any
    /// order.
    pub fn apply_manifest(
        &mut self,
        manifest: &RegistrationManifest,
    ) -> Result<Vec<RegistrationKey>> {
        let saved_entries = self.entries.clone();
        let saved_namespaces = self.namespaces.clone();
        for namespace in manifest.namespaces() {
            self.namespaces.entry(namespace.to_string()).or_insert(None);
        }

        let mut keys = Vec::with_capacity(manifest.len());
        let mut outcome = Ok(());
        for registration in manifest.registrations() {
            self.registration_context = Some(registration.namespace().to_string());
            match self.register_configuration(registration.clone()) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.registration_context = None;

        if let Err(e) = outcome {
            self.entries = saved_entries;
            self.namespaces = saved_namespaces;
            return Err(e);
        }
        debug!("Applied manifest with {} registrations", keys.len());
        Ok(keys)
    }

    /// Register every variant combination of every template.
    ///
    /// Templates are processed dependencies first. A dependency parameter
    /// pointing at a template that has variants gains that template's
    /// variant keys as extra variants, so variants propagate up the graph.
    /// All new entries are committed together; the registry is then
    /// closed to further registrations.
    ///
    /// Returns the new variant keys in registration order.
    pub fn expand_variants(&mut self) -> Result<Vec<RegistrationKey>> {
        if self.expanded {
            return Err(Error::AlreadyExpanded);
        }

        let graph = self.catalog_graph()?;
        graph.check_acyclic()?;

        let mut variant_keys: BTreeMap<RegistrationKey, Vec<RegistrationKey>> = BTreeMap::new();
        let mut staged: Vec<(RegistrationKey, ConfigurationInfo)> = Vec::new();
        let mut staged_keys: BTreeSet<RegistrationKey> = BTreeSet::new();
        for key in graph.topological_sort() {
            let Some(info) = self.entries.get(&key) else {
                continue;
            };
            let mut config = info.build(&key)?;
            let inherited = self.inherited_variants(&config, &variant_keys);
            for (name, extra) in &inherited {
                let param = config.get_mut(name)?;
                let mut variants = param.variants.take().unwrap_or_default();
                for value in extra {
                    if !variants.contains(value) {
                        variants.push(value.clone());
                    }
                }
                param.variants = Some(variants);
            }
            if !config.has_variants() {
                continue;
            }

            let mut expanded_keys = Vec::new();
            for overrides in config.variant_combinations() {
                let variant_key = key.from_variant(&overrides)?;
                if staged_keys.contains(&variant_key) {
                    return Err(Error::AlreadyRegistered { key: variant_key });
                }
                if let Some(existing) = self.entries.get(&variant_key) {
                    let same_combination = existing.variant_of.as_ref() == Some(&key)
                        && existing.variant_overrides == overrides;
                    if !same_combination {
                        return Err(Error::AlreadyRegistered { key: variant_key });
                    }
                    debug!("Variant {variant_key} already registered, skipping");
                    expanded_keys.push(variant_key);
                    continue;
                }
                staged_keys.insert(variant_key.clone());
                staged.push((variant_key.clone(), info.variant(&key, overrides)));
                expanded_keys.push(variant_key);
            }
            variant_keys.insert(key, expanded_keys);
        }

        let new_keys: Vec<RegistrationKey> = staged.iter().map(|(key, _)| key.clone()).collect();
        for (key, info) in staged {
            self.entries.insert(key, info);
        }
        self.expanded = true;
        info!(
            "Expanded {} template(s) into {} variant(s)",
            variant_keys.len(),
            new_keys.len()
        );
        Ok(new_keys)
    }

    /// Dependency parameters whose targets expanded into variants, with the
    /// variant keys they inherit.
    fn inherited_variants(
        &self,
        config: &Configuration,
        variant_keys: &BTreeMap<RegistrationKey, Vec<RegistrationKey>>,
    ) -> Vec<(String, Vec<Value>)> {
        let mut inherited = Vec::new();
        for param in config.dependencies() {
            let extra: Vec<Value> = param
                .value
                .keys()
                .into_iter()
                .filter_map(|dep| self.resolve_key(dep).ok())
                .filter_map(|dep| variant_keys.get(&dep))
                .flatten()
                .cloned()
                .map(Value::Key)
                .collect();
            if !extra.is_empty() {
                inherited.push((param.name.clone(), extra));
            }
        }
        inherited
    }

    // Lookup

    /// Find the registered key a query designates.
    ///
    /// An exact hit wins. Otherwise the query matches partially (subset of
    /// tags, wildcard namespace or name) and must match a single entry.
    ///
    /// # Errors
    ///
    /// `Error::NotRegistered` when nothing matches, `Error::AmbiguousKey`
    /// when several entries do.
    pub fn resolve_key(&self, query: &RegistrationKey) -> Result<RegistrationKey> {
        if self.entries.contains_key(query) {
            return Ok(query.clone());
        }
        let mut candidates: Vec<RegistrationKey> = self
            .entries
            .keys()
            .filter(|candidate| query.matches(candidate, false))
            .cloned()
            .collect();
        match candidates.len() {
            0 => Err(Error::NotRegistered { key: query.clone() }),
            1 => Ok(candidates.remove(0)),
            _ => Err(Error::AmbiguousKey {
                key: query.clone(),
                candidates,
            }),
        }
    }

    fn entry(&self, key: &RegistrationKey) -> Result<&ConfigurationInfo> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::NotRegistered { key: key.clone() })
    }

    pub fn retrieve_configuration_info(
        &self,
        key: &RegistrationKey,
        exact: bool,
    ) -> Result<&ConfigurationInfo> {
        if exact {
            self.entry(key)
        } else {
            let resolved = self.resolve_key(key)?;
            self.entry(&resolved)
        }
    }

    /// The unresolved default configuration of a key: dependency parameters
    /// still hold keys.
    pub fn retrieve_configuration(
        &self,
        key: &RegistrationKey,
        exact: bool,
    ) -> Result<Configuration> {
        let resolved = if exact {
            key.clone()
        } else {
            self.resolve_key(key)?
        };
        self.entry(&resolved)?.build(&resolved)
    }

    /// Registered keys matching a query, sorted.
    pub fn retrieve_keys(&self, query: &KeyQuery) -> Vec<RegistrationKey> {
        self.entries
            .keys()
            .filter(|key| query.matches(key))
            .cloned()
            .collect()
    }

    // Namespaces

    pub fn is_namespace_covered(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Directory providing a covered namespace, if it was discovered.
    pub fn namespace_directory(&self, namespace: &str) -> Option<&Path> {
        self.namespaces.get(namespace).and_then(|d| d.as_deref())
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Merge discovered namespaces, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateNamespace` when a namespace is already
    /// provided by another directory.
    pub fn update_namespaces<I>(&mut self, namespaces: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        let mut merged = self.namespaces.clone();
        for (namespace, directory) in namespaces {
            match merged.get(&namespace) {
                Some(Some(existing)) if *existing != directory => {
                    return Err(Error::DuplicateNamespace {
                        namespace,
                        existing: existing.clone(),
                    });
                }
                _ => {
                    merged.insert(namespace, Some(directory));
                }
            }
        }
        self.namespaces = merged;
        Ok(())
    }

    /// Resolve external directories (local paths or git URLs) and merge the
    /// namespaces they provide.
    pub fn resolve_external_directories(
        &mut self,
        directories: &[String],
        save_directory: &Path,
        scanner: &dyn NamespaceScanner,
    ) -> Result<Vec<PathBuf>> {
        let resolved = discovery::resolve_external_directories(directories, save_directory)?;
        for directory in &resolved {
            let found = scanner.scan(directory)?;
            self.update_namespaces(found.into_iter().map(|d| (d.namespace, d.directory)))?;
        }
        Ok(resolved)
    }

    // Graph

    /// Graph over the whole catalog, including edges to variant keys.
    fn catalog_graph(&self) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for (key, info) in &self.entries {
            graph.add_node(key);
            let config = info.build(key)?;
            for dependency in referenced_keys(&config) {
                if let Ok(resolved) = self.resolve_key(&dependency) {
                    graph.add_edge(key, &resolved);
                }
            }
        }
        Ok(graph)
    }

    /// Subgraph reachable from `root` through dependency parameters.
    ///
    /// # Errors
    ///
    /// Fails when `root` or any reachable dependency is not registered.
    pub fn dependency_graph(&self, root: &RegistrationKey) -> Result<DependencyGraph> {
        let root = self.resolve_key(root)?;
        self.collect_graph(&root, None)
    }

    fn collect_graph(
        &self,
        root: &RegistrationKey,
        overrides: Option<&Overrides>,
    ) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        graph.add_node(root);
        let mut queue = VecDeque::from([root.clone()]);
        let mut seen = BTreeSet::from([root.clone()]);
        while let Some(current) = queue.pop_front() {
            let root_overrides = if current == *root { overrides } else { None };
            let config = self.construct(&current, root_overrides)?;
            for dependency in config.dependency_keys() {
                let resolved = self.resolve_key(&dependency)?;
                graph.add_edge(&current, &resolved);
                if seen.insert(resolved.clone()) {
                    queue.push_back(resolved);
                }
            }
        }
        Ok(graph)
    }

    /// Check the subgraph of `root` before anything is built.
    ///
    /// The subgraph only holds nodes reached from `root`, so it is connected
    /// by construction and in practice only `Error::NotADag` is reported.
    /// The connectivity check stays as a guard on the collected graph.
    ///
    /// # Errors
    ///
    /// `Error::NotADag` with the cycle edges, or `Error::DisconnectedGraph`.
    pub fn check_registration_graph(&self, root: &RegistrationKey) -> Result<DependencyGraph> {
        let root = self.resolve_key(root)?;
        self.checked_graph(&root, None)
    }

    fn checked_graph(
        &self,
        root: &RegistrationKey,
        overrides: Option<&Overrides>,
    ) -> Result<DependencyGraph> {
        let graph = self.collect_graph(root, overrides)?;
        graph.check_acyclic()?;
        graph.check_connected(root)?;
        Ok(graph)
    }

    // Resolution

    pub fn dag_resolution(&self, root: &RegistrationKey) -> Result<ResolutionInfo> {
        self.resolve(root, None)
    }

    /// Resolve `root` with overrides applied to its own parameters.
    pub fn dag_resolution_with(
        &self,
        root: &RegistrationKey,
        overrides: &Overrides,
    ) -> Result<ResolutionInfo> {
        self.resolve(root, Some(overrides))
    }

    fn resolve(
        &self,
        root: &RegistrationKey,
        overrides: Option<&Overrides>,
    ) -> Result<ResolutionInfo> {
        let root = self.resolve_key(root)?;
        let graph = self.checked_graph(&root, overrides)?;
        debug!(
            "Resolving {root}: {} node(s), {} edge(s)",
            graph.node_count(),
            graph.edge_count()
        );
        let mut resolution = ResolutionInfo::new(root.clone());
        self.resolve_node(&root, overrides, &mut resolution)?;
        Ok(resolution)
    }

    fn construct(
        &self,
        key: &RegistrationKey,
        overrides: Option<&Overrides>,
    ) -> Result<Configuration> {
        let config = self.entry(key)?.build(key)?;
        match overrides {
            Some(overrides) if !overrides.is_empty() => config.delta_copy(overrides),
            _ => Ok(config),
        }
    }

    fn resolve_node(
        &self,
        key: &RegistrationKey,
        overrides: Option<&Overrides>,
        resolution: &mut ResolutionInfo,
    ) -> Result<()> {
        if resolution.contains(key) {
            return Ok(());
        }
        let mut config = self.construct(key, overrides)?;
        config.pre_validate()?;

        let names: Vec<String> = config.dependencies().iter().map(|p| p.name.clone()).collect();
        let mut dependencies = IndexMap::new();
        for name in names {
            let value = config.get(&name)?.value.clone();
            let canonical = self.canonicalize(&value)?;
            let built = self.substitute(&canonical, resolution)?;
            config.set(&name, built)?;
            dependencies.insert(name, canonical);
        }
        config.validate()?;

        debug!("Built configuration {key}");
        resolution.add(ResolvedNode {
            key: key.clone(),
            configuration: config,
            dependencies,
            component: None,
        });
        Ok(())
    }

    /// Replace every key in `value` by the registered key it resolves to.
    fn canonicalize(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Key(key) => Ok(Value::Key(self.resolve_key(key)?)),
            Value::List(items) => items
                .iter()
                .map(|item| self.canonicalize(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Ok(other.clone()),
        }
    }

    /// Resolve every key in a canonical value and substitute its built
    /// configuration.
    fn substitute(&self, value: &Value, resolution: &mut ResolutionInfo) -> Result<Value> {
        match value {
            Value::Key(key) => {
                self.resolve_node(key, None, resolution)?;
                let config = resolution
                    .configuration(key)
                    .ok_or_else(|| Error::NotRegistered { key: key.clone() })?;
                Ok(Value::Config(Box::new(config.clone())))
            }
            Value::List(items) => {
                let mut built = Vec::with_capacity(items.len());
                for item in items {
                    built.push(self.substitute(item, resolution)?);
                }
                Ok(Value::List(built))
            }
            other => Ok(other.clone()),
        }
    }

    // Build

    /// The resolved, validated configuration of `key`.
    pub fn build_configuration(&self, key: &RegistrationKey) -> Result<Configuration> {
        let resolution = self.dag_resolution(key)?;
        let root = resolution.root().clone();
        resolution
            .into_root_configuration()
            .ok_or(Error::NotRegistered { key: root })
    }

    pub fn build_component(&self, key: &RegistrationKey) -> Result<ComponentHandle> {
        self.instantiate(key, None)
    }

    /// Build the component of `key` with overrides applied to the root
    /// configuration.
    pub fn build_component_with(
        &self,
        key: &RegistrationKey,
        overrides: &Overrides,
    ) -> Result<ComponentHandle> {
        self.instantiate(key, Some(overrides))
    }

    /// Build the component of `key` and run it.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotRunnable` if the component does not implement
    /// [`crate::RunnableComponent`].
    pub fn run_component(&self, key: &RegistrationKey, overrides: &Overrides) -> Result<()> {
        let handle = self.build_component_with(key, overrides)?;
        let runnable = handle.as_runnable().ok_or_else(|| Error::NotRunnable { key: key.clone() })?;
        runnable.run()
    }

    fn instantiate(
        &self,
        key: &RegistrationKey,
        overrides: Option<&Overrides>,
    ) -> Result<ComponentHandle> {
        let root = self.resolve_key(key)?;
        if !self.entry(&root)?.is_bound() {
            return Err(Error::NotBound { key: root });
        }
        let mut resolution = self.resolve(&root, overrides)?;
        self.instantiate_node(&root, &mut resolution)
    }

    fn instantiate_node(
        &self,
        key: &RegistrationKey,
        resolution: &mut ResolutionInfo,
    ) -> Result<ComponentHandle> {
        if let Some(handle) = resolution.component(key) {
            return Ok(handle.clone());
        }
        let info = self.entry(key)?;
        let factory = info
            .component
            .clone()
            .ok_or_else(|| Error::NotBound { key: key.clone() })?;
        let node = resolution
            .get(key)
            .ok_or_else(|| Error::NotRegistered { key: key.clone() })?;
        let mut config = node.configuration.clone();
        let dependencies = node.dependencies.clone();

        if info.build_recursively {
            for (name, value) in &dependencies {
                let built = self.instantiate_value(value, resolution)?;
                config.set(name, built)?;
            }
        }

        let handle = ComponentHandle::new(factory(&config)?);
        debug!("Built component {key}");
        resolution.set_component(key, handle.clone());
        Ok(handle)
    }

    /// Bound dependencies become components; unbound ones keep their built
    /// configuration.
    fn instantiate_value(&self, value: &Value, resolution: &mut ResolutionInfo) -> Result<Value> {
        match value {
            Value::Key(key) => {
                if self.entry(key)?.is_bound() {
                    return Ok(Value::Component(self.instantiate_node(key, resolution)?));
                }
                resolution
                    .configuration(key)
                    .map(|config| Value::Config(Box::new(config.clone())))
                    .ok_or_else(|| Error::NotRegistered { key: key.clone() })
            }
            Value::List(items) => {
                let mut built = Vec::with_capacity(items.len());
                for item in items {
                    built.push(self.instantiate_value(item, resolution)?);
                }
                Ok(Value::List(built))
            }
            other => Ok(other.clone()),
        }
    }

    // Setup

    /// Populate the registry for a project directory.
    ///
    /// Initializes the registry, merges the namespaces found by `scanner`
    /// and external directories, applies the manifest, expands variants and
    /// finally builds every key to sort it into valid or invalid.
    pub fn setup(
        &mut self,
        directory: &Path,
        manifest: &RegistrationManifest,
        options: &SetupOptions,
        scanner: &dyn NamespaceScanner,
    ) -> Result<SetupReport> {
        self.initialize();

        let discovered = scanner.scan(directory)?;
        for namespace in &discovered {
            debug!(
                "Namespace {} at {} ({} call site(s))",
                namespace.namespace,
                namespace.directory.display(),
                namespace.call_sites.len()
            );
        }
        self.update_namespaces(discovered.into_iter().map(|d| (d.namespace, d.directory)))?;

        if !options.external_directories.is_empty() {
            let save_directory = options.save_directory_for(directory);
            self.resolve_external_directories(
                &options.external_directories,
                &save_directory,
                scanner,
            )?;
        }

        self.apply_manifest(manifest)?;
        self.expand_variants()?;

        let mut report = SetupReport::default();
        let keys: Vec<RegistrationKey> = self.keys().cloned().collect();
        for key in keys {
            match self.build_configuration(&key) {
                Ok(_) => report.valid_keys.push(key),
                Err(e) => report.invalid_keys.push((key, e.to_string())),
            }
        }
        info!(
            "Setup complete: {} valid, {} invalid",
            report.valid_keys.len(),
            report.invalid_keys.len()
        );
        Ok(report)
    }
}

/// Keys a configuration points at through current values or declared
/// variants of its parameters.
fn referenced_keys(config: &Configuration) -> Vec<RegistrationKey> {
    let mut keys: Vec<RegistrationKey> = Vec::new();
    for param in config.params() {
        let variants = param.variants.iter().flatten();
        for value in std::iter::once(&param.value).chain(variants) {
            for key in value.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
    }
    keys
}
