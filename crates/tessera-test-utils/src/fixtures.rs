//! Sample configurations, components and registrations.
//!
//! Everything registers under [`NAMESPACE`] unless stated otherwise. The
//! shapes cover the cases the registry has to handle: plain leaves, range
//! failures, variants, dependencies with variants, cycles and dependencies
//! into other namespaces.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_core::{
    Component, Configuration, Error, ParamSpec, ParamType, Registration, RegistrationKey,
    Result, RunnableComponent, Value,
};

/// Namespace of every fixture registration.
pub const NAMESPACE: &str = "testing";
/// Namespace referenced by [`config_with_external_dependency`].
pub const EXTERNAL_NAMESPACE: &str = "external";

/// Key in [`NAMESPACE`].
///
/// # Panics
/// Panics if the name or a tag is not a valid key component.
pub fn testing_key(name: &str, tags: &[&str]) -> RegistrationKey {
    RegistrationKey::new(NAMESPACE, name, tags.iter().copied())
        .unwrap_or_else(|e| panic!("testing_key: invalid key '{name}': {e}"))
}

fn int_param(config: &mut Configuration, name: &str, value: i64) -> Result<()> {
    config.add(ParamSpec::new(name).value(value).type_hint(ParamType::Int))
}

// Configurations

/// `x = 5`, `y = 10`.
pub fn base_config() -> Result<Configuration> {
    let mut config = Configuration::named("BaseConfig");
    int_param(&mut config, "x", 5)?;
    int_param(&mut config, "y", 10)?;
    Ok(config)
}

/// `x = 5` but only 2 and 3 are allowed.
pub fn invalid_config() -> Result<Configuration> {
    let mut config = Configuration::named("InvalidConfig");
    config.add(
        ParamSpec::new("x")
            .value(5)
            .type_hint(ParamType::Int)
            .allowed_range(|v| matches!(v.as_int(), Some(2 | 3))),
    )?;
    Ok(config)
}

/// Boolean `y` with variants `false` and `true`.
pub fn child_config() -> Result<Configuration> {
    let mut config = Configuration::named("ChildConfig");
    config.add(
        ParamSpec::new("y")
            .value(false)
            .type_hint(ParamType::Bool)
            .variants([false, true]),
    )?;
    Ok(config)
}

/// Depends on `test` tagged `t2`.
pub fn config_with_child() -> Result<Configuration> {
    let mut config = Configuration::named("ConfigWithChild");
    config.add(ParamSpec::dependency("c1", testing_key("test", &["t2"])))?;
    Ok(config)
}

/// Integer `x` with variants 1, 2 and 3.
pub fn variant_config() -> Result<Configuration> {
    let mut config = Configuration::named("VariantConfig");
    config.add(
        ParamSpec::new("x")
            .value(1)
            .type_hint(ParamType::Int)
            .variants([1, 2, 3]),
    )?;
    Ok(config)
}

/// Variants 1, 2 and 3 of which only 1 and 2 pass the range check.
pub fn invalid_variant_config() -> Result<Configuration> {
    let mut config = Configuration::named("InvalidVariantConfig");
    config.add(
        ParamSpec::new("x")
            .value(5)
            .type_hint(ParamType::Int)
            .variants([1, 2, 3])
            .allowed_range(|v| matches!(v.as_int(), Some(1 | 2 | 5))),
    )?;
    Ok(config)
}

/// Variants of its own plus a dependency on `test` tagged `t2`.
pub fn variant_config_with_child() -> Result<Configuration> {
    let mut config = variant_config()?;
    config.add(ParamSpec::dependency("c1", testing_key("test", &["t2"])))?;
    Ok(config)
}

/// One half of a two-node cycle through `config` tagged `c2`.
pub fn clique_config_a() -> Result<Configuration> {
    let mut config = Configuration::named("CliqueConfigA");
    config.add(ParamSpec::dependency("child", testing_key("config", &["c2"])))?;
    Ok(config)
}

/// The other half, pointing back at `config` tagged `c1`.
pub fn clique_config_b() -> Result<Configuration> {
    let mut config = Configuration::named("CliqueConfigB");
    config.add(ParamSpec::dependency("child", testing_key("config", &["c1"])))?;
    Ok(config)
}

/// Depends on `test` in [`EXTERNAL_NAMESPACE`].
pub fn config_with_external_dependency() -> Result<Configuration> {
    let mut config = Configuration::named("ConfigWithExternalDependency");
    config.add(ParamSpec::dependency(
        "c1",
        RegistrationKey::new(EXTERNAL_NAMESPACE, "test", Vec::<String>::new())?,
    ))?;
    Ok(config)
}

// Components

fn int_value(config: &Configuration, name: &str) -> Result<i64> {
    config
        .value(name)
        .and_then(Value::as_int)
        .ok_or_else(|| Error::component(format!("parameter '{name}' is not an integer")))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseComponent {
    pub x: i64,
    pub y: i64,
}

impl BaseComponent {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            x: int_value(config, "x")?,
            y: int_value(config, "y")?,
        })
    }
}

impl Component for BaseComponent {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildComponent {
    pub y: bool,
}

impl ChildComponent {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let y = config
            .value("y")
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::component("parameter 'y' is not a boolean"))?;
        Ok(Self { y })
    }
}

impl Component for ChildComponent {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps whatever its `c1` dependency was built into.
#[derive(Debug)]
pub struct ParentComponent {
    pub c1: Value,
}

impl ParentComponent {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            c1: config.get("c1")?.value.clone(),
        })
    }
}

impl Component for ParentComponent {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Runnable component counting its runs.
#[derive(Debug, Default)]
pub struct CountingRunner {
    pub runs: CallCounter,
}

impl Component for CountingRunner {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_runnable(&self) -> Option<&dyn RunnableComponent> {
        Some(self)
    }
}

impl RunnableComponent for CountingRunner {
    fn run(&self) -> Result<()> {
        self.runs.hit();
        Ok(())
    }
}

// Counters

/// Shared call counter for constructors and factories.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// Wrap a constructor so every call is counted.
    pub fn counting<F>(
        &self,
        constructor: F,
    ) -> impl Fn() -> Result<Configuration> + Send + Sync + 'static
    where
        F: Fn() -> Result<Configuration> + Send + Sync + 'static,
    {
        let counter = self.clone();
        move || {
            counter.hit();
            constructor()
        }
    }
}

// Registrations

pub fn base_registration(name: &str, tags: &[&str]) -> Registration {
    Registration::new(NAMESPACE, name, base_config)
        .tags(tags.iter().copied())
        .config_type("BaseConfig")
        .component(BaseComponent::from_config)
}

pub fn child_registration(name: &str, tags: &[&str]) -> Registration {
    Registration::new(NAMESPACE, name, child_config)
        .tags(tags.iter().copied())
        .component(ChildComponent::from_config)
}

/// `name` depending on `test` tagged `t2`, bound to [`ParentComponent`].
pub fn parent_registration(name: &str, tags: &[&str]) -> Registration {
    Registration::new(NAMESPACE, name, config_with_child)
        .tags(tags.iter().copied())
        .component(ParentComponent::from_config)
}

/// The two halves of a dependency cycle, keys `config` tagged `c1` and `c2`.
pub fn clique_registrations() -> [Registration; 2] {
    [
        Registration::new(NAMESPACE, "config", clique_config_a).tag("c1"),
        Registration::new(NAMESPACE, "config", clique_config_b).tag("c2"),
    ]
}
