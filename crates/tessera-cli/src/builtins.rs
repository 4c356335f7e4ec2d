//! Registrations compiled into the `tessera` binary.
//!
//! The `demo` namespace holds a formatter with two styles and a runnable
//! greeter depending on it, so `setup` and `run` have something to work on
//! in an otherwise empty directory.

use std::any::Any;

use tessera_core::{
    Component, Configuration, Error, ParamSpec, ParamType, Registration, RegistrationKey,
    RegistrationManifest, Result, RunnableComponent, Value,
};

pub const NAMESPACE: &str = "demo";

const STYLES: &[&str] = &["plain", "shout"];

/// Every builtin registration.
pub fn manifest() -> RegistrationManifest {
    let mut manifest = RegistrationManifest::new();
    manifest
        .register(
            Registration::new(NAMESPACE, "formatter", formatter_config)
                .config_type("Formatter")
                .component(Formatter::from_config),
        )
        .register(
            Registration::new(NAMESPACE, "greeter", greeter_config)
                .config_type("Greeter")
                .component(Greeter::from_config),
        );
    manifest
}

fn formatter_config() -> Result<Configuration> {
    let mut config = Configuration::named("Formatter");
    config.add(
        ParamSpec::new("greeting")
            .value("Hello")
            .type_hint(ParamType::Str)
            .description("Word put in front of the name")
            .required(),
    )?;
    config.add(
        ParamSpec::new("style")
            .value(STYLES[0])
            .type_hint(ParamType::Str)
            .allowed_range(|v| v.as_str().is_some_and(|s| STYLES.contains(&s)))
            .variants(STYLES.iter().copied()),
    )?;
    Ok(config)
}

fn greeter_config() -> Result<Configuration> {
    let mut config = Configuration::named("Greeter");
    config.add(
        ParamSpec::new("name")
            .value("world")
            .type_hint(ParamType::Str)
            .description("Who to greet")
            .required(),
    )?;
    config.add(ParamSpec::dependency(
        "formatter",
        RegistrationKey::new(NAMESPACE, "formatter", Vec::<String>::new())?,
    ))?;
    Ok(config)
}

fn str_value(config: &Configuration, name: &str) -> Result<String> {
    config
        .value(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::component(format!("parameter '{name}' is not a string")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    greeting: String,
    shout: bool,
}

impl Formatter {
    fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            greeting: str_value(config, "greeting")?,
            shout: str_value(config, "style")? == "shout",
        })
    }

    pub fn format(&self, name: &str) -> String {
        let line = format!("{}, {}!", self.greeting, name);
        if self.shout { line.to_uppercase() } else { line }
    }
}

impl Component for Formatter {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct Greeter {
    name: String,
    formatter: Formatter,
}

impl Greeter {
    fn from_config(config: &Configuration) -> Result<Self> {
        let formatter = config
            .value("formatter")
            .and_then(Value::as_component)
            .and_then(|handle| handle.downcast_ref::<Formatter>())
            .cloned()
            .ok_or_else(|| Error::component("parameter 'formatter' is not a built formatter"))?;
        Ok(Self {
            name: str_value(config, "name")?,
            formatter,
        })
    }

    pub fn greeting(&self) -> String {
        self.formatter.format(&self.name)
    }
}

impl Component for Greeter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_runnable(&self) -> Option<&dyn RunnableComponent> {
        Some(self)
    }
}

impl RunnableComponent for Greeter {
    fn run(&self) -> Result<()> {
        println!("{}", self.greeting());
        Ok(())
    }
}
