//! Parameter slots of a configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::key::RegistrationKey;
use crate::value::{ParamType, Value};

/// Predicate restricting the values a parameter may hold.
pub type RangePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A single named parameter of a [`crate::Configuration`].
#[derive(Clone)]
pub struct Param {
    pub name: String,
    pub value: Value,
    pub type_hints: Vec<ParamType>,
    pub description: Option<String>,
    pub is_required: bool,
    pub allowed_range: Option<RangePredicate>,
    /// Alternative values. `Some(vec![])` is a declared but empty list and
    /// fails validation.
    pub variants: Option<Vec<Value>>,
    pub tags: BTreeSet<String>,
}

impl Param {
    /// Whether this parameter is an edge to another registration.
    ///
    /// True when a type hint is [`ParamType::Key`] or the current value is a
    /// key, a resolved configuration or a component (or a list of them).
    pub fn is_dependency(&self) -> bool {
        self.type_hints.contains(&ParamType::Key) || self.value.is_dependency_value()
    }

    pub fn has_variants(&self) -> bool {
        self.variants.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Whether the current value is in the allowed range. Unset values and
    /// unrestricted parameters always are.
    pub fn in_range(&self) -> bool {
        match &self.allowed_range {
            Some(range) if !self.value.is_null() => range(&self.value),
            _ => true,
        }
    }

    /// Whether the current value satisfies at least one type hint.
    pub fn type_checks(&self) -> bool {
        self.type_hints.is_empty()
            || self.type_hints.iter().any(|hint| self.value.matches_type(*hint))
    }

    /// Multi-line description of every field.
    pub fn long_repr(&self) -> String {
        let hints: Vec<String> = self.type_hints.iter().map(ToString::to_string).collect();
        let variants = self
            .variants
            .as_ref()
            .map(|v| Value::List(v.clone()).to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "name: {}\nvalue: {}\ntype_hints: [{}]\ndescription: {}\ntags: {:?}\nis_required: {}\nvariants: {}",
            self.name,
            self.value,
            hints.join(", "),
            self.description.as_deref().unwrap_or("-"),
            self.tags,
            self.is_required,
            variants,
        )
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("type_hints", &self.type_hints)
            .field("is_required", &self.is_required)
            .field("has_allowed_range", &self.allowed_range.is_some())
            .field("variants", &self.variants)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Two parameters are equal iff they share name and value.
impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// Builder for [`Param`], consumed by [`crate::Configuration::add`].
///
/// ```
/// use tessera_core::{ParamSpec, ParamType};
///
/// let spec = ParamSpec::new("epochs")
///     .value(10)
///     .type_hint(ParamType::Int)
///     .allowed_range(|v| v.as_int().is_some_and(|n| n > 0))
///     .required();
/// ```
#[derive(Clone)]
pub struct ParamSpec {
    param: Param,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            param: Param {
                name: name.into(),
                value: Value::Null,
                type_hints: Vec::new(),
                description: None,
                is_required: false,
                allowed_range: None,
                variants: None,
                tags: BTreeSet::new(),
            },
        }
    }

    /// A required dependency on `key`.
    pub fn dependency(name: impl Into<String>, key: RegistrationKey) -> Self {
        Self::new(name).value(key).type_hint(ParamType::Key).required()
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.param.value = value.into();
        self
    }

    pub fn type_hint(mut self, hint: ParamType) -> Self {
        if !self.param.type_hints.contains(&hint) {
            self.param.type_hints.push(hint);
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.param.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.param.is_required = true;
        self
    }

    pub fn is_required(mut self, required: bool) -> Self {
        self.param.is_required = required;
        self
    }

    pub fn allowed_range<F>(mut self, range: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.param.allowed_range = Some(Arc::new(range));
        self
    }

    pub fn variants<I, V>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.param.variants = Some(variants.into_iter().map(Into::into).collect());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.param.tags.insert(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.param.name
    }

    pub fn build(self) -> Param {
        self.param
    }
}
