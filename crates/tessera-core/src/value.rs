//! Parameter values and type hints.

use std::fmt;

use crate::component::ComponentHandle;
use crate::configuration::Configuration;
use crate::key::{ATTRIBUTE_SEPARATOR, KEY_VALUE_SEPARATOR, RegistrationKey};

/// Semantic type accepted by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    /// Marks the parameter as a dependency on another registration.
    Key,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Any => "any",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Str => "str",
            ParamType::List => "list",
            ParamType::Key => "key",
        };
        f.write_str(name)
    }
}

/// Content of a parameter slot.
///
/// `Key` is an unresolved dependency edge. Resolution replaces it with the
/// built `Config` of the dependency, and instantiation with a live
/// `Component`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Key(RegistrationKey),
    Config(Box<Configuration>),
    Component(ComponentHandle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&RegistrationKey> {
        match self {
            Value::Key(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_config(&self) -> Option<&Configuration> {
        match self {
            Value::Config(config) => Some(config),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentHandle> {
        match self {
            Value::Component(handle) => Some(handle),
            _ => None,
        }
    }

    /// Every registration key held by this value, including inside lists.
    pub fn keys(&self) -> Vec<&RegistrationKey> {
        match self {
            Value::Key(key) => vec![key],
            Value::List(items) => items.iter().flat_map(Value::keys).collect(),
            _ => Vec::new(),
        }
    }

    /// Every resolved configuration held by this value, including inside lists.
    pub fn configs(&self) -> Vec<&Configuration> {
        match self {
            Value::Config(config) => vec![config.as_ref()],
            Value::List(items) => items.iter().flat_map(Value::configs).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether this value is (or contains) a dependency in any resolution state.
    pub fn is_dependency_value(&self) -> bool {
        match self {
            Value::Key(_) | Value::Config(_) | Value::Component(_) => true,
            Value::List(items) => !items.is_empty() && items.iter().all(Value::is_dependency_value),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Key(_) => "key",
            Value::Config(_) => "configuration",
            Value::Component(_) => "component",
        }
    }

    /// Whether this value satisfies a type hint. `Null` satisfies every hint;
    /// required-ness is checked separately.
    pub fn matches_type(&self, hint: ParamType) -> bool {
        match (hint, self) {
            (_, Value::Null) | (ParamType::Any, _) => true,
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::Int, Value::Int(_)) => true,
            (ParamType::Float, Value::Float(_) | Value::Int(_)) => true,
            (ParamType::Str, Value::Str(_)) => true,
            (ParamType::List, Value::List(_)) => true,
            (ParamType::Key, v) => v.is_dependency_value(),
            _ => false,
        }
    }

    /// Interpret command-line text as a value.
    ///
    /// JSON literals parse as JSON. Text with at least two key attributes
    /// (`name:..--namespace:..`) that parses as a registration key becomes a
    /// key. Anything else, including `name:Bob`, is kept as a string.
    pub fn parse_literal(text: &str) -> Value {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
            return Value::from_json(&json);
        }
        if text.contains(KEY_VALUE_SEPARATOR) && text.contains(ATTRIBUTE_SEPARATOR) {
            if let Ok(key) = RegistrationKey::parse(text) {
                return Value::Key(key);
            }
        }
        Value::Str(text.to_string())
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => match RegistrationKey::from_json(json) {
                Ok(key) => Value::Key(key),
                Err(_) => Value::Str(json.to_string()),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Key(key) => key.to_json(),
            Value::Config(config) => config.to_json(),
            Value::Component(handle) => serde_json::Value::String(format!("{handle:?}")),
        }
    }

    /// Short label used in variant tags.
    pub(crate) fn variant_label(&self) -> String {
        match self {
            Value::Key(key) => {
                let mut label = key.name().to_string();
                for tag in key.tags() {
                    label.push('.');
                    label.push_str(tag);
                }
                label
            }
            Value::List(items) => items
                .iter()
                .map(Value::variant_label)
                .collect::<Vec<_>>()
                .join("+"),
            Value::Config(config) => config.source().to_string(),
            // Keep a decimal point so 1.0 and 1 label differently.
            Value::Float(x) => format!("{x:?}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Key(key) => write!(f, "{key}"),
            Value::Config(config) => write!(f, "{}", config.to_json()),
            Value::Component(handle) => write!(f, "{handle:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<RegistrationKey> for Value {
    fn from(key: RegistrationKey) -> Self {
        Value::Key(key)
    }
}

impl From<Configuration> for Value {
    fn from(config: Configuration) -> Self {
        Value::Config(Box::new(config))
    }
}

impl From<ComponentHandle> for Value {
    fn from(handle: ComponentHandle) -> Self {
        Value::Component(handle)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        assert_eq!(Value::parse_literal("3"), Value::Int(3));
        assert_eq!(Value::parse_literal("2.5"), Value::Float(2.5));
        assert_eq!(Value::parse_literal("true"), Value::Bool(true));
        assert_eq!(Value::parse_literal("null"), Value::Null);
        assert_eq!(
            Value::parse_literal("[1, 2]"),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::parse_literal("hello"), Value::from("hello"));
        assert!(matches!(
            Value::parse_literal("name:test--namespace:testing"),
            Value::Key(_)
        ));
    }

    #[test]
    fn test_parse_literal_single_attribute_stays_text() {
        assert_eq!(Value::parse_literal("name:Bob"), Value::from("name:Bob"));
        assert_eq!(Value::parse_literal("ratio:2"), Value::from("ratio:2"));
    }

    #[test]
    fn test_matches_type() {
        assert!(Value::Int(1).matches_type(ParamType::Float));
        assert!(!Value::Float(1.0).matches_type(ParamType::Int));
        assert!(Value::Null.matches_type(ParamType::Str));
        assert!(!Value::from("x").matches_type(ParamType::Bool));
        let key = RegistrationKey::new("testing", "test", Vec::<String>::new()).unwrap();
        assert!(Value::from(vec![key.clone(), key]).matches_type(ParamType::Key));
    }

    #[test]
    fn test_keys_flatten_lists() {
        let a = RegistrationKey::new("testing", "a", Vec::<String>::new()).unwrap();
        let b = RegistrationKey::new("testing", "b", Vec::<String>::new()).unwrap();
        let value = Value::from(vec![a.clone(), b.clone()]);
        assert_eq!(value.keys(), vec![&a, &b]);
        assert!(value.is_dependency_value());
        assert!(!Value::List(Vec::new()).is_dependency_value());
    }

    #[test]
    fn test_to_json() {
        assert_eq!(
            Value::from(vec![1, 2]).to_json(),
            serde_json::json!([1, 2])
        );
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
    }
}
