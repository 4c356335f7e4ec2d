//! Configuration schemas: ordered parameters, conditions and variants.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::Overrides;
use crate::error::{Error, Result};
use crate::key::RegistrationKey;
use crate::param::{Param, ParamSpec};
use crate::value::Value;

/// Source name given to configurations built with [`Configuration::new`].
pub const DEFAULT_SOURCE: &str = "Configuration";

/// Predicate over a whole configuration.
pub type ConditionFn = Arc<dyn Fn(&Configuration) -> bool + Send + Sync>;

/// When a condition is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStage {
    /// Before dependencies are resolved.
    Pre,
    /// After dependencies are resolved to configurations.
    Post,
}

/// A named cross-parameter rule.
#[derive(Clone)]
pub struct Condition {
    pub name: String,
    pub description: Option<String>,
    pub stage: ConditionStage,
    predicate: ConditionFn,
}

impl Condition {
    pub fn evaluate(&self, config: &Configuration) -> bool {
        (self.predicate)(config)
    }

    fn failure_message(&self) -> String {
        match &self.description {
            Some(description) => format!("Condition '{}' failed: {description}", self.name),
            None => format!("Condition '{}' failed", self.name),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Outcome of a single validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub error_message: Option<String>,
    pub source: String,
}

impl ValidationResult {
    fn failure(source: &str, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            error_message: Some(message.into()),
            source: source.to_string(),
        }
    }
}

/// Every failed check of one validation pass.
///
/// A report with no results means the configuration is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            results: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn messages(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter_map(|r| r.error_message.as_deref())
            .collect()
    }

    /// `Ok(())` when every check passed, otherwise the whole report as
    /// [`Error::ValidationFailure`].
    pub fn into_result(self) -> Result<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(Error::ValidationFailure(self))
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.results
            .push(ValidationResult::failure(&self.source, message));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation of {} failed with {} error(s)",
            self.source,
            self.results.len()
        )?;
        for result in &self.results {
            write!(
                f,
                "\n  - [{}] {}",
                result.source,
                result.error_message.as_deref().unwrap_or("failed")
            )?;
        }
        Ok(())
    }
}

/// Ordered set of named parameters plus the conditions relating them.
///
/// Configurations have value semantics: [`Configuration::delta_copy`] and
/// [`Configuration::variants`] always produce independent copies.
#[derive(Clone)]
pub struct Configuration {
    source: String,
    params: IndexMap<String, Param>,
    conditions: Vec<Condition>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::named(DEFAULT_SOURCE)
    }

    /// An empty configuration whose validation results are attributed to
    /// `source`.
    pub fn named(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            params: IndexMap::new(),
            conditions: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declare a parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyExistingParameter` if the name is taken.
    pub fn add(&mut self, spec: ParamSpec) -> Result<()> {
        if self.params.contains_key(spec.name()) {
            return Err(Error::AlreadyExistingParameter {
                name: spec.name().to_string(),
            });
        }
        let param = spec.build();
        self.params.insert(param.name.clone(), param);
        Ok(())
    }

    /// Declare an optional, untyped parameter.
    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.add(ParamSpec::new(name).value(value))
    }

    /// Declare a condition evaluated at `stage`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyExistingCondition` if the name is taken.
    pub fn add_condition<F>(
        &mut self,
        name: impl Into<String>,
        predicate: F,
        description: Option<&str>,
        stage: ConditionStage,
    ) -> Result<()>
    where
        F: Fn(&Configuration) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.conditions.iter().any(|c| c.name == name) {
            return Err(Error::AlreadyExistingCondition { name });
        }
        self.conditions.push(Condition {
            name,
            description: description.map(str::to_string),
            stage,
            predicate: Arc::new(predicate),
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Error::NonExistingParameter` if no parameter has this name.
    pub fn get(&self, name: &str) -> Result<&Param> {
        self.params
            .get(name)
            .ok_or_else(|| Error::NonExistingParameter {
                name: name.to_string(),
            })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Param> {
        self.params
            .get_mut(name)
            .ok_or_else(|| Error::NonExistingParameter {
                name: name.to_string(),
            })
    }

    /// Current value of a parameter, if declared.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.params.get(name).map(|p| &p.value)
    }

    /// Replace the value of an existing parameter.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.get_mut(name)?.value = value.into();
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.params.values()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Parameters that are edges to other registrations.
    pub fn dependencies(&self) -> Vec<&Param> {
        self.params.values().filter(|p| p.is_dependency()).collect()
    }

    /// Every key currently held by a dependency parameter, deduplicated in
    /// declaration order.
    pub fn dependency_keys(&self) -> Vec<RegistrationKey> {
        let mut keys: Vec<RegistrationKey> = Vec::new();
        for param in self.dependencies() {
            for key in param.value.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    /// First parameter satisfying `predicate`.
    pub fn search_param<F>(&self, predicate: F) -> Option<&Param>
    where
        F: Fn(&Param) -> bool,
    {
        self.params.values().find(|p| predicate(p))
    }

    /// First parameter tagged with `tag`. With `exact`, the parameter must
    /// carry no other tag.
    pub fn search_param_by_tag(&self, tag: &str, exact: bool) -> Option<&Param> {
        self.search_param(|p| {
            if exact {
                p.tags.len() == 1 && p.tags.contains(tag)
            } else {
                p.tags.contains(tag)
            }
        })
    }

    pub fn search_condition<F>(&self, predicate: F) -> Option<&Condition>
    where
        F: Fn(&Condition) -> bool,
    {
        self.conditions.iter().find(|c| predicate(c))
    }

    /// Run every parameter check and every pre-condition without raising.
    pub fn check_pre(&self) -> ValidationReport {
        let mut report = ValidationReport::new(&self.source);
        for param in self.params.values() {
            if param.is_required && param.value.is_null() {
                report.fail(format!("Parameter '{}' is required but not set", param.name));
            }
            if !param.type_checks() {
                let hints: Vec<String> = param.type_hints.iter().map(ToString::to_string).collect();
                report.fail(format!(
                    "Parameter '{}' expected type [{}] but got {}",
                    param.name,
                    hints.join(", "),
                    param.value.type_name()
                ));
            }
            if !param.in_range() {
                report.fail(format!(
                    "Parameter '{}' value {} is outside the allowed range",
                    param.name, param.value
                ));
            }
            if param.variants.as_ref().is_some_and(Vec::is_empty) {
                report.fail(format!(
                    "Parameter '{}' declares an empty variant list",
                    param.name
                ));
            }
        }
        self.evaluate_conditions(ConditionStage::Pre, &mut report);
        report
    }

    /// Full validation without raising: parameter checks, pre-conditions,
    /// resolved child configurations and post-conditions.
    pub fn check(&self) -> ValidationReport {
        let mut report = self.check_pre();
        for param in self.params.values() {
            for child in param.value.configs() {
                for failure in child.check().results {
                    let message = failure.error_message.unwrap_or_default();
                    report.results.push(ValidationResult {
                        passed: false,
                        error_message: Some(format!("{}: {message}", param.name)),
                        source: failure.source,
                    });
                }
            }
        }
        self.evaluate_conditions(ConditionStage::Post, &mut report);
        report
    }

    /// # Errors
    ///
    /// Returns `Error::ValidationFailure` carrying every failed check.
    pub fn pre_validate(&self) -> Result<()> {
        self.check_pre().into_result()
    }

    /// # Errors
    ///
    /// Returns `Error::ValidationFailure` carrying every failed check.
    pub fn validate(&self) -> Result<()> {
        self.check().into_result()
    }

    fn evaluate_conditions(&self, stage: ConditionStage, report: &mut ValidationReport) {
        for condition in self.conditions.iter().filter(|c| c.stage == stage) {
            if !condition.evaluate(self) {
                report.fail(condition.failure_message());
            }
        }
    }

    /// Copy with some parameter values replaced.
    ///
    /// Override names are either direct parameter names or dotted paths into
    /// resolved child configurations (`encoder.hidden_size`).
    ///
    /// # Errors
    ///
    /// Returns `Error::NonExistingParameter` for a name that matches neither.
    pub fn delta_copy(&self, overrides: &Overrides) -> Result<Configuration> {
        let mut copy = self.clone();
        for (name, value) in overrides {
            copy.apply_override(name, value.clone())?;
        }
        Ok(copy)
    }

    fn apply_override(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(param) = self.params.get_mut(name) {
            param.value = value;
            return Ok(());
        }
        let missing = || Error::NonExistingParameter {
            name: name.to_string(),
        };
        let (head, rest) = name.split_once('.').ok_or_else(missing)?;
        match self.params.get_mut(head).map(|p| &mut p.value) {
            Some(Value::Config(child)) => child.apply_override(rest, value),
            _ => Err(missing()),
        }
    }

    pub fn has_variants(&self) -> bool {
        self.params.values().any(Param::has_variants)
    }

    /// Cartesian product of every declared variant list.
    ///
    /// Parameters are taken in declaration order with the first one varying
    /// slowest. Returns an empty list when nothing varies.
    pub fn variant_combinations(&self) -> Vec<Overrides> {
        let varying: Vec<(&String, &Vec<Value>)> = self
            .params
            .iter()
            .filter_map(|(name, p)| match &p.variants {
                Some(values) if !values.is_empty() => Some((name, values)),
                _ => None,
            })
            .collect();
        if varying.is_empty() {
            return Vec::new();
        }

        let total: usize = varying.iter().map(|(_, values)| values.len()).product();
        let mut combinations = Vec::with_capacity(total);
        let mut cursor = vec![0usize; varying.len()];
        loop {
            combinations.push(
                varying
                    .iter()
                    .zip(&cursor)
                    .map(|((name, values), &i)| ((*name).clone(), values[i].clone()))
                    .collect(),
            );

            let mut position = varying.len();
            loop {
                if position == 0 {
                    return combinations;
                }
                position -= 1;
                cursor[position] += 1;
                if cursor[position] < varying[position].1.len() {
                    break;
                }
                cursor[position] = 0;
            }
        }
    }

    /// The concrete configuration of one variant combination. Overridden
    /// parameters no longer declare variants.
    pub fn variant(&self, overrides: &Overrides) -> Result<Configuration> {
        let mut copy = self.delta_copy(overrides)?;
        for name in overrides.keys() {
            if let Some(param) = copy.params.get_mut(name) {
                param.variants = None;
            }
        }
        Ok(copy)
    }

    /// Every variant combination paired with its concrete configuration.
    pub fn variants(&self) -> Result<Vec<(Overrides, Configuration)>> {
        self.variant_combinations()
            .into_iter()
            .map(|overrides| {
                let config = self.variant(&overrides)?;
                Ok((overrides, config))
            })
            .collect()
    }

    /// Flatten into `name -> value`. Resolved children contribute their own
    /// values under `param.child` names; keys and components are kept as is.
    pub fn to_value_dict(&self) -> IndexMap<String, Value> {
        let mut values = IndexMap::new();
        for (name, param) in &self.params {
            match &param.value {
                Value::Config(child) => {
                    for (child_name, value) in child.to_value_dict() {
                        values.insert(format!("{name}.{child_name}"), value);
                    }
                }
                other => {
                    values.insert(name.clone(), other.clone());
                }
            }
        }
        values
    }

    /// Nested JSON object of parameter values.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.params
                .iter()
                .map(|(name, param)| (name.clone(), param.value.to_json()))
                .collect(),
        )
    }

    /// Deterministic dump of every flattened value. Also logged at `info`.
    pub fn show(&self) -> String {
        let mut lines = vec![format!("{} parameters:", self.source)];
        lines.extend(
            self.to_value_dict()
                .iter()
                .map(|(name, value)| format!("{name}: {value}")),
        );
        let rendered = lines.join("\n");
        info!("{rendered}");
        rendered
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|((a_name, a), (b_name, b))| a_name == b_name && a.value == b.value)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("source", &self.source)
            .field("params", &self.params.values().collect::<Vec<_>>())
            .field("conditions", &self.conditions)
            .finish()
    }
}
