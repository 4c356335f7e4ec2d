//! Registration keys.
//!
//! A [`RegistrationKey`] names every registered configuration with a
//! `namespace`, a `name` and an unordered set of tags. Keys render to and
//! parse from a compact string form:
//!
//! ```text
//! name:encoder--tags:[large, lang=en]--namespace:nlp/models
//! ```
//!
//! Attributes may appear in any order, the tags attribute is omitted when the
//! set is empty, and a missing namespace defaults to [`DEFAULT_NAMESPACE`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Separates an attribute name from its value (`name:encoder`).
pub const KEY_VALUE_SEPARATOR: char = ':';
/// Separates attributes (`name:a--namespace:b`).
pub const ATTRIBUTE_SEPARATOR: &str = "--";
/// Joins namespace path segments and compound tag segments.
pub const HIERARCHY_SEPARATOR: char = '/';
/// Joins attribute-style tags (`lang=en`).
pub const TAG_VALUE_SEPARATOR: char = '=';
/// Namespace assigned when a key string omits it.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Matches any namespace or name in a partial lookup.
pub const WILDCARD: &str = "*";
/// Tags per line in [`RegistrationKey::to_pretty_string`].
pub const MAX_TAGS_PER_LINE: usize = 4;

const RESERVED: &[&str] = &[ATTRIBUTE_SEPARATOR, ",", "[", "]"];
/// Quotes a tag list may wrap around a tag.
const QUOTES: [char; 2] = ['\'', '"'];

/// Unique identifier of a registered configuration.
///
/// Keys are immutable. Equality and hashing consider namespace, name and the
/// full tag set; tag order never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "KeyRecord", into = "KeyRecord")]
pub struct RegistrationKey {
    namespace: String,
    name: String,
    tags: BTreeSet<String>,
}

/// Plain record form of a key, as exported to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RegistrationKey {
    /// Build a key from its coordinates.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyParse` when the name or namespace is empty, a
    /// namespace path segment is empty, or any component contains a
    /// reserved separator.
    pub fn new<I, S>(namespace: impl Into<String>, name: impl Into<String>, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = Self {
            namespace: namespace.into(),
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        };
        key.check()?;
        Ok(key)
    }

    /// Parse a key from its string form.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let mut name: Option<&str> = None;
        let mut namespace: Option<&str> = None;
        let mut tags: Option<&str> = None;

        for attribute in trimmed.split(ATTRIBUTE_SEPARATOR) {
            let (field, value) = attribute.split_once(KEY_VALUE_SEPARATOR).ok_or_else(|| {
                Error::key_parse(
                    input,
                    format!("attribute '{attribute}' is missing '{KEY_VALUE_SEPARATOR}'"),
                )
            })?;
            let slot = match field.trim() {
                "name" => &mut name,
                "namespace" => &mut namespace,
                "tags" => &mut tags,
                other => {
                    return Err(Error::key_parse(
                        input,
                        format!("unknown attribute '{other}'"),
                    ));
                }
            };
            if slot.replace(value.trim()).is_some() {
                return Err(Error::key_parse(
                    input,
                    format!("duplicate attribute '{}'", field.trim()),
                ));
            }
        }

        let name = name.ok_or_else(|| Error::key_parse(input, "missing name attribute"))?;
        let tags = match tags {
            Some(raw) => parse_tags(input, raw)?,
            None => BTreeSet::new(),
        };

        let key = Self {
            namespace: namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
            name: name.to_string(),
            tags,
        };
        key.check().map_err(|e| match e {
            Error::KeyParse { reason, .. } => Error::key_parse(input, reason),
            other => other,
        })?;
        Ok(key)
    }

    /// Parse a key from its string form. Alias of [`RegistrationKey::parse`].
    pub fn from_string(input: &str) -> Result<Self> {
        Self::parse(input)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Namespace split into its hierarchy segments.
    pub fn namespace_path(&self) -> Vec<&str> {
        self.namespace.split(HIERARCHY_SEPARATOR).collect()
    }

    /// Whether namespace or name is the [`WILDCARD`].
    pub fn is_wildcard(&self) -> bool {
        self.namespace == WILDCARD || self.name == WILDCARD
    }

    /// Compound tags decomposed into their path segments.
    pub fn hierarchy_tags(&self) -> BTreeMap<&str, Vec<&str>> {
        self.tags
            .iter()
            .filter(|tag| tag.contains(HIERARCHY_SEPARATOR))
            .map(|tag| (tag.as_str(), tag.split(HIERARCHY_SEPARATOR).collect()))
            .collect()
    }

    /// Attribute-style `key=value` tags, split at the first separator.
    pub fn attribute_tags(&self) -> BTreeMap<&str, &str> {
        self.tags
            .iter()
            .filter_map(|tag| tag.split_once(TAG_VALUE_SEPARATOR))
            .collect()
    }

    /// Tags built from a reserved separator (hierarchy or attribute tags).
    pub fn compound_tags(&self) -> BTreeSet<&str> {
        self.tags
            .iter()
            .filter(|tag| tag.contains(HIERARCHY_SEPARATOR) || tag.contains(TAG_VALUE_SEPARATOR))
            .map(String::as_str)
            .collect()
    }

    /// Join hierarchy segments back into a compound tag.
    pub fn compound_tag<S: AsRef<str>>(segments: &[S]) -> String {
        segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&HIERARCHY_SEPARATOR.to_string())
    }

    /// A copy of this key with extra tags.
    pub fn with_tags<I, S>(&self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut key = self.clone();
        key.tags.extend(tags.into_iter().map(Into::into));
        key.check()?;
        Ok(key)
    }

    /// Derive the key of one variant combination.
    ///
    /// Every overridden parameter contributes a `param=value` tag (see
    /// [`sanitize_variant_tag`]).
    pub fn from_variant<'a, I>(&self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        self.with_tags(
            overrides
                .into_iter()
                .map(|(param, value)| sanitize_variant_tag(param, value)),
        )
    }

    /// Match `candidate` against this key.
    ///
    /// Exact mode requires full equality. Otherwise namespace and name must
    /// be equal or wildcarded and this key's tags must be a subset of the
    /// candidate's tags.
    pub fn matches(&self, candidate: &RegistrationKey, exact: bool) -> bool {
        if exact {
            return self == candidate;
        }
        (self.namespace == WILDCARD || self.namespace == candidate.namespace)
            && (self.name == WILDCARD || self.name == candidate.name)
            && self.tags.is_subset(&candidate.tags)
    }

    /// Multi-line rendering for display. Parses back to an equal key.
    pub fn to_pretty_string(&self) -> String {
        if self.tags.len() <= MAX_TAGS_PER_LINE {
            return self.to_string();
        }
        let lines: Vec<String> = self
            .tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .chunks(MAX_TAGS_PER_LINE)
            .map(|chunk| chunk.join(", "))
            .collect();
        format!(
            "name{sep}{}{ATTRIBUTE_SEPARATOR}tags{sep}[\n    {}\n]{ATTRIBUTE_SEPARATOR}namespace{sep}{}",
            self.name,
            lines.join(",\n    "),
            self.namespace,
            sep = KEY_VALUE_SEPARATOR,
        )
    }

    pub fn to_record(&self) -> KeyRecord {
        KeyRecord::from(self.clone())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "namespace": self.namespace,
            "tags": self.tags.iter().collect::<Vec<_>>(),
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let record: KeyRecord = serde_json::from_value(value.clone())
            .map_err(|e| Error::key_parse(value.to_string(), e.to_string()))?;
        Self::try_from(record)
    }

    fn check(&self) -> Result<()> {
        let rendered = self.to_string();
        if self.name.trim().is_empty() {
            return Err(Error::key_parse(rendered, "name is empty"));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::key_parse(rendered, "namespace is empty"));
        }
        if self
            .namespace
            .split(HIERARCHY_SEPARATOR)
            .any(|segment| segment.trim().is_empty())
        {
            return Err(Error::key_parse(rendered, "namespace has an empty path segment"));
        }
        for part in [&self.name, &self.namespace] {
            if part.trim() != part {
                return Err(Error::key_parse(rendered, format!("'{part}' is padded")));
            }
            if part.starts_with('-') || part.ends_with('-') {
                return Err(Error::key_parse(
                    rendered,
                    format!("'{part}' starts or ends with '-'"),
                ));
            }
            if let Some(reserved) = find_reserved(part) {
                return Err(Error::key_parse(
                    rendered,
                    format!("'{part}' contains reserved sequence '{reserved}'"),
                ));
            }
        }
        for tag in &self.tags {
            if tag.trim().is_empty() || tag.trim() != tag {
                return Err(Error::key_parse(
                    rendered,
                    format!("tag '{tag}' is empty or padded"),
                ));
            }
            if let Some(reserved) = find_reserved(tag) {
                return Err(Error::key_parse(
                    rendered,
                    format!("tag '{tag}' contains reserved sequence '{reserved}'"),
                ));
            }
            if tag.contains(QUOTES) {
                return Err(Error::key_parse(
                    rendered,
                    format!("tag '{tag}' contains a quote"),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name{KEY_VALUE_SEPARATOR}{}", self.name)?;
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            write!(
                f,
                "{ATTRIBUTE_SEPARATOR}tags{KEY_VALUE_SEPARATOR}[{}]",
                tags.join(", ")
            )?;
        }
        write!(
            f,
            "{ATTRIBUTE_SEPARATOR}namespace{KEY_VALUE_SEPARATOR}{}",
            self.namespace
        )
    }
}

impl FromStr for RegistrationKey {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<KeyRecord> for RegistrationKey {
    type Error = Error;

    fn try_from(record: KeyRecord) -> Result<Self> {
        Self::new(record.namespace, record.name, record.tags)
    }
}

impl From<RegistrationKey> for KeyRecord {
    fn from(key: RegistrationKey) -> Self {
        Self {
            name: key.name,
            namespace: key.namespace,
            tags: key.tags.into_iter().collect(),
        }
    }
}

/// Render one variant override as a key tag.
///
/// Reserved separators, quotes and whitespace in the rendered value are
/// replaced by `_`, so the resulting tag always survives a parse round-trip.
/// Distinct values may therefore share a tag; expansion rejects such
/// collisions.
pub fn sanitize_variant_tag(param: &str, value: &Value) -> String {
    let raw = format!("{param}{TAG_VALUE_SEPARATOR}{}", value.variant_label());
    let mut sanitized = raw.replace(ATTRIBUTE_SEPARATOR, "_");
    sanitized = sanitized
        .chars()
        .map(|c| match c {
            ',' | '[' | ']' | '\'' | '"' | KEY_VALUE_SEPARATOR => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    sanitized
}

/// Filter used by [`crate::Registry::retrieve_keys`].
///
/// Empty filters match everything. Tag filters match keys carrying every
/// requested tag; [`KeyQuery::untagged`] matches only keys without tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyQuery {
    pub namespaces: Vec<String>,
    pub names: Vec<String>,
    pub tags: BTreeSet<String>,
    pub untagged: bool,
}

impl KeyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn untagged(mut self) -> Self {
        self.untagged = true;
        self
    }

    pub fn matches(&self, key: &RegistrationKey) -> bool {
        let namespace_ok = self.namespaces.is_empty()
            || self
                .namespaces
                .iter()
                .any(|ns| ns == WILDCARD || ns == key.namespace());
        let name_ok = self.names.is_empty()
            || self
                .names
                .iter()
                .any(|name| name == WILDCARD || name == key.name());
        let tags_ok = if self.untagged {
            key.tags().is_empty()
        } else {
            self.tags.is_subset(key.tags())
        };
        namespace_ok && name_ok && tags_ok
    }
}

impl From<&RegistrationKey> for KeyQuery {
    fn from(key: &RegistrationKey) -> Self {
        Self {
            namespaces: vec![key.namespace().to_string()],
            names: vec![key.name().to_string()],
            tags: key.tags().clone(),
            untagged: false,
        }
    }
}

fn find_reserved(text: &str) -> Option<&'static str> {
    RESERVED.iter().copied().find(|reserved| text.contains(reserved))
}

/// Strip one pair of matching quotes. Anything else is left for
/// [`RegistrationKey::check`] to reject.
fn unquote(tag: &str) -> &str {
    for quote in QUOTES {
        if let Some(inner) = tag
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    tag
}

fn parse_tags(input: &str, raw: &str) -> Result<BTreeSet<String>> {
    let opens = raw.matches('[').count();
    let closes = raw.matches(']').count();
    if opens != 1 || closes != 1 || !raw.starts_with('[') || !raw.ends_with(']') {
        return Err(Error::key_parse(
            input,
            format!("unbalanced tag list '{raw}'"),
        ));
    }
    let inner = raw[1..raw.len() - 1].trim();
    if inner.is_empty() {
        return Ok(BTreeSet::new());
    }
    inner
        .split(',')
        .map(|tag| {
            let tag = unquote(tag.trim());
            if tag.is_empty() {
                Err(Error::key_parse(input, "empty tag in tag list"))
            } else {
                Ok(tag.to_string())
            }
        })
        .collect()
}
