//! List command implementation

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use tessera_core::{KeyQuery, RegistrationKey, SetupOptions};

use super::prepare_registry;
use crate::error::Result;

/// Build the query for the list filters.
pub fn key_query(namespace: Option<&str>, name: Option<&str>, tags: &[String]) -> KeyQuery {
    let mut query = KeyQuery::new();
    if let Some(namespace) = namespace {
        query = query.namespace(namespace);
    }
    if let Some(name) = name {
        query = query.name(name);
    }
    for tag in tags {
        query = query.tag(tag.as_str());
    }
    query
}

/// Run the list command
pub fn run_list(
    dir: &Path,
    namespace: Option<&str>,
    name: Option<&str>,
    tags: &[String],
    json: bool,
) -> Result<()> {
    let options = SetupOptions::load(dir)?;
    let (registry, report) = prepare_registry(dir, &options)?;
    let keys = registry.retrieve_keys(&key_query(namespace, name, tags));

    if json {
        let listing: Vec<serde_json::Value> = keys.iter().map(RegistrationKey::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if keys.is_empty() {
        println!("{}", "No matching keys".dimmed());
        return Ok(());
    }

    let mut grouped: BTreeMap<&str, Vec<&RegistrationKey>> = BTreeMap::new();
    for key in &keys {
        grouped.entry(key.namespace()).or_default().push(key);
    }

    let invalid: Vec<&RegistrationKey> = report.invalid_keys.iter().map(|(key, _)| key).collect();
    for (namespace, members) in grouped {
        println!("{}:", namespace.bold());
        for key in members {
            let marker = if invalid.contains(&key) {
                "!".yellow()
            } else {
                "+".green()
            };
            println!("  {} {}", marker, key.to_pretty_string().cyan());
        }
        println!();
    }
    println!("{} key(s), {} invalid", keys.len(), invalid_listed(&keys, &invalid));
    Ok(())
}

fn invalid_listed(keys: &[RegistrationKey], invalid: &[&RegistrationKey]) -> usize {
    keys.iter().filter(|key| invalid.contains(key)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_query_filters() {
        let query = key_query(Some("demo"), None, &["style=shout".to_string()]);
        let shout: RegistrationKey = "name:formatter--tags:[style=shout]--namespace:demo"
            .parse()
            .unwrap();
        let plain: RegistrationKey = "name:formatter--tags:[style=plain]--namespace:demo"
            .parse()
            .unwrap();
        assert!(query.matches(&shout));
        assert!(!query.matches(&plain));
        assert!(key_query(None, None, &[]).matches(&plain));
    }
}
