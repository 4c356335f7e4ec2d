//! Interactive key selection
//!
//! Uses dialoguer to narrow the registered keys down by namespace, name and
//! tags before picking one.

use std::collections::BTreeSet;

use colored::Colorize;
use dialoguer::{MultiSelect, Select};
use tessera_core::{Registry, RegistrationKey};

use crate::error::{CliError, Result};

/// Prompt for a registered key.
pub fn select_key(registry: &Registry) -> Result<RegistrationKey> {
    let keys: Vec<RegistrationKey> = registry.keys().cloned().collect();
    if keys.is_empty() {
        return Err(CliError::user("No configurations are registered"));
    }
    println!();

    let namespaces = namespaces_of(&keys);
    let namespace = &namespaces[pick("Namespace", &namespaces)?];

    let names = names_in(&keys, namespace);
    let name = &names[pick("Configuration", &names)?];

    let tags = tags_in(&keys, namespace, name);
    let chosen: Vec<String> = if tags.is_empty() {
        Vec::new()
    } else {
        MultiSelect::new()
            .with_prompt("Tags (space to toggle, enter to confirm)")
            .items(&tags)
            .interact()?
            .into_iter()
            .map(|i| tags[i].clone())
            .collect()
    };

    let candidates = narrow(&keys, namespace, name, &chosen);
    let key = match candidates.len() {
        0 => return Err(CliError::user("No key carries every selected tag")),
        1 => candidates[0].clone(),
        _ => {
            let labels: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            candidates[pick("Key", &labels)?].clone()
        }
    };

    println!();
    println!("{} {}", "Selected".green().bold(), key.to_string().cyan());
    Ok(key)
}

fn pick(prompt: &str, items: &[String]) -> Result<usize> {
    if items.len() == 1 {
        return Ok(0);
    }
    Ok(Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?)
}

fn namespaces_of(keys: &[RegistrationKey]) -> Vec<String> {
    let unique: BTreeSet<&str> = keys.iter().map(RegistrationKey::namespace).collect();
    unique.into_iter().map(str::to_string).collect()
}

fn names_in(keys: &[RegistrationKey], namespace: &str) -> Vec<String> {
    let unique: BTreeSet<&str> = keys
        .iter()
        .filter(|key| key.namespace() == namespace)
        .map(RegistrationKey::name)
        .collect();
    unique.into_iter().map(str::to_string).collect()
}

fn tags_in(keys: &[RegistrationKey], namespace: &str, name: &str) -> Vec<String> {
    let unique: BTreeSet<&String> = keys
        .iter()
        .filter(|key| key.namespace() == namespace && key.name() == name)
        .flat_map(|key| key.tags())
        .collect();
    unique.into_iter().cloned().collect()
}

/// Keys with this namespace and name carrying every chosen tag.
fn narrow(
    keys: &[RegistrationKey],
    namespace: &str,
    name: &str,
    tags: &[String],
) -> Vec<RegistrationKey> {
    keys.iter()
        .filter(|key| key.namespace() == namespace && key.name() == name)
        .filter(|key| tags.iter().all(|tag| key.tags().contains(tag)))
        .cloned()
        .collect()
}
