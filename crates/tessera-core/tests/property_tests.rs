use proptest::prelude::*;
use std::collections::BTreeSet;
use tessera_core::{Configuration, ParamSpec, RegistrationKey, Value};

fn key_strategy() -> impl Strategy<Value = RegistrationKey> {
    (
        "[a-z]{1,5}(/[a-z]{1,5}){0,2}",
        "[a-z][a-z0-9_]{0,8}",
        prop::collection::btree_set("[a-z0-9][a-z0-9=_./]{0,6}", 0..6),
    )
        .prop_map(|(namespace, name, tags)| {
            RegistrationKey::new(namespace, name, tags).unwrap()
        })
}

/// Raw parts including dashes and quotes, which `RegistrationKey::new` may
/// reject.
fn raw_parts_strategy() -> impl Strategy<Value = (String, String, BTreeSet<String>)> {
    (
        "[a-z-]{1,5}(/[a-z-]{1,5}){0,2}",
        "[a-z-][a-z0-9_'-]{0,8}",
        prop::collection::btree_set("[a-z0-9'\"-][a-z0-9=_./'\"-]{0,6}", 0..6),
    )
}

proptest! {
    #[test]
    fn test_accepted_keys_round_trip((namespace, name, tags) in raw_parts_strategy()) {
        if let Ok(key) = RegistrationKey::new(namespace, name, tags) {
            let parsed = RegistrationKey::parse(&key.to_string()).unwrap();
            prop_assert_eq!(&parsed, &key);
            let pretty = RegistrationKey::parse(&key.to_pretty_string()).unwrap();
            prop_assert_eq!(&pretty, &key);
        }
    }

    #[test]
    fn test_key_string_round_trip(key in key_strategy()) {
        let parsed = RegistrationKey::parse(&key.to_string()).unwrap();
        prop_assert_eq!(&parsed, &key);

        let pretty = RegistrationKey::parse(&key.to_pretty_string()).unwrap();
        prop_assert_eq!(&pretty, &key);
    }

    #[test]
    fn test_key_json_round_trip(key in key_strategy()) {
        prop_assert_eq!(RegistrationKey::from_json(&key.to_json()).unwrap(), key);
    }

    #[test]
    fn test_partial_match_accepts_every_tag_subset(key in key_strategy(), mask in any::<u8>()) {
        let subset: Vec<&String> = key
            .tags()
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, tag)| tag)
            .collect();
        let query =
            RegistrationKey::new(key.namespace(), key.name(), subset.into_iter().cloned()).unwrap();
        prop_assert!(query.matches(&key, false));
    }

    #[test]
    fn test_variant_combinations_form_the_full_product(
        sizes in prop::collection::vec(1usize..4, 1..4)
    ) {
        let mut config = Configuration::new();
        for (i, size) in sizes.iter().enumerate() {
            let variants: Vec<i64> = (0..*size as i64).collect();
            config.add(ParamSpec::new(format!("p{i}")).value(0).variants(variants)).unwrap();
        }

        let combinations = config.variant_combinations();
        let expected: usize = sizes.iter().product();
        prop_assert_eq!(combinations.len(), expected);

        let distinct: BTreeSet<String> = combinations
            .iter()
            .map(|c| c.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(","))
            .collect();
        prop_assert_eq!(distinct.len(), expected);
        prop_assert!(combinations.iter().all(|c| c.len() == sizes.len()));
        prop_assert!(combinations[0].values().all(|v| *v == Value::Int(0)));
    }
}
