//! Registry behaviour over the shared fixtures: registration, dependency
//! resolution, variant expansion and component building.

use pretty_assertions::assert_eq;
use tessera_core::{
    Configuration, Error, KeyQuery, Overrides, ParamSpec, ParamType, Registration,
    RegistrationKey, Registry, Value,
};
use tessera_test_utils::fixtures::{
    self, BaseComponent, CallCounter, ChildComponent, CountingRunner, NAMESPACE, ParentComponent,
    testing_key,
};

fn overrides(pairs: &[(&str, Value)]) -> Overrides {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

mod registration {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_empty_configuration() {
        let mut registry = Registry::new();
        let key = registry
            .register_configuration(Registration::new(NAMESPACE, "test", || {
                Ok(Configuration::new())
            }))
            .unwrap();

        assert!(registry.contains(&key));
        assert!(registry.retrieve_configuration(&key, true).unwrap().is_empty());
        assert!(registry.build_configuration(&key).is_ok());
    }

    #[test]
    fn test_same_name_with_different_tags() {
        let mut registry = Registry::new();
        registry
            .register_configuration(fixtures::base_registration("test", &[]))
            .unwrap();
        registry
            .register_configuration(fixtures::base_registration("test", &["t2"]))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.register_configuration(fixtures::base_registration("test", &["t2"])),
            Err(Error::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_unregistered_key_lookup_fails() {
        let registry = Registry::new();
        let key = testing_key("test_config", &["tag1", "tag2"]);
        assert!(matches!(
            registry.retrieve_configuration(&key, false),
            Err(Error::NotRegistered { .. })
        ));
        assert!(matches!(
            registry.retrieve_configuration_info(&key, true),
            Err(Error::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_bound_registration_info() {
        let mut registry = Registry::new();
        let key = registry
            .register_configuration(fixtures::base_registration("component", &["tag"]))
            .unwrap();

        let info = registry.retrieve_configuration_info(&key, true).unwrap();
        assert!(info.is_bound());
        assert_eq!(info.config_type.as_deref(), Some("BaseConfig"));
        assert!(info.build_recursively);
        assert!(info.variant_of.is_none());
    }

    #[test]
    fn test_config_type_mismatch_is_reported() {
        let mut registry = Registry::new();
        let result = registry.register_configuration(
            Registration::new(NAMESPACE, "typed", fixtures::child_config).config_type("BaseConfig"),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfigurationType { expected, actual, .. })
                if expected == "BaseConfig" && actual == "ChildConfig"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_from_variant() {
        let mut registry = Registry::new();
        let template = registry
            .register_configuration(fixtures::base_registration("config", &[]))
            .unwrap();
        let key = registry
            .register_configuration_from_variant(
                &template,
                overrides(&[("x", Value::Int(10)), ("y", Value::Int(15))]),
            )
            .unwrap();

        assert_eq!(key, testing_key("config", &["x=10", "y=15"]));
        let config = registry.retrieve_configuration(&key, true).unwrap();
        assert_eq!(config.value("x"), Some(&Value::Int(10)));
        assert_eq!(config.value("y"), Some(&Value::Int(15)));

        let info = registry.retrieve_configuration_info(&key, true).unwrap();
        assert_eq!(info.variant_of.as_ref(), Some(&template));

        let component = registry.build_component(&key).unwrap();
        assert_eq!(
            component.downcast_ref::<BaseComponent>(),
            Some(&BaseComponent { x: 10, y: 15 })
        );
    }

    #[test]
    fn test_external_namespace_must_be_covered() {
        let mut registry = Registry::new();
        let registration = Registration::new(
            NAMESPACE,
            "config",
            fixtures::config_with_external_dependency,
        );
        match registry.register_configuration(registration.clone()).unwrap_err() {
            Error::NamespaceNotFound { namespace, .. } => {
                assert_eq!(namespace, fixtures::EXTERNAL_NAMESPACE);
            }
            other => panic!("unexpected error: {other}"),
        }

        registry
            .register_configuration(Registration::new(
                fixtures::EXTERNAL_NAMESPACE,
                "test",
                fixtures::base_config,
            ))
            .unwrap();
        let key = registry.register_configuration(registration).unwrap();
        let config = registry.build_configuration(&key).unwrap();
        assert!(config.value("c1").and_then(Value::as_config).is_some());
    }

    #[test]
    fn test_retrieve_keys_by_query() {
        let mut registry = Registry::new();
        registry
            .register_configuration(fixtures::base_registration("model", &["large"]))
            .unwrap();
        registry
            .register_configuration(fixtures::base_registration("model", &["small"]))
            .unwrap();
        registry
            .register_configuration(fixtures::child_registration("tokenizer", &[]))
            .unwrap();

        assert_eq!(registry.retrieve_keys(&KeyQuery::new().name("model")).len(), 2);
        assert_eq!(
            registry.retrieve_keys(&KeyQuery::new().tag("large")),
            vec![testing_key("model", &["large"])]
        );
        assert_eq!(
            registry.retrieve_keys(&KeyQuery::new().untagged()),
            vec![testing_key("tokenizer", &[])]
        );
        assert!(registry.retrieve_keys(&KeyQuery::new().namespace("other")).is_empty());
    }
}

mod resolution {
    use super::*;
    use pretty_assertions::assert_eq;

    /// `top -> left -> shared` and `top -> right -> shared`, all bound.
    fn diamond(shared_builds: &CallCounter) -> Registry {
        let mut registry = Registry::new();
        let counter = shared_builds.clone();
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "shared", fixtures::base_config).component(
                    move |config: &Configuration| {
                        counter.hit();
                        BaseComponent::from_config(config)
                    },
                ),
            )
            .unwrap();
        for side in ["left", "right"] {
            registry
                .register_configuration(
                    Registration::new(NAMESPACE, side, || {
                        let mut config = Configuration::new();
                        config.add(ParamSpec::dependency("c1", testing_key("shared", &[])))?;
                        Ok(config)
                    })
                    .component(ParentComponent::from_config),
                )
                .unwrap();
        }
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "top", || {
                    let mut config = Configuration::new();
                    config.add(ParamSpec::dependency("c1", testing_key("left", &[])))?;
                    config.add(ParamSpec::dependency("c2", testing_key("right", &[])))?;
                    Ok(config)
                })
                .component(ParentComponent::from_config),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_dependencies_built_before_dependents() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        let child = registry
            .register_configuration(fixtures::base_registration("test", &["t2"]))
            .unwrap();

        let resolution = registry.dag_resolution(&parent).unwrap();
        assert_eq!(resolution.order(), vec![&child, &parent]);

        let config = resolution.root_configuration().unwrap();
        let c1 = config.value("c1").and_then(Value::as_config).unwrap();
        assert_eq!(c1.value("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_shared_dependency_built_once() {
        let shared_builds = CallCounter::new();
        let registry = diamond(&shared_builds);

        let resolution = registry.dag_resolution(&testing_key("top", &[])).unwrap();
        assert_eq!(resolution.len(), 4);
        assert_eq!(resolution.order()[0], &testing_key("shared", &[]));
        assert_eq!(resolution.order()[3], &testing_key("top", &[]));

        let top = registry.build_component(&testing_key("top", &[])).unwrap();
        assert_eq!(shared_builds.count(), 1);

        let top = top.downcast_ref::<ParentComponent>().unwrap();
        let left = top.c1.as_component().unwrap();
        assert!(left.downcast_ref::<ParentComponent>().is_some());
    }

    #[test]
    fn test_each_build_call_is_independent() {
        let shared_builds = CallCounter::new();
        let registry = diamond(&shared_builds);

        let first = registry.build_component(&testing_key("shared", &[])).unwrap();
        let second = registry.build_component(&testing_key("shared", &[])).unwrap();
        assert_eq!(shared_builds.count(), 2);
        assert_ne!(first, second);
    }

    #[test]
    fn test_clique_is_not_a_dag() {
        let mut registry = Registry::new();
        for registration in fixtures::clique_registrations() {
            registry.register_configuration(registration).unwrap();
        }

        let root = testing_key("config", &["c1"]);
        match registry.check_registration_graph(&root).unwrap_err() {
            Error::NotADag { edges } => {
                let c2 = testing_key("config", &["c2"]);
                assert_eq!(edges, vec![(root.clone(), c2.clone()), (c2, root.clone())]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(registry.expand_variants(), Err(Error::NotADag { .. })));
        assert!(!registry.is_expanded());
    }

    #[test]
    fn test_unreachable_entries_stay_out_of_the_graph() {
        let shared_builds = CallCounter::new();
        let mut registry = diamond(&shared_builds);
        let stray = registry
            .register_configuration(fixtures::base_registration("stray", &[]))
            .unwrap();

        let graph = registry.check_registration_graph(&testing_key("left", &[])).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains(&testing_key("shared", &[])));
        assert!(!graph.contains(&testing_key("top", &[])));
        assert!(!graph.contains(&stray));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_tag_subset_lookup_for_dependency() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        let child = registry
            .register_configuration(fixtures::base_registration("test", &["t2", "extra"]))
            .unwrap();

        let resolution = registry.dag_resolution(&parent).unwrap();
        assert_eq!(
            resolution.get(&parent).unwrap().dependencies["c1"],
            Value::Key(child.clone())
        );
        assert!(resolution.contains(&child));
    }

    #[test]
    fn test_list_of_dependencies() {
        let mut registry = Registry::new();
        registry
            .register_configuration(fixtures::base_registration("a", &[]))
            .unwrap();
        registry
            .register_configuration(fixtures::base_registration("b", &[]))
            .unwrap();
        let root = registry
            .register_configuration(Registration::new(NAMESPACE, "ensemble", || {
                let mut config = Configuration::new();
                config.add(
                    ParamSpec::new("members")
                        .value(Value::List(vec![
                            Value::Key(testing_key("a", &[])),
                            Value::Key(testing_key("b", &[])),
                        ]))
                        .type_hint(ParamType::Key)
                        .required(),
                )?;
                Ok(config)
            }))
            .unwrap();

        let config = registry.build_configuration(&root).unwrap();
        let members = config.value("members").and_then(Value::as_list).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| m.as_config().is_some()));
    }

    #[test]
    fn test_invalid_child_fails_parent() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "test", fixtures::invalid_config).tag("t2"),
            )
            .unwrap();

        assert!(matches!(
            registry.build_configuration(&parent),
            Err(Error::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_root_overrides() {
        let mut registry = Registry::new();
        let key = registry
            .register_configuration(fixtures::base_registration("config", &[]))
            .unwrap();

        let handle = registry
            .build_component_with(&key, &overrides(&[("x", Value::Int(7))]))
            .unwrap();
        assert_eq!(
            handle.downcast_ref::<BaseComponent>(),
            Some(&BaseComponent { x: 7, y: 10 })
        );
        assert!(matches!(
            registry.build_component_with(&key, &overrides(&[("z", Value::Int(1))])),
            Err(Error::NonExistingParameter { .. })
        ));
    }
}

mod variants {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expansion_registers_every_combination() {
        let mut registry = Registry::new();
        let template = registry
            .register_configuration(Registration::new(
                NAMESPACE,
                "config",
                fixtures::variant_config,
            ))
            .unwrap();

        let new_keys = registry.expand_variants().unwrap();
        assert_eq!(new_keys.len(), 3);
        for x in 1..=3 {
            let key = template
                .from_variant(&overrides(&[("x", Value::Int(x))]))
                .unwrap();
            assert!(new_keys.contains(&key));
            let config = registry.build_configuration(&key).unwrap();
            assert_eq!(config.value("x"), Some(&Value::Int(x)));
        }
        assert!(registry.contains(&template));
    }

    #[test]
    fn test_child_variants_multiply_parent_variants() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(Registration::new(
                NAMESPACE,
                "config",
                fixtures::variant_config_with_child,
            ))
            .unwrap();
        let child = registry
            .register_configuration(fixtures::child_registration("test", &["t2"]))
            .unwrap();

        let new_keys = registry.expand_variants().unwrap();
        // 2 child variants, 3 x 2 parent variants
        assert_eq!(new_keys.len(), 8);
        assert_eq!(registry.len(), 10);

        for x in 1..=3 {
            for y in [false, true] {
                let child_variant = child
                    .from_variant(&overrides(&[("y", Value::Bool(y))]))
                    .unwrap();
                let key = parent
                    .from_variant(&overrides(&[
                        ("x", Value::Int(x)),
                        ("c1", Value::Key(child_variant)),
                    ]))
                    .unwrap();
                let config = registry.build_configuration(&key).unwrap();
                let c1 = config.value("c1").and_then(Value::as_config).unwrap();
                assert_eq!(c1.value("y"), Some(&Value::Bool(y)));
            }
        }
    }

    #[test]
    fn test_shared_variant_child() {
        let mut registry = Registry::new();
        registry
            .register_configuration(fixtures::parent_registration("config", &["a"]))
            .unwrap();
        registry
            .register_configuration(fixtures::parent_registration("config", &["b"]))
            .unwrap();
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "test", fixtures::variant_config).tag("t2"),
            )
            .unwrap();

        registry.expand_variants().unwrap();
        assert_eq!(registry.len(), 12);
        assert_eq!(
            registry
                .retrieve_keys(&KeyQuery::new().name("config").tag("a"))
                .len(),
            4
        );
    }

    #[test]
    fn test_variant_component_gets_variant_child() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        let child = registry
            .register_configuration(fixtures::child_registration("test", &["t2"]))
            .unwrap();
        registry.expand_variants().unwrap();

        let plain = registry.build_component(&parent).unwrap();
        let plain = plain.downcast_ref::<ParentComponent>().unwrap();
        let plain_child = plain.c1.as_component().unwrap();
        assert_eq!(
            plain_child.downcast_ref::<ChildComponent>(),
            Some(&ChildComponent { y: false })
        );

        let child_variant = child
            .from_variant(&overrides(&[("y", Value::Bool(true))]))
            .unwrap();
        let variant_key = parent
            .from_variant(&overrides(&[("c1", Value::Key(child_variant))]))
            .unwrap();
        let variant = registry.build_component(&variant_key).unwrap();
        let variant = variant.downcast_ref::<ParentComponent>().unwrap();
        let variant_child = variant.c1.as_component().unwrap();
        assert_eq!(
            variant_child.downcast_ref::<ChildComponent>(),
            Some(&ChildComponent { y: true })
        );
    }

    fn single_param_template(name: &'static str, variants: Vec<Value>) -> Registration {
        Registration::new(NAMESPACE, name, move || {
            let mut config = Configuration::new();
            config.add(
                ParamSpec::new("p")
                    .value(variants[0].clone())
                    .variants(variants.clone()),
            )?;
            Ok(config)
        })
    }

    #[test]
    fn test_values_sharing_a_tag_are_rejected() {
        let mut registry = Registry::new();
        registry
            .register_configuration(single_param_template(
                "spaced",
                vec![Value::from("a b"), Value::from("a_b")],
            ))
            .unwrap();

        match registry.expand_variants() {
            Err(Error::AlreadyRegistered { key }) => {
                assert_eq!(key, testing_key("spaced", &["p=a_b"]));
            }
            other => panic!("unexpected expansion result: {other:?}"),
        }
        assert!(!registry.is_expanded());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_int_and_float_variants_stay_distinct() {
        let mut registry = Registry::new();
        registry
            .register_configuration(single_param_template(
                "numbers",
                vec![Value::Int(1), Value::Float(1.0)],
            ))
            .unwrap();

        let new_keys = registry.expand_variants().unwrap();
        assert_eq!(
            new_keys,
            vec![
                testing_key("numbers", &["p=1"]),
                testing_key("numbers", &["p=1.0"]),
            ]
        );
        assert_eq!(registry.len(), 3);
        let float = registry
            .build_configuration(&testing_key("numbers", &["p=1.0"]))
            .unwrap();
        assert_eq!(float.value("p"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_expansion_reuses_registered_variant() {
        let mut registry = Registry::new();
        let template = registry
            .register_configuration(Registration::new(
                NAMESPACE,
                "config",
                fixtures::variant_config,
            ))
            .unwrap();
        registry
            .register_configuration_from_variant(
                &template,
                overrides(&[("x", Value::Int(2))]),
            )
            .unwrap();

        let new_keys = registry.expand_variants().unwrap();
        assert_eq!(new_keys.len(), 2);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_expansion_rejects_unrelated_entry_with_variant_key() {
        let mut registry = Registry::new();
        registry
            .register_configuration(Registration::new(
                NAMESPACE,
                "config",
                fixtures::variant_config,
            ))
            .unwrap();
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "config", fixtures::base_config).tag("x=2"),
            )
            .unwrap();

        assert!(matches!(
            registry.expand_variants(),
            Err(Error::AlreadyRegistered { key }) if key == testing_key("config", &["x=2"])
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_no_registration_after_expansion() {
        let mut registry = Registry::new();
        let template = registry
            .register_configuration(fixtures::base_registration("config", &[]))
            .unwrap();
        assert!(registry.expand_variants().unwrap().is_empty());

        assert!(matches!(
            registry.register_configuration(fixtures::base_registration("late", &[])),
            Err(Error::AlreadyExpanded)
        ));
        assert!(matches!(
            registry.register_configuration_from_variant(
                &template,
                overrides(&[("x", Value::Int(1))])
            ),
            Err(Error::AlreadyExpanded)
        ));
    }
}

mod components {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_component_from_key() {
        let mut registry = Registry::new();
        let key = registry
            .register_configuration(fixtures::base_registration("component", &[]))
            .unwrap();

        let handle = registry.build_component(&key).unwrap();
        assert_eq!(
            handle.downcast_ref::<BaseComponent>(),
            Some(&BaseComponent { x: 5, y: 10 })
        );
        assert!(handle.downcast_ref::<ChildComponent>().is_none());
    }

    #[test]
    fn test_factory_error_propagates() {
        let mut registry = Registry::new();
        let key = registry
            .register_configuration(
                Registration::new(NAMESPACE, "component", fixtures::base_config)
                    .component(ChildComponent::from_config),
            )
            .unwrap();
        assert!(matches!(
            registry.build_component(&key),
            Err(Error::Component { .. })
        ));
    }

    #[test]
    fn test_child_component_is_a_fresh_instance() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        let child = registry
            .register_configuration(fixtures::child_registration("test", &["t2"]))
            .unwrap();

        let parent_component = registry.build_component(&parent).unwrap();
        let child_component = registry.build_component(&child).unwrap();

        let nested = parent_component
            .downcast_ref::<ParentComponent>()
            .unwrap()
            .c1
            .as_component()
            .unwrap()
            .clone();
        assert_ne!(nested, child_component);
    }

    #[test]
    fn test_non_recursive_build_keeps_configuration() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(
                fixtures::parent_registration("config", &[]).build_recursively(false),
            )
            .unwrap();
        registry
            .register_configuration(fixtures::child_registration("test", &["t2"]))
            .unwrap();

        let handle = registry.build_component(&parent).unwrap();
        let component = handle.downcast_ref::<ParentComponent>().unwrap();
        assert!(component.c1.as_config().is_some());
    }

    #[test]
    fn test_unbound_child_is_passed_as_configuration() {
        let mut registry = Registry::new();
        let parent = registry
            .register_configuration(fixtures::parent_registration("config", &[]))
            .unwrap();
        registry
            .register_configuration(
                Registration::new(NAMESPACE, "test", fixtures::child_config).tag("t2"),
            )
            .unwrap();

        let handle = registry.build_component(&parent).unwrap();
        let component = handle.downcast_ref::<ParentComponent>().unwrap();
        let c1 = component.c1.as_config().unwrap();
        assert_eq!(c1.value("y"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_run_component() {
        let mut registry = Registry::new();
        let runs = CallCounter::new();
        let counter = runs.clone();
        let runner = registry
            .register_configuration(
                Registration::new(NAMESPACE, "runner", || Ok(Configuration::new())).component(
                    move |_: &Configuration| {
                        Ok(CountingRunner {
                            runs: counter.clone(),
                        })
                    },
                ),
            )
            .unwrap();
        let plain = registry
            .register_configuration(fixtures::base_registration("plain", &[]))
            .unwrap();

        registry.run_component(&runner, &Overrides::new()).unwrap();
        assert_eq!(runs.count(), 1);
        assert!(matches!(
            registry.run_component(&plain, &Overrides::new()),
            Err(Error::NotRunnable { .. })
        ));
    }

    #[test]
    fn test_partial_key_builds_component() {
        let mut registry = Registry::new();
        registry
            .register_configuration(fixtures::base_registration("component", &["gpu", "large"]))
            .unwrap();

        let query: RegistrationKey = "name:component--tags:[gpu]--namespace:testing"
            .parse()
            .unwrap();
        assert!(registry.build_component(&query).is_ok());
    }
}
