//! Property-based tests for query building and rendering.
//!
//! Verifies:
//! - Rendered text never depends on bound values
//! - Every bound value lands in the parameter table unchanged
//! - Tokens outside the identifier grammar never render
//! - Valid identifiers always render, backtick-quoted

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use activity_graph::query::{builder, is_identifier, render};
use activity_graph::storage::InMemoryGraphClient;
use activity_graph::{ActivityService, Error, ServiceOptions};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for identifiers.
fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,15}"
}

/// Strategy for arbitrary non-empty ids, including quotes and Cypher syntax.
fn external_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,10}",
        "\\PC{1,40}",
        Just("1' OR 1=1 //".to_string()),
        Just("}) DETACH DELETE (n".to_string()),
        Just("$p0".to_string()),
    ]
}

/// Strategy for tokens that break out of the identifier grammar.
fn hostile_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z]{1,8}[ )`\\-\\]{};:'\"]{1,3}[A-Za-z ]{0,8}",
        "[0-9][A-Za-z0-9_]{0,8}",
        Just("user`) DETACH DELETE (n //".to_string()),
    ]
}

proptest! {
    #[test]
    fn prop_rendered_text_independent_of_id(
        label in identifier(),
        verb in identifier(),
        a in external_id(),
        b in external_id(),
    ) {
        let left = render(&builder::list_relationships(&label, &a, &verb).unwrap()).unwrap();
        let right = render(&builder::list_relationships(&label, &b, &verb).unwrap()).unwrap();
        prop_assert_eq!(left.text, right.text);
    }

    #[test]
    fn prop_id_is_bound_not_inlined(label in identifier(), id in external_id()) {
        let rendered = render(&builder::get_by_id(&label, &id).unwrap()).unwrap();
        let values: Vec<_> = rendered.parameters.iter().map(|(_, v)| v.clone()).collect();
        prop_assert_eq!(values, vec![serde_json::Value::String(id)]);
        prop_assert!(rendered.text.contains("$p0"));
    }

    #[test]
    fn prop_valid_labels_render_quoted(label in identifier(), object in identifier()) {
        let query = builder::filter_by_relationship_and_target_type(&label, "1", "LIKED", &object)
            .unwrap();
        let rendered = render(&query).unwrap();
        let actor_pattern = format!("(actor:`{label}`)");
        let object_pattern = format!("(object:`{object}`)");
        prop_assert!(rendered.text.contains(&actor_pattern));
        prop_assert!(rendered.text.contains(&object_pattern));
    }

    #[test]
    fn prop_hostile_label_never_reaches_store(token in hostile_token()) {
        prop_assume!(!is_identifier(&token));
        let store = Arc::new(InMemoryGraphClient::new());
        let service =
            ActivityService::with_shared_client(Arc::clone(&store), ServiceOptions::default());

        prop_assert!(matches!(service.list_by_type(&token), Err(Error::InvalidParameter(_))));
        prop_assert!(matches!(
            service.list_relationships("user", "1", &token),
            Err(Error::InvalidParameter(_))
        ));
        prop_assert!(matches!(
            service.filter_by_relationship_and_target_type("user", "1", "LIKED", &token),
            Err(Error::InvalidParameter(_))
        ));
        prop_assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn prop_verb_rendered_uppercase(verb in "[a-z][a-z_]{0,10}") {
        let rendered = render(&builder::list_relationships("user", "1", &verb).unwrap()).unwrap();
        let expected = format!("[verb:`{}`]", verb.to_uppercase());
        prop_assert!(rendered.text.contains(&expected));
    }
}
