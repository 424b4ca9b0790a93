//! Activity service integration tests.
//!
//! Runs the five operations end to end against the in-memory graph: build,
//! render, execute and shape.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use activity_graph::storage::InMemoryGraphClient;
use activity_graph::{ActivityRequest, ActivityResponse, ActivityService, Error, ServiceOptions};
use std::sync::Arc;

/// `user/1 -FAVORITED-> photo/10010`.
fn favorited_fixture() -> Arc<InMemoryGraphClient> {
    let store = InMemoryGraphClient::new();
    let user = store.add_node("user", "1").unwrap();
    let photo = store.add_node("photo", "10010").unwrap();
    store.add_edge(&user, "FAVORITED", &photo).unwrap();
    Arc::new(store)
}

fn service(store: &Arc<InMemoryGraphClient>) -> ActivityService<Arc<InMemoryGraphClient>> {
    ActivityService::new(Arc::clone(store), ServiceOptions::default())
}

#[test]
fn test_list_by_type_returns_every_node() {
    let store = favorited_fixture();
    store.add_node("user", "2").unwrap();

    let users = service(&store).list_by_type("user").unwrap();
    let mut ids: Vec<_> = users.iter().filter_map(|n| n.external_id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn test_list_by_type_is_idempotent() {
    let store = favorited_fixture();
    let service = service(&store);
    let first = service.list_by_type("photo").unwrap();
    let second = service.list_by_type("photo").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_label_is_empty_success() {
    let store = favorited_fixture();
    assert!(service(&store).list_by_type("video").unwrap().is_empty());
}

#[test]
fn test_get_by_id() {
    let store = favorited_fixture();
    let service = service(&store);

    let found = service.get_by_id("photo", "10010").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].external_id().as_deref(), Some("10010"));

    assert!(service.get_by_id("photo", "404").unwrap().is_empty());
}

#[test]
fn test_list_relationships_single_edge() {
    let store = favorited_fixture();
    let summary = service(&store)
        .list_relationships("user", "1", "FAVORITED")
        .unwrap();

    assert_eq!(summary.len(), 1);
    let row = &summary[0];
    assert_eq!(row.actor.external_id().as_deref(), Some("1"));
    assert_eq!(row.count, 1);
    assert_eq!(row.verbs.len(), 1);
    assert_eq!(row.verbs[0].edge_type, "FAVORITED");
    assert_eq!(row.objects[0].external_id().as_deref(), Some("10010"));
}

#[test]
fn test_verb_is_case_insensitive() {
    let store = favorited_fixture();
    let summary = service(&store)
        .list_relationships("user", "1", "favorited")
        .unwrap();
    assert_eq!(summary[0].count, 1);
}

#[test]
fn test_target_type_filter() {
    let store = favorited_fixture();
    let service = service(&store);

    let photos = service
        .filter_by_relationship_and_target_type("user", "1", "FAVORITED", "photo")
        .unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].verb.edge_type, "FAVORITED");
    assert_eq!(photos[0].object.label(), Some("photo"));

    let pictures = service
        .filter_by_relationship_and_target_type("user", "1", "FAVORITED", "picture")
        .unwrap();
    assert!(pictures.is_empty());
}

#[test]
fn test_all_activities_grouped_by_verb() {
    let store = InMemoryGraphClient::new();
    let user = store.add_node("user", "1").unwrap();
    let first = store.add_node("photo", "10").unwrap();
    let second = store.add_node("photo", "11").unwrap();
    let post = store.add_node("post", "20").unwrap();
    store.add_edge(&user, "FAVORITED", &first).unwrap();
    store.add_edge(&user, "FAVORITED", &second).unwrap();
    store.add_edge(&user, "SHARED", &post).unwrap();
    let store = Arc::new(store);

    let groups = service(&store)
        .list_all_activities_by_actor("user", "1")
        .unwrap();

    assert_eq!(groups.len(), 2);
    let favorited = groups.iter().find(|g| g.activity == "FAVORITED").unwrap();
    assert_eq!(favorited.count, 2);
    assert_eq!(favorited.objects.len(), 2);
    let shared = groups.iter().find(|g| g.activity == "SHARED").unwrap();
    assert_eq!(shared.count, 1);
}

#[test]
fn test_repeated_activity_creates_distinct_edges() {
    let store = InMemoryGraphClient::new();
    let user = store.add_node("user", "1").unwrap();
    let photo = store.add_node("photo", "10010").unwrap();
    store.add_edge(&user, "FAVORITED", &photo).unwrap();
    store.add_edge(&user, "FAVORITED", &photo).unwrap();
    let store = Arc::new(store);

    let summary = service(&store)
        .list_relationships("user", "1", "FAVORITED")
        .unwrap();
    assert_eq!(summary[0].count, 2);
    assert_ne!(summary[0].verbs[0].id, summary[0].verbs[1].id);
}

#[test]
fn test_dry_run_never_calls_client() {
    let store = favorited_fixture();
    let service = ActivityService::with_shared_client(
        Arc::clone(&store),
        ServiceOptions::default().with_dry_run(true),
    );

    assert!(service.list_by_type("user").unwrap().is_empty());
    assert!(service.get_by_id("user", "1").unwrap().is_empty());
    assert!(
        service
            .list_relationships("user", "1", "FAVORITED")
            .unwrap()
            .is_empty()
    );
    assert!(
        service
            .filter_by_relationship_and_target_type("user", "1", "FAVORITED", "photo")
            .unwrap()
            .is_empty()
    );
    assert!(
        service
            .list_all_activities_by_actor("user", "1")
            .unwrap()
            .is_empty()
    );
    assert_eq!(store.call_count(), 0);
}

#[test]
fn test_injection_attempt_is_rejected_before_the_store() {
    let store = favorited_fixture();
    let service = service(&store);

    let err = service.list_by_type("user) DETACH DELETE (n").unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    let err = service
        .list_relationships("user", "1", "FAVORITED]->() DELETE x //")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    assert!(service.get_by_id("user", "").is_err());
    assert_eq!(store.call_count(), 0);
    assert_eq!(store.node_count(), 2);
}

#[test]
fn test_hostile_id_is_just_a_value() {
    let store = favorited_fixture();
    let found = service(&store)
        .get_by_id("user", "1' OR 1=1 //")
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(store.call_count(), 1);
}

#[test]
fn test_routed_request() {
    let store = favorited_fixture();
    let request = ActivityRequest::from_path("/user/1/FAVORITED/photo").unwrap();
    let response = service(&store).handle(&request).unwrap();
    assert!(matches!(response, ActivityResponse::Activities(ref v) if v.len() == 1));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json[0]["verb"]["type"], "FAVORITED");
    assert_eq!(json[0]["object"]["data"]["photo_id"], "10010");
}
