//! Query builders for the five activity access patterns.
//!
//! Each function validates its untrusted inputs and returns a [`Query`].
//! Labels and verbs come from URL path segments and must match the identifier
//! grammar; external ids are bound as parameters and may contain anything.
//!
//! | Function | Projection |
//! |----------|------------|
//! | [`list_by_type`] | `actor` |
//! | [`get_by_id`] | `actor` |
//! | [`list_relationships`] | `actor, verbs, objects, count` |
//! | [`filter_by_relationship_and_target_type`] | `actor, verb, object` |
//! | [`list_all_activities_by_actor`] | `actor, activity, objects, count` |
//!
//! Unknown labels and verbs are not an error; they produce an empty result.

use super::ast::{AggregateItem, Clause, GroupKey, Parameters, Query};
use super::identifier::is_identifier;
use crate::{Error, Result};

/// Variable bound to the source node.
pub const ACTOR: &str = "actor";
/// Variable bound to the traversed edge.
pub const VERB: &str = "verb";
/// Variable bound to the destination node.
pub const OBJECT: &str = "object";

/// Matches every node with `label`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `label` is empty or not an identifier.
pub fn list_by_type(label: &str) -> Result<Query> {
    let label = validate_name("type", label)?;
    Ok(Query::new(
        vec![match_node(ACTOR, label), project(&[ACTOR])],
        Parameters::new(),
    ))
}

/// Matches the node with `label` whose `{label}_id` equals `external_id`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `label` is invalid or `external_id`
/// is empty.
pub fn get_by_id(label: &str, external_id: &str) -> Result<Query> {
    let label = validate_name("type", label)?;
    let mut params = Parameters::new();
    let filter = actor_filter(label, external_id, &mut params)?;
    Ok(Query::new(
        vec![match_node(ACTOR, label), filter, project(&[ACTOR])],
        params,
    ))
}

/// Matches `actor-[verb:VERB]->object`, grouped per actor.
///
/// Edges and objects are collected and the objects counted.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] on an invalid label, verb or id.
pub fn list_relationships(actor_label: &str, actor_id: &str, verb: &str) -> Result<Query> {
    let actor_label = validate_name("type", actor_label)?;
    let verb = normalize_verb(verb)?;
    let mut params = Parameters::new();
    let filter = actor_filter(actor_label, actor_id, &mut params)?;
    Ok(Query::new(
        vec![
            match_node(ACTOR, actor_label),
            match_edge(Some(verb)),
            filter,
            Clause::Aggregate {
                group: vec![GroupKey::Var(ACTOR.to_string())],
                collect: vec![
                    AggregateItem::new(VERB, "verbs"),
                    AggregateItem::new(OBJECT, "objects"),
                ],
                count: Some(AggregateItem::new(OBJECT, "count")),
            },
            project(&[ACTOR, "verbs", "objects", "count"]),
        ],
        params,
    ))
}

/// Matches `actor-[verb:VERB]->object:object_label`, one row per edge.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] on an invalid label, verb or id.
pub fn filter_by_relationship_and_target_type(
    actor_label: &str,
    actor_id: &str,
    verb: &str,
    object_label: &str,
) -> Result<Query> {
    let actor_label = validate_name("type", actor_label)?;
    let verb = normalize_verb(verb)?;
    let object_label = validate_name("object type", object_label)?;
    let mut params = Parameters::new();
    let filter = actor_filter(actor_label, actor_id, &mut params)?;
    Ok(Query::new(
        vec![
            match_node(ACTOR, actor_label),
            match_edge(Some(verb)),
            match_node(OBJECT, object_label),
            filter,
            project(&[ACTOR, VERB, OBJECT]),
        ],
        params,
    ))
}

/// Matches every outgoing edge of the actor, grouped per verb type.
///
/// Groups are keyed by edge *type*, not edge instance: two `FAVORITED` edges
/// land in one group with a count of 2.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] on an invalid label or id.
pub fn list_all_activities_by_actor(actor_label: &str, actor_id: &str) -> Result<Query> {
    let actor_label = validate_name("type", actor_label)?;
    let mut params = Parameters::new();
    let filter = actor_filter(actor_label, actor_id, &mut params)?;
    Ok(Query::new(
        vec![
            match_node(ACTOR, actor_label),
            match_edge(None),
            filter,
            Clause::Aggregate {
                group: vec![
                    GroupKey::Var(ACTOR.to_string()),
                    GroupKey::EdgeType {
                        var: VERB.to_string(),
                        alias: "activity".to_string(),
                    },
                ],
                collect: vec![AggregateItem::new(OBJECT, "objects")],
                count: Some(AggregateItem::new(OBJECT, "count")),
            },
            project(&[ACTOR, "activity", "objects", "count"]),
        ],
        params,
    ))
}

/// Checks a label against the identifier grammar.
fn validate_name<'a>(what: &str, name: &'a str) -> Result<&'a str> {
    if name.is_empty() {
        return Err(Error::InvalidParameter(format!("{what} must not be empty")));
    }
    if !is_identifier(name) {
        return Err(Error::InvalidParameter(format!(
            "{what} {name:?} must match [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    Ok(name)
}

/// Validates a verb and normalizes it to uppercase.
fn normalize_verb(verb: &str) -> Result<String> {
    validate_name("verb", verb).map(str::to_uppercase)
}

/// Builds the `actor.{label}_id = $p` filter, binding the external id.
fn actor_filter(label: &str, external_id: &str, params: &mut Parameters) -> Result<Clause> {
    if external_id.is_empty() {
        return Err(Error::InvalidParameter("id must not be empty".to_string()));
    }
    Ok(Clause::Filter {
        target: ACTOR.to_string(),
        property: format!("{label}_id"),
        value: params.bind(external_id),
    })
}

fn match_node(var: &str, label: &str) -> Clause {
    Clause::MatchNode {
        var: var.to_string(),
        label: label.to_string(),
    }
}

fn match_edge(edge_type: Option<String>) -> Clause {
    Clause::MatchEdge {
        from: ACTOR.to_string(),
        var: VERB.to_string(),
        edge_type,
        to: OBJECT.to_string(),
    }
}

fn project(variables: &[&str]) -> Clause {
    Clause::Project {
        variables: variables.iter().map(|v| (*v).to_string()).collect(),
    }
}
