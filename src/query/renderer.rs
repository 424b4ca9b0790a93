//! Cypher renderer for the query AST.
//!
//! [`render`] walks a [`Query`] and emits Cypher text plus the parameter table.
//! Rendering is pure and deterministic: the same query always yields the same
//! text and parameters, so rendered text may be cached by query shape.
//!
//! Every structural token is re-checked against the identifier grammar here,
//! independently of the builder, because a [`Query`] can also be assembled by
//! hand. Labels, edge types and property keys are backtick-quoted.
//!
//! Clauses are emitted in canonical order regardless of their position in the
//! AST:
//!
//! ```text
//! MATCH (actor:`user`)-[verb:`FAVORITED`]->(object)
//! WHERE actor.`user_id` = $p0
//! WITH actor, collect(verb) AS verbs, collect(object) AS objects, count(object) AS count
//! RETURN actor, verbs, objects, count
//! ```

use super::ast::{AggregateItem, Clause, GroupKey, Parameters, Query};
use super::identifier::{is_identifier, quote};
use crate::{Error, Result};
use std::collections::HashSet;

/// Cypher text and the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// Query text with `$name` placeholders.
    pub text: String,
    /// Values for the placeholders.
    pub parameters: Parameters,
}

/// Renders a query into Cypher.
///
/// # Errors
///
/// Returns [`Error::UnsafeIdentifier`] if any structural token fails the
/// identifier grammar, and [`Error::InvalidParameter`] if the query has no
/// match pattern, no projection, or a filter refers to an unbound parameter.
pub fn render(query: &Query) -> Result<RenderedQuery> {
    let mut node_labels: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut edges = Vec::new();
    let mut filters = Vec::new();
    let mut aggregate = None;
    let mut projection = None;

    for clause in query.clauses() {
        match clause {
            Clause::MatchNode { var, label } => {
                checked(var)?;
                checked(label)?;
                match node_labels.iter_mut().find(|(v, _)| *v == var.as_str()) {
                    Some((_, labels)) => labels.push(label.as_str()),
                    None => node_labels.push((var.as_str(), vec![label.as_str()])),
                }
            },
            Clause::MatchEdge {
                from,
                var,
                edge_type,
                to,
            } => {
                checked(from)?;
                checked(var)?;
                checked(to)?;
                if let Some(edge_type) = edge_type {
                    checked(edge_type)?;
                }
                edges.push((from.as_str(), var.as_str(), edge_type.as_deref(), to.as_str()));
            },
            Clause::Filter {
                target,
                property,
                value,
            } => {
                checked(target)?;
                checked(property)?;
                checked(value.as_str())?;
                if query.parameters().get(value).is_none() {
                    return Err(Error::InvalidParameter(format!(
                        "filter on {target}.{property} refers to unbound parameter {value}"
                    )));
                }
                filters.push(format!("{target}.{} = {value}", quote(property)));
            },
            Clause::Aggregate {
                group,
                collect,
                count,
            } => aggregate = Some(render_aggregate(group, collect, count.as_ref())?),
            Clause::Project { variables } => {
                for var in variables {
                    checked(var)?;
                }
                projection = Some(variables.join(", "));
            },
        }
    }

    let Some(projection) = projection else {
        return Err(Error::InvalidParameter(
            "query has no projection".to_string(),
        ));
    };

    let patterns = render_patterns(&node_labels, &edges);
    if patterns.is_empty() {
        return Err(Error::InvalidParameter(
            "query has no match pattern".to_string(),
        ));
    }

    let mut lines = vec![format!("MATCH {}", patterns.join(", "))];
    if !filters.is_empty() {
        lines.push(format!("WHERE {}", filters.join(" AND ")));
    }
    if let Some(aggregate) = aggregate {
        lines.push(format!("WITH {aggregate}"));
    }
    lines.push(format!("RETURN {projection}"));

    Ok(RenderedQuery {
        text: lines.join("\n"),
        parameters: query.parameters().clone(),
    })
}

/// Builds the comma-separated MATCH patterns.
///
/// A node's labels are attached where the node first appears.
fn render_patterns<'q>(
    node_labels: &[(&'q str, Vec<&'q str>)],
    edges: &[(&'q str, &'q str, Option<&'q str>, &'q str)],
) -> Vec<String> {
    let mut emitted: HashSet<&'q str> = HashSet::new();
    let mut patterns = Vec::new();

    for &(from, var, edge_type, to) in edges {
        let source = node_pattern(from, node_labels, &mut emitted);
        let target = node_pattern(to, node_labels, &mut emitted);
        let rel = edge_type.map_or_else(
            || format!("[{var}]"),
            |edge_type| format!("[{var}:{}]", quote(edge_type)),
        );
        patterns.push(format!("{source}-{rel}->{target}"));
    }
    for &(var, _) in node_labels {
        if !emitted.contains(var) {
            patterns.push(node_pattern(var, node_labels, &mut emitted));
        }
    }
    patterns
}

/// Renders `(var:Label)` the first time `var` is seen, `(var)` afterwards.
fn node_pattern<'q>(
    var: &'q str,
    node_labels: &[(&'q str, Vec<&'q str>)],
    emitted: &mut HashSet<&'q str>,
) -> String {
    if !emitted.insert(var) {
        return format!("({var})");
    }
    let labels: String = node_labels
        .iter()
        .find(|(v, _)| *v == var)
        .map(|(_, labels)| labels.iter().map(|l| format!(":{}", quote(l))).collect())
        .unwrap_or_default();
    format!("({var}{labels})")
}

fn render_aggregate(
    group: &[GroupKey],
    collect: &[AggregateItem],
    count: Option<&AggregateItem>,
) -> Result<String> {
    let mut items = Vec::new();
    for key in group {
        match key {
            GroupKey::Var(var) => items.push(checked(var)?.to_string()),
            GroupKey::EdgeType { var, alias } => {
                items.push(format!("type({}) AS {}", checked(var)?, checked(alias)?));
            },
        }
    }
    for item in collect {
        items.push(format!(
            "collect({}) AS {}",
            checked(&item.var)?,
            checked(&item.alias)?
        ));
    }
    if let Some(item) = count {
        items.push(format!(
            "count({}) AS {}",
            checked(&item.var)?,
            checked(&item.alias)?
        ));
    }
    Ok(items.join(", "))
}

fn checked(token: &str) -> Result<&str> {
    if is_identifier(token) {
        Ok(token)
    } else {
        Err(Error::UnsafeIdentifier {
            token: token.to_string(),
        })
    }
}
