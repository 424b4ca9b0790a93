//! Shaped results of the activity access operations.
//!
//! Each type is built from one decoded [`Row`] and decouples callers from the
//! store's row layout. Column names match the projections emitted by
//! [`crate::query::builder`].

use super::graph::{Edge, GraphValue, Node, Row};
use crate::{Error, Result};
use serde::Serialize;

/// All objects an actor performed one verb on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorRelationships {
    /// The actor.
    pub actor: Node,
    /// Every matching edge, one per activity.
    pub verbs: Vec<Edge>,
    /// The destination of each edge, in edge order.
    pub objects: Vec<Node>,
    /// Number of objects.
    pub count: u64,
}

/// A single actor-verb-object triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    /// The actor.
    pub actor: Node,
    /// The edge.
    pub verb: Edge,
    /// The object.
    pub object: Node,
}

/// The objects an actor reached through one verb type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityGroup {
    /// The actor.
    pub actor: Node,
    /// The verb type shared by the group.
    pub activity: String,
    /// Destination nodes, one per edge.
    pub objects: Vec<Node>,
    /// Number of objects in the group.
    pub count: u64,
}

impl ActorRelationships {
    /// Shapes a row with columns `actor, verbs, objects, count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryRejected`] if a column is missing or mistyped.
    pub fn from_row(mut row: Row) -> Result<Self> {
        Ok(Self {
            actor: take_node(&mut row, "actor")?,
            verbs: take_list(&mut row, "verbs", expect_edge)?,
            objects: take_list(&mut row, "objects", expect_node)?,
            count: take_count(&mut row, "count")?,
        })
    }
}

impl Activity {
    /// Shapes a row with columns `actor, verb, object`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryRejected`] if a column is missing or mistyped.
    pub fn from_row(mut row: Row) -> Result<Self> {
        Ok(Self {
            actor: take_node(&mut row, "actor")?,
            verb: take_column(&mut row, "verb").and_then(|v| expect_edge("verb", v))?,
            object: take_node(&mut row, "object")?,
        })
    }
}

impl ActivityGroup {
    /// Shapes a row with columns `actor, activity, objects, count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryRejected`] if a column is missing or mistyped.
    pub fn from_row(mut row: Row) -> Result<Self> {
        let activity = match take_column(&mut row, "activity")? {
            GraphValue::Scalar(serde_json::Value::String(s)) => s,
            other => return Err(shape_error("activity", "string", &other)),
        };
        Ok(Self {
            actor: take_node(&mut row, "actor")?,
            activity,
            objects: take_list(&mut row, "objects", expect_node)?,
            count: take_count(&mut row, "count")?,
        })
    }
}

/// Shapes a row holding a single node column.
///
/// # Errors
///
/// Returns [`Error::QueryRejected`] if the column is missing or not a node.
pub fn node_from_row(mut row: Row, column: &str) -> Result<Node> {
    take_node(&mut row, column)
}

fn take_column(row: &mut Row, column: &str) -> Result<GraphValue> {
    row.take(column).ok_or_else(|| Error::QueryRejected {
        operation: "shape_row".to_string(),
        cause: format!("missing column '{column}'"),
    })
}

fn take_node(row: &mut Row, column: &str) -> Result<Node> {
    take_column(row, column).and_then(|v| expect_node(column, v))
}

fn take_list<T>(
    row: &mut Row,
    column: &str,
    expect: fn(&str, GraphValue) -> Result<T>,
) -> Result<Vec<T>> {
    match take_column(row, column)? {
        GraphValue::List(items) => items.into_iter().map(|v| expect(column, v)).collect(),
        GraphValue::Null => Ok(Vec::new()),
        other => Err(shape_error(column, "list", &other)),
    }
}

fn take_count(row: &mut Row, column: &str) -> Result<u64> {
    match take_column(row, column)? {
        GraphValue::Scalar(value) => value
            .as_u64()
            .ok_or_else(|| shape_error(column, "count", &GraphValue::Scalar(value))),
        other => Err(shape_error(column, "count", &other)),
    }
}

fn expect_node(column: &str, value: GraphValue) -> Result<Node> {
    match value {
        GraphValue::Node(node) => Ok(node),
        other => Err(shape_error(column, "node", &other)),
    }
}

fn expect_edge(column: &str, value: GraphValue) -> Result<Edge> {
    match value {
        GraphValue::Edge(edge) => Ok(edge),
        other => Err(shape_error(column, "edge", &other)),
    }
}

fn shape_error(column: &str, expected: &str, found: &GraphValue) -> Error {
    Error::QueryRejected {
        operation: "shape_row".to_string(),
        cause: format!(
            "column '{column}': expected {expected}, found {}",
            found.type_name()
        ),
    }
}
