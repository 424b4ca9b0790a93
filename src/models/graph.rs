//! Graph value types returned by a [`GraphClient`](crate::storage::GraphClient).
//!
//! A store answers with rows; each row maps column names to [`GraphValue`]s,
//! which are either nodes, edges, scalars, or lists of those.
//!
//! Actors and objects share the [`Node`] shape. A node is an *actor* when it is
//! the source of a traversed edge and an *object* when it is the destination.
//!
//! # Property conventions
//!
//! | Property | Meaning |
//! |----------|---------|
//! | `{label}_id` | Id of the record in the originating application |
//! | `{label}_api` | URL back to the originating application |
//! | `created` | Creation timestamp (ms) |
//! | `updated` | Last update timestamp (ms), optional |
//! | `type` | Mirror of the node label |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node in the activity graph (actor or object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Store-assigned id. Opaque; never used as a foreign key by callers.
    pub id: String,
    /// Node labels. The first label is the node type.
    pub labels: Vec<String>,
    /// Node properties.
    #[serde(rename = "data")]
    pub properties: Map<String, Value>,
}

impl Node {
    /// Creates a node with a single label and no properties.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: vec![label.into()],
            properties: Map::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the node type (first label).
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Returns true if the node carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Returns a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the id from the originating application (`{label}_id`).
    ///
    /// Numeric ids are rendered as strings.
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        let label = self.label()?;
        match self.property(&format!("{label}_id"))? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Returns the URL back to the originating application (`{label}_api`).
    #[must_use]
    pub fn external_api(&self) -> Option<&str> {
        let label = self.label()?;
        self.property(&format!("{label}_api"))?.as_str()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<u64> {
        self.property("created").and_then(Value::as_u64)
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> Option<u64> {
        self.property("updated").and_then(Value::as_u64)
    }
}

/// A directed, typed activity edge (verb).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Store-assigned id.
    pub id: String,
    /// Verb name, uppercase.
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Id of the source node.
    pub start: String,
    /// Id of the destination node.
    pub end: String,
    /// Edge properties.
    #[serde(rename = "data")]
    pub properties: Map<String, Value>,
}

impl Edge {
    /// Creates an edge. The type is uppercase-normalized.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        edge_type: &str,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            edge_type: edge_type.to_uppercase(),
            start: start.into(),
            end: end.into(),
            properties: Map::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<u64> {
        self.properties.get("created").and_then(Value::as_u64)
    }
}

/// A single value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphValue {
    /// A node.
    Node(Node),
    /// An edge.
    Edge(Edge),
    /// A list of values (e.g. the output of `collect`).
    List(Vec<GraphValue>),
    /// A scalar (string, number, boolean, map).
    Scalar(Value),
    /// SQL-style null.
    Null,
}

impl GraphValue {
    /// Short name of the variant, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Node(_) => "node",
            Self::Edge(_) => "edge",
            Self::List(_) => "list",
            Self::Scalar(_) => "scalar",
            Self::Null => "null",
        }
    }
}

/// A decoded result row: ordered column names and their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, GraphValue)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn push(&mut self, column: impl Into<String>, value: GraphValue) {
        self.columns.push((column.into(), value));
    }

    /// Appends a column, builder style.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: GraphValue) -> Self {
        self.push(column, value);
        self
    }

    /// Returns a column value by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Removes and returns a column value by name.
    pub fn take(&mut self, column: &str) -> Option<GraphValue> {
        let index = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(index).1)
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
