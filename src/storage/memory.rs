//! In-memory graph client.
//!
//! Evaluates the query AST directly against an in-process graph instead of
//! parsing Cypher. Used by tests and for local runs without a store.
//!
//! Semantics follow Cypher for the clauses the builders emit: MATCH expands
//! bindings, WHERE filters them, WITH groups them (first-seen group order,
//! `collect` keeps duplicates, `count` counts bindings), RETURN picks columns.

// Allow excessive_nesting for binding expansion closures.
#![allow(clippy::excessive_nesting)]

use super::traits::{GraphClient, GraphError};
use crate::models::{Edge, GraphValue, Node, Row};
use crate::query::{AggregateItem, Clause, GroupKey, Parameters, Query, RenderedQuery};
use crate::{Error, Result, current_timestamp_ms};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory graph client for testing.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
///
/// # Example
///
/// ```rust
/// use activity_graph::storage::InMemoryGraphClient;
///
/// let store = InMemoryGraphClient::new();
/// let user = store.add_node("user", "1").unwrap();
/// let photo = store.add_node("photo", "10010").unwrap();
/// store.add_edge(&user, "favorited", &photo).unwrap();
/// assert_eq!(store.edge_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphClient {
    graph: RwLock<GraphData>,
    calls: AtomicUsize,
}

#[derive(Debug, Default)]
struct GraphData {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_id: u64,
}

impl GraphData {
    fn allocate_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

impl InMemoryGraphClient {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node following the activity-stream property conventions.
    ///
    /// Sets `{label}_id`, `type` and `created`. Returns the store id.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn add_node(&self, label: &str, external_id: &str) -> Result<String> {
        let node = Node::new(String::new(), label)
            .with_property(format!("{label}_id"), external_id)
            .with_property("type", label)
            .with_property("created", current_timestamp_ms());
        self.insert_node(node)
    }

    /// Inserts a node, assigning it a fresh store id.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph lock is poisoned.
    pub fn insert_node(&self, mut node: Node) -> Result<String> {
        let mut graph = self.write()?;
        node.id = graph.allocate_id();
        let id = node.id.clone();
        graph.nodes.push(node);
        Ok(id)
    }

    /// Adds a directed edge between two existing nodes.
    ///
    /// The verb is uppercase-normalized. Repeated activities create distinct
    /// edges. Returns the store id of the edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if either node does not exist.
    pub fn add_edge(&self, start: &str, verb: &str, end: &str) -> Result<String> {
        let mut graph = self.write()?;
        for id in [start, end] {
            if graph.node_index(id).is_none() {
                return Err(Error::InvalidParameter(format!("unknown node id {id}")));
            }
        }
        let id = graph.allocate_id();
        graph.edges.push(
            Edge::new(id.clone(), verb, start, end)
                .with_property("created", current_timestamp_ms()),
        );
        Ok(id)
    }

    /// Returns the number of nodes stored.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.read().map(|g| g.nodes.len()).unwrap_or(0)
    }

    /// Returns the number of edges stored.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.read().map(|g| g.edges.len()).unwrap_or(0)
    }

    /// Returns how many queries have been executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, GraphData>> {
        self.graph.write().map_err(|e| Error::OperationFailed {
            operation: "memory_graph_write".to_string(),
            cause: e.to_string(),
        })
    }
}

impl GraphClient for InMemoryGraphClient {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn execute(
        &self,
        query: &Query,
        _rendered: &RenderedQuery,
    ) -> std::result::Result<Vec<Row>, GraphError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Poisoning is permanent; not a transient store failure.
        let graph = self.graph.read().map_err(|e| GraphError::Query {
            code: "Memory.LockPoisoned".to_string(),
            message: e.to_string(),
        })?;
        Evaluator {
            graph: &graph,
            params: query.parameters(),
        }
        .run(query)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Node(usize),
    Edge(usize),
}

type Binding = HashMap<String, Bound>;

/// A grouped row: output columns produced by WITH.
type Columns = Vec<(String, GraphValue)>;

struct Evaluator<'g> {
    graph: &'g GraphData,
    params: &'g Parameters,
}

impl Evaluator<'_> {
    fn run(&self, query: &Query) -> std::result::Result<Vec<Row>, GraphError> {
        let mut bindings: Vec<Binding> = vec![Binding::new()];
        let mut grouped: Option<Vec<Columns>> = None;

        for clause in query.clauses() {
            match clause {
                Clause::MatchNode { var, label } => {
                    bindings = bindings
                        .into_iter()
                        .flat_map(|b| self.match_node(b, var, label))
                        .collect();
                },
                Clause::MatchEdge {
                    from,
                    var,
                    edge_type,
                    to,
                } => {
                    bindings = bindings
                        .into_iter()
                        .flat_map(|b| self.match_edge(&b, from, var, edge_type.as_deref(), to))
                        .collect();
                },
                Clause::Filter {
                    target,
                    property,
                    value,
                } => {
                    let expected = self.params.get(value).ok_or_else(|| GraphError::Query {
                        code: "Memory.UnboundParameter".to_string(),
                        message: format!("parameter {value} is not bound"),
                    })?;
                    bindings.retain(|b| self.property_equals(b, target, property, expected));
                },
                Clause::Aggregate {
                    group,
                    collect,
                    count,
                } => grouped = Some(self.aggregate(&bindings, group, collect, count.as_ref())?),
                Clause::Project { variables } => {
                    return match &grouped {
                        Some(groups) => groups
                            .iter()
                            .map(|columns| project_columns(columns, variables))
                            .collect(),
                        None => bindings
                            .iter()
                            .map(|b| self.project_binding(b, variables))
                            .collect(),
                    };
                },
            }
        }

        Err(GraphError::Query {
            code: "Memory.NoProjection".to_string(),
            message: "query has no projection".to_string(),
        })
    }

    fn match_node(&self, binding: Binding, var: &str, label: &str) -> Vec<Binding> {
        match binding.get(var).copied() {
            Some(Bound::Node(i)) if self.graph.nodes[i].has_label(label) => vec![binding],
            Some(_) => Vec::new(),
            None => self
                .graph
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.has_label(label))
                .map(|(i, _)| {
                    let mut next = binding.clone();
                    next.insert(var.to_string(), Bound::Node(i));
                    next
                })
                .collect(),
        }
    }

    fn match_edge(
        &self,
        binding: &Binding,
        from: &str,
        var: &str,
        edge_type: Option<&str>,
        to: &str,
    ) -> Vec<Binding> {
        let mut out = Vec::new();
        for (ei, edge) in self.graph.edges.iter().enumerate() {
            if edge_type.is_some_and(|t| t != edge.edge_type) {
                continue;
            }
            if binding.get(var).is_some_and(|b| *b != Bound::Edge(ei)) {
                continue;
            }
            let (Some(start), Some(end)) = (
                self.graph.node_index(&edge.start),
                self.graph.node_index(&edge.end),
            ) else {
                continue;
            };
            if !endpoint_matches(binding, from, start) || !endpoint_matches(binding, to, end) {
                continue;
            }
            let mut next = binding.clone();
            next.insert(from.to_string(), Bound::Node(start));
            next.insert(var.to_string(), Bound::Edge(ei));
            next.insert(to.to_string(), Bound::Node(end));
            out.push(next);
        }
        out
    }

    fn property_equals(
        &self,
        binding: &Binding,
        var: &str,
        property: &str,
        expected: &Value,
    ) -> bool {
        match binding.get(var) {
            Some(Bound::Node(i)) => self.graph.nodes[*i].property(property) == Some(expected),
            Some(Bound::Edge(i)) => {
                self.graph.edges[*i].properties.get(property) == Some(expected)
            },
            None => false,
        }
    }

    fn value_of(
        &self,
        binding: &Binding,
        var: &str,
    ) -> std::result::Result<GraphValue, GraphError> {
        match binding.get(var) {
            Some(Bound::Node(i)) => Ok(GraphValue::Node(self.graph.nodes[*i].clone())),
            Some(Bound::Edge(i)) => Ok(GraphValue::Edge(self.graph.edges[*i].clone())),
            None => Err(unknown_variable(var)),
        }
    }

    fn aggregate(
        &self,
        bindings: &[Binding],
        group: &[GroupKey],
        collect: &[AggregateItem],
        count: Option<&AggregateItem>,
    ) -> std::result::Result<Vec<Columns>, GraphError> {
        let mut groups: Vec<(Vec<GraphValue>, Vec<&Binding>)> = Vec::new();
        for binding in bindings {
            let key = group
                .iter()
                .map(|k| self.group_value(binding, k))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(binding),
                None => groups.push((key, vec![binding])),
            }
        }

        groups
            .into_iter()
            .map(|(key, members)| {
                let mut columns: Columns = group
                    .iter()
                    .map(|k| k.column().to_string())
                    .zip(key)
                    .collect();
                for item in collect {
                    let values = members
                        .iter()
                        .map(|b| self.value_of(b, &item.var))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    columns.push((item.alias.clone(), GraphValue::List(values)));
                }
                if let Some(item) = count {
                    let counted = members.iter().filter(|b| b.contains_key(&item.var)).count();
                    columns.push((item.alias.clone(), GraphValue::Scalar(Value::from(counted))));
                }
                Ok(columns)
            })
            .collect()
    }

    fn group_value(
        &self,
        binding: &Binding,
        key: &GroupKey,
    ) -> std::result::Result<GraphValue, GraphError> {
        match key {
            GroupKey::Var(var) => self.value_of(binding, var),
            GroupKey::EdgeType { var, .. } => match binding.get(var.as_str()) {
                Some(Bound::Edge(i)) => Ok(GraphValue::Scalar(Value::from(
                    self.graph.edges[*i].edge_type.clone(),
                ))),
                _ => Err(unknown_variable(var)),
            },
        }
    }

    fn project_binding(
        &self,
        binding: &Binding,
        variables: &[String],
    ) -> std::result::Result<Row, GraphError> {
        let mut row = Row::new();
        for var in variables {
            row.push(var.clone(), self.value_of(binding, var)?);
        }
        Ok(row)
    }
}

fn endpoint_matches(binding: &Binding, var: &str, node: usize) -> bool {
    binding
        .get(var)
        .is_none_or(|bound| *bound == Bound::Node(node))
}

fn project_columns(
    columns: &Columns,
    variables: &[String],
) -> std::result::Result<Row, GraphError> {
    let mut row = Row::new();
    for var in variables {
        let value = columns
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| unknown_variable(var))?;
        row.push(var.clone(), value);
    }
    Ok(row)
}

fn unknown_variable(var: &str) -> GraphError {
    GraphError::Query {
        code: "Memory.UnknownVariable".to_string(),
        message: format!("variable `{var}` not defined"),
    }
}
