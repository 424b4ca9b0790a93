//! Query AST for graph pattern-match queries.
//!
//! A [`Query`] is an ordered list of [`Clause`]s plus the [`Parameters`] its
//! filters refer to. Values never appear in clauses: a [`Clause::Filter`]
//! carries a [`ParamRef`] into the parameter table.
//!
//! Queries are immutable once built; [`crate::query::render`] is a pure
//! function of a query.
//!
//! ```text
//! MatchNode(actor:user) -> MatchEdge(actor-[verb:FAVORITED]->object)
//!   -> Filter(actor.user_id = $p0) -> Aggregate(...) -> Project(...)
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name of a bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamRef(String);

impl ParamRef {
    /// Returns the parameter name (without the `$` sigil).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Named parameter table.
///
/// Names are assigned sequentially (`p0`, `p1`, ...) so the same build
/// sequence always yields the same table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, Value>,
}

impl Parameters {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Binds a value and returns its reference.
    pub fn bind(&mut self, value: impl Into<Value>) -> ParamRef {
        let name = format!("p{}", self.values.len());
        self.values.insert(name.clone(), value.into());
        ParamRef(name)
    }

    /// Looks up a bound value.
    #[must_use]
    pub fn get(&self, param: &ParamRef) -> Option<&Value> {
        self.values.get(param.as_str())
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of bound values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the table into a JSON object for the wire.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// A grouping key of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// Group by a bound variable (node identity).
    Var(String),
    /// Group by the type of an edge variable, exposed as `alias`.
    EdgeType {
        /// Edge variable.
        var: String,
        /// Output column name.
        alias: String,
    },
}

impl GroupKey {
    /// Returns the output column produced by this key.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Var(var) => var,
            Self::EdgeType { alias, .. } => alias,
        }
    }
}

/// `collect(var) AS alias` or `count(var) AS alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateItem {
    /// Input variable.
    pub var: String,
    /// Output column name.
    pub alias: String,
}

impl AggregateItem {
    /// Creates an aggregate item.
    #[must_use]
    pub fn new(var: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            alias: alias.into(),
        }
    }
}

/// One clause of a pattern-match query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Match nodes carrying `label`, bound to `var`.
    MatchNode {
        /// Variable name.
        var: String,
        /// Node label.
        label: String,
    },
    /// Match a directed edge `from -[var:edge_type]-> to`.
    MatchEdge {
        /// Source node variable.
        from: String,
        /// Edge variable.
        var: String,
        /// Edge type filter; `None` matches any type.
        edge_type: Option<String>,
        /// Destination node variable.
        to: String,
    },
    /// Keep bindings where `target.property` equals a bound parameter.
    Filter {
        /// Node variable.
        target: String,
        /// Property key.
        property: String,
        /// Bound value.
        value: ParamRef,
    },
    /// Group bindings and aggregate.
    Aggregate {
        /// Grouping keys, in output order.
        group: Vec<GroupKey>,
        /// `collect` items.
        collect: Vec<AggregateItem>,
        /// Optional `count` item.
        count: Option<AggregateItem>,
    },
    /// Columns returned to the caller.
    Project {
        /// Variables or aliases, in output order.
        variables: Vec<String>,
    },
}

/// An immutable graph query: clauses plus the parameters they reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
    parameters: Parameters,
}

impl Query {
    /// Creates a query.
    #[must_use]
    pub const fn new(clauses: Vec<Clause>, parameters: Parameters) -> Self {
        Self {
            clauses,
            parameters,
        }
    }

    /// Returns the clauses in order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns the parameter table.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the projected column names, if the query has a projection.
    #[must_use]
    pub fn projection(&self) -> Option<&[String]> {
        self.clauses.iter().rev().find_map(|clause| match clause {
            Clause::Project { variables } => Some(variables.as_slice()),
            _ => None,
        })
    }
}
