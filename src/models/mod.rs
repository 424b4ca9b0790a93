//! Data models for activity-graph.
//!
//! Raw graph values decoded from the store live in [`graph`]; the shaped
//! per-operation results live in [`activity`].

pub mod activity;
pub mod graph;

pub use activity::{Activity, ActivityGroup, ActorRelationships, node_from_row};
pub use graph::{Edge, GraphValue, Node, Row};
