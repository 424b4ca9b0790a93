//! Graph store access.
//!
//! This module provides the client side of the graph store:
//! - **Traits**: [`GraphClient`] and its [`GraphError`] failure modes
//! - **Neo4j**: HTTP transactional endpoint client
//! - **Memory**: in-process AST evaluator for tests and local runs
//! - **Bulkhead**: bounded permit pool wrapping any client

// Allow significant_drop_tightening - permits and lock guards live for the call.
#![allow(clippy::significant_drop_tightening)]
// Allow cast precision loss for gauge values.
#![allow(clippy::cast_precision_loss)]

pub mod bulkhead;
pub mod memory;
pub mod neo4j;
pub mod traits;

pub use bulkhead::{BulkheadGraphClient, GraphBulkheadConfig};
pub use memory::InMemoryGraphClient;
pub use neo4j::Neo4jHttpClient;
pub use traits::{GraphClient, GraphError};
