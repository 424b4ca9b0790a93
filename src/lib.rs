//! # activity-graph
//!
//! An activity-stream access layer over a labelled-property graph database.
//!
//! An *actor* performs a *verb* on an *object*; each activity is a directed,
//! typed edge in the graph. This crate turns the five read patterns an HTTP
//! layer needs into typed query ASTs, renders them into Cypher with every
//! value bound as a parameter, executes them through a [`GraphClient`] and
//! shapes the rows into result types.
//!
//! ## Features
//!
//! - Identifier allow-list for labels and edge types (structural tokens cannot
//!   be parameter-bound in Cypher)
//! - Deterministic rendering with a named parameter table
//! - Neo4j HTTP client with timeouts and a bounded permit pool
//! - In-memory client that evaluates the AST directly, for tests and local runs
//! - Dry-run mode that renders and logs without touching the store
//!
//! ## Example
//!
//! ```rust,ignore
//! use activity_graph::{ActivityService, ServiceOptions};
//! use activity_graph::storage::InMemoryGraphClient;
//!
//! let store = InMemoryGraphClient::new();
//! let user = store.add_node("user", "1")?;
//! let photo = store.add_node("photo", "10010")?;
//! store.add_edge(&user, "favorited", &photo)?;
//!
//! let service = ActivityService::new(store, ServiceOptions::default());
//! let summary = service.list_relationships("user", "1", "FAVORITED")?;
//! assert_eq!(summary[0].count, 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use serde::Serialize;
use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod query;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{ActivityGraphConfig, GraphStoreConfig, ServiceSettings};
pub use models::{Activity, ActivityGroup, ActorRelationships, Edge, GraphValue, Node, Row};
pub use query::{Query, RenderedQuery, render};
pub use services::{ActivityRequest, ActivityResponse, ActivityService, ServiceOptions};
pub use storage::{GraphClient, GraphError, InMemoryGraphClient, Neo4jHttpClient};

/// Error type for activity-graph operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Retryable |
/// |---------|-------------|-----------|
/// | `InvalidParameter` | Empty label, label or verb outside the identifier grammar, empty id | no |
/// | `UnsafeIdentifier` | The renderer meets a structural token outside the grammar | no |
/// | `UpstreamUnavailable` | Store unreachable, request or permit wait timed out | yes |
/// | `QueryRejected` | Store rejected a validated query, or returned an unexpected shape | no |
/// | `OperationFailed` | Config file or observability setup failed | no |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed or missing caller input.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A structural token (label, edge type, variable, property) failed the
    /// identifier allow-list at render time.
    #[error("unsafe identifier: {token:?}")]
    UnsafeIdentifier {
        /// The rejected token.
        token: String,
    },

    /// The graph store could not be reached in time.
    #[error("graph store unavailable during '{operation}': {cause}")]
    UpstreamUnavailable {
        /// The service operation that was running.
        operation: String,
        /// Sanitized cause.
        cause: String,
    },

    /// The graph store rejected a query that passed validation.
    #[error("query rejected during '{operation}': {cause}")]
    QueryRejected {
        /// The service operation that was running.
        operation: String,
        /// Sanitized cause.
        cause: String,
    },

    /// A local operation (configuration, telemetry) failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for activity-graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification exposed at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller error; do not retry.
    InvalidParameter,
    /// Store unreachable or slow; retry with backoff.
    UpstreamUnavailable,
    /// Internal defect surfaced by the store; do not retry.
    QueryRejected,
    /// Local failure unrelated to the request.
    Internal,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::QueryRejected => "query_rejected",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    /// Returns the boundary classification of this error.
    ///
    /// `UnsafeIdentifier` is reported as `InvalidParameter`.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) | Self::UnsafeIdentifier { .. } => {
                ErrorKind::InvalidParameter
            },
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::QueryRejected { .. } => ErrorKind::QueryRejected,
            Self::OperationFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Structured error object handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message, free of store-specific text.
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
