//! Graph client trait.
//!
//! A graph client executes one rendered query and returns decoded rows.
//!
//! # Available Implementations
//!
//! | Client | Use Case |
//! |--------|----------|
//! | `Neo4jHttpClient` | Default; Neo4j HTTP transactional endpoint |
//! | `InMemoryGraphClient` | Testing and local runs; evaluates the AST directly |
//! | `BulkheadGraphClient` | Wrapper bounding concurrent calls to another client |
//!
//! # Error Modes
//!
//! | Variant | Raised When |
//! |---------|-------------|
//! | `Connection` | Store unreachable, TLS or auth failure |
//! | `Query` | Store rejected the statement (syntax, constraint) |
//! | `Timeout` | Response or permit wait exceeded its deadline |
//! | `Decode` | Response did not match the expected wire format |

use crate::models::Row;
use crate::query::{Query, RenderedQuery};
use thiserror::Error;

/// Errors raised by a [`GraphClient`].
#[derive(Debug, Error)]
pub enum GraphError {
    /// The store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the statement.
    #[error("query error {code}: {message}")]
    Query {
        /// Store status code, e.g. `Neo.ClientError.Statement.SyntaxError`.
        code: String,
        /// Store message.
        message: String,
    },

    /// A deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl GraphError {
    /// Returns true for failures a caller may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Trait for graph store clients.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn GraphClient>`
/// - Remote stores execute `rendered`; in-process stores may evaluate `query`
///   directly. Both always describe the same statement.
/// - Connections must be released on every path, including errors
pub trait GraphClient: Send + Sync {
    /// The client name, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Executes a query and returns its rows.
    ///
    /// An empty vector is a successful result.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] describing the failure mode.
    fn execute(&self, query: &Query, rendered: &RenderedQuery) -> Result<Vec<Row>, GraphError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] if the store cannot be reached.
    fn ping(&self) -> Result<(), GraphError> {
        Ok(())
    }
}

impl<C: GraphClient + ?Sized> GraphClient for std::sync::Arc<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, query: &Query, rendered: &RenderedQuery) -> Result<Vec<Row>, GraphError> {
        (**self).execute(query, rendered)
    }

    fn ping(&self) -> Result<(), GraphError> {
        (**self).ping()
    }
}

impl<C: GraphClient + ?Sized> GraphClient for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, query: &Query, rendered: &RenderedQuery) -> Result<Vec<Row>, GraphError> {
        (**self).execute(query, rendered)
    }

    fn ping(&self) -> Result<(), GraphError> {
        (**self).ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(GraphError::Connection("refused".to_string()).is_transient());
        assert!(GraphError::Timeout("30000ms".to_string()).is_transient());
        assert!(
            !GraphError::Query {
                code: "Neo.ClientError.Statement.SyntaxError".to_string(),
                message: "bad".to_string(),
            }
            .is_transient()
        );
        assert!(!GraphError::Decode("eof".to_string()).is_transient());
    }
}
