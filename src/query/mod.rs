//! Typed graph queries.
//!
//! Path segments never reach query text directly. Builders validate them and
//! produce a [`Query`] AST; the renderer turns that into Cypher with every value
//! bound as a parameter.
//!
//! ```rust
//! use activity_graph::query::{builder, render};
//!
//! let query = builder::get_by_id("user", "1").unwrap();
//! let rendered = render(&query).unwrap();
//! assert!(rendered.text.contains("$p0"));
//! assert!(!rendered.text.contains("\"1\""));
//! ```

pub mod ast;
pub mod builder;
mod identifier;
mod renderer;

pub use ast::{AggregateItem, Clause, GroupKey, ParamRef, Parameters, Query};
pub use identifier::is_identifier;
pub use renderer::{RenderedQuery, render};
