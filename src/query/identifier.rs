//! Identifier grammar for structural query tokens.
//!
//! Labels, edge types, variable names, property keys and aliases cannot be
//! parameter-bound in Cypher, so they are restricted to
//! `[A-Za-z_][A-Za-z0-9_]*` before they are ever written into query text.
//!
//! # Security
//!
//! This is the only barrier between path segments and query structure. A label
//! such as `user) DETACH DELETE (n` is rejected here; values (external ids)
//! never pass through this module because they are always bound.

use once_cell::sync::Lazy;
use regex::Regex;

/// Allow-listed identifier grammar.
static IDENTIFIER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Returns true if `token` matches the identifier grammar.
///
/// # Examples
///
/// ```
/// use activity_graph::query::is_identifier;
///
/// assert!(is_identifier("mmdb_user"));
/// assert!(is_identifier("_private"));
/// assert!(!is_identifier("9lives"));
/// assert!(!is_identifier("user) DETACH DELETE (n"));
/// ```
#[must_use]
pub fn is_identifier(token: &str) -> bool {
    IDENTIFIER
        .as_ref()
        .is_some_and(|re| re.is_match(token))
}

/// Wraps an already-validated identifier in backticks.
///
/// Quoting lets reserved words such as `MATCH` be used as labels. Validated
/// identifiers cannot contain a backtick, so no escaping is needed.
pub(crate) fn quote(identifier: &str) -> String {
    format!("`{identifier}`")
}
