//! Neo4j client over the HTTP transactional endpoint.
//!
//! Each query is sent as a single auto-commit statement to
//! `{url}/db/{database}/tx/commit` with `resultDataContents` set to
//! `["row", "graph"]`. Rows are decoded by walking each `row` value alongside
//! its `meta` entry; node and relationship entries are resolved through the
//! per-row `graph` section, which carries labels, types and endpoints that the
//! plain row format drops.
//!
//! The underlying `reqwest` blocking client keeps its own connection pool and
//! is safe to share across threads. Wrap the client in a
//! [`BulkheadGraphClient`](super::BulkheadGraphClient) to bound in-flight calls.
//!
//! # Wire format
//!
//! ```text
//! POST /db/neo4j/tx/commit
//! {"statements":[{"statement":"MATCH ...","parameters":{"p0":"1"},
//!                 "resultDataContents":["row","graph"]}]}
//!
//! 200 OK
//! {"results":[{"columns":["actor"],"data":[{"row":[{...}],"meta":[{"id":17,"type":"node"}],
//!              "graph":{"nodes":[{"id":"17","labels":["user"],"properties":{...}}],
//!                       "relationships":[]}}]}],
//!  "errors":[]}
//! ```

use super::traits::{GraphClient, GraphError};
use crate::config::GraphStoreConfig;
use crate::models::{Edge, GraphValue, Node, Row};
use crate::query::{Query, RenderedQuery};
use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Neo4j HTTP client.
pub struct Neo4jHttpClient {
    /// Root URL, e.g. `http://localhost:7474`.
    base_url: String,
    /// Transactional commit endpoint.
    endpoint: String,
    username: Option<String>,
    password: Option<SecretString>,
    timeout_ms: u64,
    client: Client,
}

impl Neo4jHttpClient {
    /// Creates a client from store configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GraphStoreConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        if config.connect_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        }
        let client = builder.build().map_err(|e| Error::OperationFailed {
            operation: "build_graph_http_client".to_string(),
            cause: e.to_string(),
        })?;

        let base_url = config.url.trim_end_matches('/').to_string();
        Ok(Self {
            endpoint: format!("{base_url}/db/{}/tx/commit", config.database),
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_ms: config.timeout_ms,
            client,
        })
    }

    /// Returns the commit endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => request,
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> GraphError {
        if err.is_timeout() {
            GraphError::Timeout(format!("no response within {}ms", self.timeout_ms))
        } else {
            GraphError::Connection(err.to_string())
        }
    }
}

impl GraphClient for Neo4jHttpClient {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    fn execute(
        &self,
        _query: &Query,
        rendered: &RenderedQuery,
    ) -> std::result::Result<Vec<Row>, GraphError> {
        let request = TxRequest {
            statements: [TxStatement {
                statement: &rendered.text,
                parameters: rendered.parameters.to_json(),
                result_data_contents: ["row", "graph"],
            }],
        };

        let response = self
            .authorize(self.client.post(&self.endpoint))
            .header("Accept", "application/json;charset=UTF-8")
            .json(&request)
            .send()
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GraphError::Connection(format!(
                "graph store refused credentials ({status})"
            )));
        }
        if status.is_server_error() {
            return Err(GraphError::Connection(format!(
                "graph store returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GraphError::Query {
                code: status.as_str().to_string(),
                message: body,
            });
        }

        let body: TxResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                self.transport_error(&e)
            } else {
                GraphError::Decode(e.to_string())
            }
        })?;
        decode_response(body)
    }

    fn ping(&self) -> std::result::Result<(), GraphError> {
        let response = self
            .authorize(self.client.get(format!("{}/", self.base_url)))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| self.transport_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GraphError::Connection(format!(
                "graph store returned {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: [TxStatement<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: Value,
    result_data_contents: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
pub(crate) struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxData>,
}

#[derive(Debug, Deserialize)]
struct TxData {
    row: Vec<Value>,
    #[serde(default)]
    meta: Vec<Value>,
    #[serde(default)]
    graph: TxGraph,
}

#[derive(Debug, Default, Deserialize)]
struct TxGraph {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    relationships: Vec<WireRelationship>,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    id: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelationship {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    start_node: String,
    end_node: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

// ============================================================================
// Decoding
// ============================================================================

/// Status code prefix Neo4j uses for errors that may succeed on retry,
/// e.g. `Neo.TransientError.General.DatabaseUnavailable`.
const TRANSIENT_ERROR_PREFIX: &str = "Neo.TransientError.";

/// Converts a transactional response into rows.
///
/// Transient store errors become [`GraphError::Connection`]; every other
/// reported error is a [`GraphError::Query`].
pub(crate) fn decode_response(body: TxResponse) -> std::result::Result<Vec<Row>, GraphError> {
    if let Some(err) = body.errors.into_iter().next() {
        if err.code.starts_with(TRANSIENT_ERROR_PREFIX) {
            return Err(GraphError::Connection(format!("{}: {}", err.code, err.message)));
        }
        return Err(GraphError::Query {
            code: err.code,
            message: err.message,
        });
    }

    let Some(result) = body.results.into_iter().next() else {
        return Ok(Vec::new());
    };

    result
        .data
        .into_iter()
        .map(|data| decode_row(&result.columns, data))
        .collect()
}

fn decode_row(columns: &[String], data: TxData) -> std::result::Result<Row, GraphError> {
    if data.row.len() != columns.len() {
        return Err(GraphError::Decode(format!(
            "row has {} values for {} columns",
            data.row.len(),
            columns.len()
        )));
    }

    let mut row = Row::new();
    for (index, (column, value)) in columns.iter().zip(data.row).enumerate() {
        let meta = data.meta.get(index).unwrap_or(&Value::Null);
        row.push(column.clone(), decode_value(value, meta, &data.graph)?);
    }
    Ok(row)
}

fn decode_value(
    value: Value,
    meta: &Value,
    graph: &TxGraph,
) -> std::result::Result<GraphValue, GraphError> {
    match (value, meta) {
        (Value::Null, _) => Ok(GraphValue::Null),
        (Value::Array(items), Value::Array(metas)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| decode_value(item, metas.get(i).unwrap_or(&Value::Null), graph))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(GraphValue::List),
        (Value::Array(items), _) => Ok(GraphValue::List(
            items.into_iter().map(GraphValue::Scalar).collect(),
        )),
        (value, Value::Object(meta)) => {
            let id = meta.get("id").and_then(wire_id).ok_or_else(|| {
                GraphError::Decode("entity meta without id".to_string())
            })?;
            match meta.get("type").and_then(Value::as_str) {
                Some("node") => resolve_node(&id, graph).map(GraphValue::Node),
                Some("relationship") => resolve_relationship(&id, graph).map(GraphValue::Edge),
                _ => Ok(GraphValue::Scalar(value)),
            }
        },
        (value, _) => Ok(GraphValue::Scalar(value)),
    }
}

fn resolve_node(id: &str, graph: &TxGraph) -> std::result::Result<Node, GraphError> {
    graph
        .nodes
        .iter()
        .find(|n| n.id == id)
        .map(|n| Node {
            id: n.id.clone(),
            labels: n.labels.clone(),
            properties: n.properties.clone(),
        })
        .ok_or_else(|| GraphError::Decode(format!("node {id} missing from graph section")))
}

fn resolve_relationship(id: &str, graph: &TxGraph) -> std::result::Result<Edge, GraphError> {
    graph
        .relationships
        .iter()
        .find(|r| r.id == id)
        .map(|r| Edge {
            id: r.id.clone(),
            edge_type: r.rel_type.clone(),
            start: r.start_node.clone(),
            end: r.end_node.clone(),
            properties: r.properties.clone(),
        })
        .ok_or_else(|| {
            GraphError::Decode(format!("relationship {id} missing from graph section"))
        })
}

/// Meta ids are numbers, graph ids are strings.
fn wire_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> TxResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let mut params = crate::query::Parameters::new();
        params.bind("1");
        let request = TxRequest {
            statements: [TxStatement {
                statement: "MATCH (actor:`user`)\nRETURN actor",
                parameters: params.to_json(),
                result_data_contents: ["row", "graph"],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["statements"][0]["parameters"]["p0"], "1");
        assert_eq!(
            json["statements"][0]["resultDataContents"],
            json!(["row", "graph"])
        );
    }

    #[test]
    fn test_decode_node_rows() {
        let body = parse(json!({
            "results": [{
                "columns": ["actor"],
                "data": [{
                    "row": [{"user_id": "1", "type": "user"}],
                    "meta": [{"id": 17, "type": "node", "deleted": false}],
                    "graph": {
                        "nodes": [{
                            "id": "17",
                            "labels": ["user"],
                            "properties": {"user_id": "1", "type": "user"}
                        }],
                        "relationships": []
                    }
                }]
            }],
            "errors": []
        }));

        let rows = decode_response(body).unwrap();
        assert_eq!(rows.len(), 1);
        let Some(GraphValue::Node(node)) = rows[0].get("actor") else {
            panic!("expected node");
        };
        assert_eq!(node.id, "17");
        assert_eq!(node.external_id().as_deref(), Some("1"));
    }

    #[test]
    fn test_decode_collected_relationships_and_count() {
        let body = parse(json!({
            "results": [{
                "columns": ["actor", "verbs", "objects", "count"],
                "data": [{
                    "row": [{"user_id": "1"}, [{"created": 1}], [{"photo_id": "10010"}], 1],
                    "meta": [
                        {"id": 17, "type": "node", "deleted": false},
                        [{"id": 50, "type": "relationship", "deleted": false}],
                        [{"id": 18, "type": "node", "deleted": false}],
                        null
                    ],
                    "graph": {
                        "nodes": [
                            {"id": "17", "labels": ["user"], "properties": {"user_id": "1"}},
                            {"id": "18", "labels": ["photo"], "properties": {"photo_id": "10010"}}
                        ],
                        "relationships": [
                            {
                                "id": "50",
                                "type": "FAVORITED",
                                "startNode": "17",
                                "endNode": "18",
                                "properties": {"created": 1}
                            }
                        ]
                    }
                }]
            }],
            "errors": []
        }));

        let rows = decode_response(body).unwrap();
        let row = &rows[0];
        let Some(GraphValue::List(verbs)) = row.get("verbs") else {
            panic!("expected list");
        };
        let GraphValue::Edge(edge) = &verbs[0] else {
            panic!("expected edge");
        };
        assert_eq!(edge.edge_type, "FAVORITED");
        assert_eq!((edge.start.as_str(), edge.end.as_str()), ("17", "18"));
        assert_eq!(row.get("count"), Some(&GraphValue::Scalar(json!(1))));
    }

    #[test]
    fn test_decode_store_error() {
        let body = parse(json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input"
            }]
        }));
        let err = decode_response(body).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Query { ref code, .. } if code == "Neo.ClientError.Statement.SyntaxError"
        ));
    }

    #[test]
    fn test_decode_transient_error_is_connection() {
        let body = parse(json!({
            "results": [],
            "errors": [{
                "code": "Neo.TransientError.General.DatabaseUnavailable",
                "message": "database is not available"
            }]
        }));
        let err = decode_response(body).unwrap_err();
        assert!(matches!(err, GraphError::Connection(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_decode_empty_result() {
        let body = parse(json!({"results": [{"columns": ["actor"], "data": []}], "errors": []}));
        assert!(decode_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_decode_missing_graph_entity() {
        let body = parse(json!({
            "results": [{
                "columns": ["actor"],
                "data": [{
                    "row": [{}],
                    "meta": [{"id": 99, "type": "node"}],
                    "graph": {"nodes": [], "relationships": []}
                }]
            }],
            "errors": []
        }));
        assert!(matches!(
            decode_response(body),
            Err(GraphError::Decode(_))
        ));
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = GraphStoreConfig {
            url: "http://localhost:7474/".to_string(),
            database: "activity".to_string(),
            ..GraphStoreConfig::default()
        };
        let client = Neo4jHttpClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:7474/db/activity/tx/commit");
    }
}
