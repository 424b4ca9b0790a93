//! Neo4j HTTP client tests against local sockets.
//!
//! A one-shot responder thread stands in for the store so the full request
//! path (serialization, status mapping, decoding, classification) runs
//! without a database.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use activity_graph::config::GraphStoreConfig;
use activity_graph::query::{builder, render};
use activity_graph::storage::{
    BulkheadGraphClient, GraphBulkheadConfig, GraphClient, GraphError, Neo4jHttpClient,
};
use activity_graph::{ActivityService, Error, ServiceOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn config_for(url: String) -> GraphStoreConfig {
    GraphStoreConfig {
        url,
        database: "activity".to_string(),
        username: Some("reader".to_string()),
        timeout_ms: 2_000,
        connect_timeout_ms: 500,
        ..GraphStoreConfig::default()
    }
}

/// Captured request line and body.
struct Captured {
    request_line: String,
    body: String,
}

/// Reads one HTTP request and replies with `status` and `body`.
fn serve_once(status: &'static str, body: String) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let captured = read_request(&stream);
        let mut stream = stream;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        let _ = tx.send(captured);
    });

    (url, rx)
}

fn read_request(stream: &TcpStream) -> Captured {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line == "\r\n" || line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap();
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    Captured {
        request_line: request_line.trim().to_string(),
        body: String::from_utf8(body).unwrap(),
    }
}

#[test]
fn test_executes_against_transaction_endpoint() {
    let response = serde_json::json!({
        "results": [{
            "columns": ["actor"],
            "data": [{
                "row": [{"user_id": "1", "type": "user"}],
                "meta": [{"id": 3, "type": "node", "deleted": false}],
                "graph": {
                    "nodes": [{
                        "id": "3",
                        "labels": ["user"],
                        "properties": {"user_id": "1", "type": "user"}
                    }],
                    "relationships": []
                }
            }]
        }],
        "errors": []
    });
    let (url, captured) = serve_once("200 OK", response.to_string());

    let client = Neo4jHttpClient::new(&config_for(url)).unwrap();
    let service = ActivityService::new(client, ServiceOptions::default());
    let nodes = service.get_by_id("user", "1").unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, "3");

    let captured = captured.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(captured.request_line, "POST /db/activity/tx/commit HTTP/1.1");
    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    let statement = &sent["statements"][0];
    assert_eq!(
        statement["statement"],
        "MATCH (actor:`user`)\nWHERE actor.`user_id` = $p0\nRETURN actor"
    );
    assert_eq!(statement["parameters"]["p0"], "1");
    assert_eq!(statement["resultDataContents"], serde_json::json!(["row", "graph"]));
}

#[test]
fn test_store_error_is_query_rejected() {
    let response = serde_json::json!({
        "results": [],
        "errors": [{
            "code": "Neo.ClientError.Statement.SyntaxError",
            "message": "Invalid input at 10.1.2.3"
        }]
    });
    let (url, _captured) = serve_once("200 OK", response.to_string());

    let service = ActivityService::new(
        Neo4jHttpClient::new(&config_for(url)).unwrap(),
        ServiceOptions::default(),
    );
    let err = service.list_by_type("user").unwrap_err();

    assert!(matches!(err, Error::QueryRejected { .. }));
    assert!(!err.to_string().contains("10.1.2.3"));
}

#[test]
fn test_transient_store_error_is_retryable() {
    let response = serde_json::json!({
        "results": [],
        "errors": [{
            "code": "Neo.TransientError.General.DatabaseUnavailable",
            "message": "Database 'activity' is unavailable."
        }]
    });
    let (url, _captured) = serve_once("200 OK", response.to_string());

    let service = ActivityService::new(
        Neo4jHttpClient::new(&config_for(url)).unwrap(),
        ServiceOptions::default(),
    );
    let err = service.list_by_type("user").unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { .. }), "got {err:?}");
    assert!(err.is_retryable());
    assert!(!err.to_string().contains("Database 'activity'"));
}

#[test]
fn test_unauthorized_is_connection_error() {
    let (url, _captured) = serve_once("401 Unauthorized", "{}".to_string());
    let client = Neo4jHttpClient::new(&config_for(url)).unwrap();
    let query = builder::list_by_type("user").unwrap();
    let rendered = render(&query).unwrap();

    let err = client.execute(&query, &rendered).unwrap_err();
    assert!(matches!(err, GraphError::Connection(_)));
}

#[test]
fn test_server_error_is_upstream_unavailable() {
    let (url, _captured) = serve_once("503 Service Unavailable", "{}".to_string());
    let service = ActivityService::new(
        Neo4jHttpClient::new(&config_for(url)).unwrap(),
        ServiceOptions::default(),
    );
    let err = service.list_by_type("user").unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_malformed_body_is_decode_error() {
    let (url, _captured) = serve_once("200 OK", "{\"results\": 7}".to_string());
    let client = Neo4jHttpClient::new(&config_for(url)).unwrap();
    let query = builder::list_by_type("user").unwrap();
    let rendered = render(&query).unwrap();

    assert!(matches!(
        client.execute(&query, &rendered),
        Err(GraphError::Decode(_))
    ));
}

#[test]
fn test_connection_refused() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = Neo4jHttpClient::new(&config_for(format!("http://127.0.0.1:{port}"))).unwrap();
    let service = ActivityService::new(client, ServiceOptions::default());

    let err = service.list_by_type("user").unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_silent_store_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let holder = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(800));
        drop(stream);
    });

    let config = GraphStoreConfig {
        timeout_ms: 200,
        ..config_for(url)
    };
    let client = Neo4jHttpClient::new(&config).unwrap();
    let query = builder::list_by_type("user").unwrap();
    let rendered = render(&query).unwrap();

    let err = client.execute(&query, &rendered).unwrap_err();
    assert!(matches!(err, GraphError::Timeout(_)), "got {err:?}");
    holder.join().unwrap();
}

#[test]
fn test_bulkhead_wraps_remote_client() {
    let (url, _captured) = serve_once(
        "200 OK",
        serde_json::json!({"results": [{"columns": ["actor"], "data": []}], "errors": []})
            .to_string(),
    );
    let client = BulkheadGraphClient::new(
        Neo4jHttpClient::new(&config_for(url)).unwrap(),
        GraphBulkheadConfig::new().with_max_concurrent(1),
    );
    let service = ActivityService::new(client, ServiceOptions::default());

    assert!(service.list_by_type("user").unwrap().is_empty());
    assert_eq!(service.client().available_permits(), 1);
}
