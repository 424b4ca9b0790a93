//! Activity access service.
//!
//! Provides the five read operations over a [`GraphClient`]: build the query,
//! render it, execute it (or skip execution in dry-run mode) and shape the
//! rows.
//!
//! # Example
//!
//! ```rust
//! use activity_graph::{ActivityService, ServiceOptions};
//! use activity_graph::storage::InMemoryGraphClient;
//!
//! let store = InMemoryGraphClient::new();
//! let user = store.add_node("user", "1").unwrap();
//! let photo = store.add_node("photo", "10010").unwrap();
//! store.add_edge(&user, "favorited", &photo).unwrap();
//!
//! let service = ActivityService::new(store, ServiceOptions::default());
//! let summary = service.list_relationships("user", "1", "FAVORITED").unwrap();
//! assert_eq!(summary[0].count, 1);
//! ```

use super::route::{ActivityRequest, ActivityResponse};
use crate::config::ServiceSettings;
use crate::models::{Activity, ActivityGroup, ActorRelationships, Node, Row, node_from_row};
use crate::observability::request_id_or_new;
use crate::query::{Query, RenderedQuery, builder, render};
use crate::storage::{GraphClient, GraphError};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Behaviour switches fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Render and log queries, return empty results, never call the client.
    pub dry_run: bool,
    /// Log every rendered query at info level instead of debug.
    pub log_queries: bool,
}

impl ServiceOptions {
    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets verbose query logging.
    #[must_use]
    pub const fn with_log_queries(mut self, log_queries: bool) -> Self {
        self.log_queries = log_queries;
        self
    }
}

impl From<ServiceSettings> for ServiceOptions {
    fn from(settings: ServiceSettings) -> Self {
        Self {
            dry_run: settings.dry_run,
            log_queries: settings.verbose_queries,
        }
    }
}

/// Read access to the activity graph.
///
/// # Thread Safety
///
/// The service is thread-safe when the client is; all five operations take
/// `&self` and keep their query state on the stack.
pub struct ActivityService<C: GraphClient> {
    client: Arc<C>,
    options: ServiceOptions,
}

impl<C: GraphClient> ActivityService<C> {
    /// Creates a new service owning `client`.
    pub fn new(client: C, options: ServiceOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }

    /// Creates a new service with a shared client.
    #[must_use]
    pub const fn with_shared_client(client: Arc<C>, options: ServiceOptions) -> Self {
        Self { client, options }
    }

    /// Returns a reference to the underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the options the service was built with.
    #[must_use]
    pub const fn options(&self) -> ServiceOptions {
        self.options
    }

    /// Lists every node with `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a bad label, or
    /// [`Error::UpstreamUnavailable`] / [`Error::QueryRejected`] if the store
    /// call fails.
    #[instrument(skip(self), fields(operation = "list_by_type", request_id = %request_id_or_new()))]
    pub fn list_by_type(&self, label: &str) -> Result<Vec<Node>> {
        let query = builder::list_by_type(label)?;
        self.execute("list_by_type", &query)?
            .into_iter()
            .map(|row| node_from_row(row, builder::ACTOR))
            .collect()
    }

    /// Fetches the node with `label` whose external id is `id`.
    ///
    /// Returns an empty vector when no node matches, and every match when the
    /// external id is not unique.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_by_type`], plus [`Error::InvalidParameter`] for an
    /// empty id.
    #[instrument(skip(self), fields(operation = "get_by_id", request_id = %request_id_or_new()))]
    pub fn get_by_id(&self, label: &str, id: &str) -> Result<Vec<Node>> {
        let query = builder::get_by_id(label, id)?;
        self.execute("get_by_id", &query)?
            .into_iter()
            .map(|row| node_from_row(row, builder::ACTOR))
            .collect()
    }

    /// Aggregates the `verb` edges leaving one actor.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_by_id`], plus [`Error::InvalidParameter`] for a
    /// bad verb.
    #[instrument(
        skip(self),
        fields(operation = "list_relationships", request_id = %request_id_or_new())
    )]
    pub fn list_relationships(
        &self,
        label: &str,
        id: &str,
        verb: &str,
    ) -> Result<Vec<ActorRelationships>> {
        let query = builder::list_relationships(label, id, verb)?;
        self.execute("list_relationships", &query)?
            .into_iter()
            .map(ActorRelationships::from_row)
            .collect()
    }

    /// Lists `verb` edges from one actor to objects labelled `object_label`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_relationships`], plus
    /// [`Error::InvalidParameter`] for a bad object label.
    #[instrument(
        skip(self),
        fields(
            operation = "filter_by_relationship_and_target_type",
            request_id = %request_id_or_new()
        )
    )]
    pub fn filter_by_relationship_and_target_type(
        &self,
        label: &str,
        id: &str,
        verb: &str,
        object_label: &str,
    ) -> Result<Vec<Activity>> {
        let query = builder::filter_by_relationship_and_target_type(label, id, verb, object_label)?;
        self.execute("filter_by_relationship_and_target_type", &query)?
            .into_iter()
            .map(Activity::from_row)
            .collect()
    }

    /// Groups every edge leaving one actor by verb type.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_by_id`].
    #[instrument(
        skip(self),
        fields(operation = "list_all_activities_by_actor", request_id = %request_id_or_new())
    )]
    pub fn list_all_activities_by_actor(
        &self,
        label: &str,
        id: &str,
    ) -> Result<Vec<ActivityGroup>> {
        let query = builder::list_all_activities_by_actor(label, id)?;
        self.execute("list_all_activities_by_actor", &query)?
            .into_iter()
            .map(ActivityGroup::from_row)
            .collect()
    }

    /// Dispatches a routed request to the matching operation.
    ///
    /// # Errors
    ///
    /// Propagates the error of the dispatched operation.
    pub fn handle(&self, request: &ActivityRequest) -> Result<ActivityResponse> {
        match request {
            ActivityRequest::ListByType { label } => {
                self.list_by_type(label).map(ActivityResponse::Nodes)
            },
            ActivityRequest::GetById { label, id } => {
                self.get_by_id(label, id).map(ActivityResponse::Nodes)
            },
            ActivityRequest::Relationships { label, id, verb } => self
                .list_relationships(label, id, verb)
                .map(ActivityResponse::Relationships),
            ActivityRequest::ByTargetType {
                label,
                id,
                verb,
                object_label,
            } => self
                .filter_by_relationship_and_target_type(label, id, verb, object_label)
                .map(ActivityResponse::Activities),
            ActivityRequest::AllActivities { label, id } => self
                .list_all_activities_by_actor(label, id)
                .map(ActivityResponse::Groups),
        }
    }

    /// Renders a routed request without executing it.
    ///
    /// # Errors
    ///
    /// Returns the builder or renderer error for the request.
    pub fn explain(&self, request: &ActivityRequest) -> Result<RenderedQuery> {
        render(&request.build()?)
    }

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpstreamUnavailable`] if the ping fails.
    pub fn ping(&self) -> Result<()> {
        self.client.ping().map_err(|e| classify("ping", &e))
    }

    fn execute(&self, operation: &'static str, query: &Query) -> Result<Vec<Row>> {
        let rendered = render(query)?;
        let parameters = rendered.parameters.to_json();
        if self.options.log_queries {
            tracing::info!(operation, query = %rendered.text, %parameters, "Rendered query");
        } else {
            tracing::debug!(operation, query = %rendered.text, %parameters, "Rendered query");
        }

        if self.options.dry_run {
            tracing::info!(operation, "Dry run, query not executed");
            record(operation, "dry_run", None);
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = self.client.execute(query, &rendered);
        let status = if result.is_ok() { "success" } else { "error" };
        record(operation, status, Some(start));

        match result {
            Ok(rows) => {
                tracing::debug!(operation, rows = rows.len(), "Query executed");
                Ok(rows)
            },
            Err(e) => Err(classify(operation, &e)),
        }
    }
}

/// Maps a client failure to a caller-facing error.
///
/// The store's own text goes to the log only.
fn classify(operation: &str, err: &GraphError) -> Error {
    if err.is_transient() {
        tracing::warn!(operation, error = %err, "Graph store unavailable");
    } else {
        tracing::error!(operation, error = %err, "Graph store rejected query");
    }

    let cause = match err {
        GraphError::Connection(_) => "graph store unreachable",
        GraphError::Timeout(_) => "graph store timed out",
        GraphError::Query { .. } => "statement rejected by graph store",
        GraphError::Decode(_) => "unexpected response from graph store",
    }
    .to_string();
    let operation = operation.to_string();

    match err {
        GraphError::Connection(_) | GraphError::Timeout(_) => {
            Error::UpstreamUnavailable { operation, cause }
        },
        GraphError::Query { .. } | GraphError::Decode(_) => {
            Error::QueryRejected { operation, cause }
        },
    }
}

fn record(operation: &'static str, status: &'static str, start: Option<Instant>) {
    metrics::counter!(
        "activity_graph_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    if let Some(start) = start {
        metrics::histogram!("activity_graph_query_duration_ms", "operation" => operation)
            .record(start.elapsed().as_secs_f64() * 1000.0);
    }
}
