//! Bulkhead pattern for graph store calls.
//!
//! Bounds the number of in-flight queries against a shared client
//! independently of request concurrency. Each call holds a semaphore permit for
//! its whole duration; the permit is released on drop, so it is returned on
//! success, on error, and on unwinding.
//!
//! # Usage
//!
//! ```rust,ignore
//! use activity_graph::storage::{BulkheadGraphClient, GraphBulkheadConfig, Neo4jHttpClient};
//!
//! let client = Neo4jHttpClient::new(&store_config)?;
//! let bulkhead = BulkheadGraphClient::new(client, GraphBulkheadConfig::default());
//!
//! // At most 10 concurrent queries (default)
//! let rows = bulkhead.execute(&query, &rendered)?;
//! ```

use super::traits::{GraphClient, GraphError};
use crate::models::Row;
use crate::query::{Query, RenderedQuery};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Configuration for the graph bulkhead.
#[derive(Debug, Clone)]
pub struct GraphBulkheadConfig {
    /// Maximum concurrent queries.
    ///
    /// Default: 10.
    pub max_concurrent: usize,

    /// Timeout for acquiring a permit in milliseconds (0 = 60s safety cap).
    ///
    /// Default: 5000ms.
    pub acquire_timeout_ms: u64,

    /// Whether to fail immediately when all permits are taken.
    ///
    /// Default: false.
    pub fail_fast: bool,
}

impl Default for GraphBulkheadConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBulkheadConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: 10,
            acquire_timeout_ms: 5000,
            fail_fast: false,
        }
    }

    /// Sets the maximum concurrent queries.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets whether to fail fast when the bulkhead is full.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Graph client wrapper with a bounded permit pool.
pub struct BulkheadGraphClient<C: GraphClient> {
    inner: C,
    config: GraphBulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl<C: GraphClient> BulkheadGraphClient<C> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: C, config: GraphBulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            inner,
            config,
            semaphore,
        }
    }

    /// Returns the number of free permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, GraphError> {
        let available = self.semaphore.available_permits();
        metrics::gauge!(
            "activity_graph_bulkhead_available_permits",
            "client" => self.inner.name()
        )
        .set(available as f64);

        if self.config.fail_fast {
            return Arc::clone(&self.semaphore).try_acquire_owned().map_err(|_| {
                self.record_rejection("full");
                GraphError::Timeout(format!(
                    "graph bulkhead full ({} concurrent queries)",
                    self.config.max_concurrent
                ))
            });
        }

        let timeout_ms = if self.config.acquire_timeout_ms == 0 {
            60_000
        } else {
            self.config.acquire_timeout_ms
        };
        let timeout = Duration::from_millis(timeout_ms);
        let start = Instant::now();

        loop {
            if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
                return Ok(permit);
            }
            if start.elapsed() >= timeout {
                self.record_rejection("timeout");
                return Err(GraphError::Timeout(format!(
                    "graph bulkhead permit not acquired within {timeout_ms}ms"
                )));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn record_rejection(&self, reason: &'static str) {
        metrics::counter!(
            "activity_graph_bulkhead_rejections_total",
            "client" => self.inner.name(),
            "reason" => reason
        )
        .increment(1);
    }
}

impl<C: GraphClient> GraphClient for BulkheadGraphClient<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn execute(&self, query: &Query, rendered: &RenderedQuery) -> Result<Vec<Row>, GraphError> {
        let _permit = self.acquire_permit()?;
        tracing::trace!(client = self.inner.name(), "Acquired graph bulkhead permit");
        let result = self.inner.execute(query, rendered);
        tracing::trace!(
            client = self.inner.name(),
            success = result.is_ok(),
            "Released graph bulkhead permit"
        );
        result
    }

    fn ping(&self) -> Result<(), GraphError> {
        let _permit = self.acquire_permit()?;
        self.inner.ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{builder, render};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct SlowClient {
        delay_ms: u64,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail: bool,
    }

    impl SlowClient {
        fn new(delay_ms: u64, fail: bool) -> Self {
            Self {
                delay_ms,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl GraphClient for SlowClient {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn execute(&self, _: &Query, _: &RenderedQuery) -> Result<Vec<Row>, GraphError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(self.delay_ms));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(GraphError::Connection("refused".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn statement() -> (Query, RenderedQuery) {
        let query = builder::list_by_type("user").unwrap();
        let rendered = render(&query).unwrap();
        (query, rendered)
    }

    #[test]
    fn test_limits_concurrency() {
        let bulkhead = Arc::new(BulkheadGraphClient::new(
            SlowClient::new(20, false),
            GraphBulkheadConfig::new().with_max_concurrent(2),
        ));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let bulkhead = Arc::clone(&bulkhead);
                thread::spawn(move || {
                    let (query, rendered) = statement();
                    bulkhead.execute(&query, &rendered)
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        assert!(bulkhead.inner().peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(bulkhead.available_permits(), 2);
    }

    #[test]
    fn test_permit_released_on_error() {
        let bulkhead = BulkheadGraphClient::new(
            SlowClient::new(0, true),
            GraphBulkheadConfig::new().with_max_concurrent(1),
        );
        let (query, rendered) = statement();
        assert!(bulkhead.execute(&query, &rendered).is_err());
        assert_eq!(bulkhead.available_permits(), 1);
    }

    #[test]
    fn test_fail_fast_when_full() {
        let bulkhead = Arc::new(BulkheadGraphClient::new(
            SlowClient::new(200, false),
            GraphBulkheadConfig::new()
                .with_max_concurrent(1)
                .with_fail_fast(true),
        ));

        let holder = {
            let bulkhead = Arc::clone(&bulkhead);
            thread::spawn(move || {
                let (query, rendered) = statement();
                bulkhead.execute(&query, &rendered)
            })
        };
        thread::sleep(Duration::from_millis(50));

        let (query, rendered) = statement();
        let err = bulkhead.execute(&query, &rendered).unwrap_err();
        assert!(matches!(err, GraphError::Timeout(_)));
        assert!(holder.join().unwrap().is_ok());
    }

    #[test]
    fn test_acquire_timeout() {
        let bulkhead = Arc::new(BulkheadGraphClient::new(
            SlowClient::new(300, false),
            GraphBulkheadConfig::new()
                .with_max_concurrent(1)
                .with_acquire_timeout_ms(20),
        ));

        let holder = {
            let bulkhead = Arc::clone(&bulkhead);
            thread::spawn(move || {
                let (query, rendered) = statement();
                bulkhead.execute(&query, &rendered)
            })
        };
        thread::sleep(Duration::from_millis(50));

        let (query, rendered) = statement();
        let err = bulkhead.execute(&query, &rendered).unwrap_err();
        assert!(err.to_string().contains("within 20ms"));
        assert!(holder.join().unwrap().is_ok());
    }
}
