//! Pooled storage handle.
//!
//! # Responsibilities
//! - Size the Postgres pool once at startup (max open / max idle)
//! - Route queries through the latency instrumentation, both as
//!   collected results and as row streams
//! - Release the pool after the lifecycle controller stops
//!
//! # Design Decisions
//! - The pool connects lazily so startup never blocks on the database
//! - Pool sizing is untouched by the drain sequence

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, Postgres};

use crate::config::DatabaseConfig;
use crate::observability::{cursor_with_metrics, Instrumented, LatencyProbe, MetricSink};

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
    sink: Option<Arc<dyn MetricSink>>,
    record_failures: bool,
}

impl Storage {
    /// Build the pool without opening any connection yet.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;

        tracing::info!(
            max_open_conns = config.max_open_conns,
            max_idle_conns = config.max_idle_conns,
            "Storage pool configured"
        );

        Ok(Self {
            pool,
            sink: None,
            record_failures: false,
        })
    }

    /// Record query latency into `sink`.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricSink>, record_failures: bool) -> Self {
        self.sink = Some(sink);
        self.record_failures = record_failures;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Probe for a query labelled `label`.
    pub fn probe(&self, label: &str) -> LatencyProbe {
        match &self.sink {
            Some(sink) => LatencyProbe::query(Arc::clone(sink), label).record_failures(self.record_failures),
            None => LatencyProbe::disabled(),
        }
    }

    /// Run `query` and collect every row.
    pub async fn fetch_all<'q, T>(
        &self,
        label: &str,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.probe(label).observe(query.fetch_all(&self.pool)).await
    }

    /// Run `query` and return exactly one row.
    pub async fn fetch_one<'q, T>(
        &self,
        label: &str,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<T, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.probe(label).observe(query.fetch_one(&self.pool)).await
    }

    /// Open a row stream for `query`.
    ///
    /// The query is executed and its first row awaited before returning, so
    /// connection and statement errors surface here. Only that opening step is
    /// timed; draining the stream is up to the caller.
    pub async fn fetch<'a, T>(
        &'a self,
        label: &str,
        query: QueryAs<'a, Postgres, T, PgArguments>,
    ) -> Result<BoxStream<'a, Result<T, sqlx::Error>>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'a,
    {
        let pool = &self.pool;
        let open = move |query: QueryAs<'a, Postgres, T, PgArguments>| async move {
            let mut rows = query.fetch(pool);
            let first = rows.try_next().await?;
            Ok::<_, sqlx::Error>(stream::iter(first.map(Ok)).chain(rows).boxed())
        };

        let cursor = match &self.sink {
            Some(sink) => cursor_with_metrics(Arc::clone(sink), label, open)
                .record_failures(self.record_failures),
            None => Instrumented::passthrough(open),
        };
        cursor.call(query).await
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute<'q>(
        &self,
        label: &str,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Result<u64, sqlx::Error> {
        let result = self.probe(label).observe(query.execute(&self.pool)).await?;
        Ok(result.rows_affected())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
