use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::adapter::{DestinationClient, SqlClient, StateRecord};
use crate::error::{DestinationError, DestinationResult};
use crate::options::DestinationOptions;

pub mod queries;

/// Destination backed by a PostgreSQL database; the dataset is a Postgres schema.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
    dataset_name: String,
}

impl PostgresDestination {
    /// Create a destination using a pre-configured pool.
    pub fn new(pool: PgPool, dataset_name: impl Into<String>) -> Self {
        Self {
            pool,
            dataset_name: dataset_name.into(),
        }
    }

    /// Connect to `conn` with the given options.
    pub async fn connect(conn: &str, opts: &DestinationOptions) -> DestinationResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(opts.acquire_timeout)
            .connect(conn)
            .await
            .map_err(classify_connect_error)?;
        Ok(Self::new(pool, opts.dataset_name.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn classify_connect_error(err: sqlx::Error) -> DestinationError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("28000" | "28P01")) {
            return DestinationError::Auth(db.message().to_string());
        }
    }
    match err {
        sqlx::Error::Io(io) => DestinationError::Unavailable(io.to_string()),
        sqlx::Error::PoolTimedOut => {
            DestinationError::Unavailable("timed out waiting for a connection".to_string())
        }
        other => DestinationError::Db(other),
    }
}

#[async_trait]
impl DestinationClient for PostgresDestination {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    async fn drop_tables(&self, names: &[String]) -> DestinationResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        tracing::info!(
            event = "destination_drop_tables",
            dataset = %self.dataset_name,
            tables = names.len(),
        );
        queries::drop_tables(&self.pool, &self.dataset_name, names).await
    }

    async fn store_state(&self, record: &StateRecord) -> DestinationResult<()> {
        let state = serde_json::to_string(&record.state)?;
        let version = i64::try_from(record.version).unwrap_or(i64::MAX);
        queries::insert_state(
            &self.pool,
            &self.dataset_name,
            &record.pipeline_name,
            version,
            &state,
        )
        .await
    }

    async fn stored_state(&self, pipeline_name: &str) -> DestinationResult<Option<StateRecord>> {
        let Some((version, state)) =
            queries::fetch_latest_state(&self.pool, &self.dataset_name, pipeline_name).await?
        else {
            return Ok(None);
        };
        Ok(Some(StateRecord {
            pipeline_name: pipeline_name.to_string(),
            version: u64::try_from(version).unwrap_or_default(),
            state: serde_json::from_str(&state)?,
        }))
    }
}

#[async_trait]
impl SqlClient for PostgresDestination {
    fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    async fn drop_dataset(&self) -> DestinationResult<()> {
        tracing::info!(event = "destination_drop_dataset", dataset = %self.dataset_name);
        queries::drop_schema(&self.pool, &self.dataset_name).await
    }
}
