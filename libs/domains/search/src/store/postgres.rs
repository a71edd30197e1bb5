use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::postgres::{PostgresConfig, check_health};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, Statement};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::VectorStore;
use super::connection::{Connector, LiveConnection, PgConnector};
use crate::error::{SearchError, SearchResult};
use crate::models::{Embedding, Match, Record};

pub const TABLE_NAME: &str = "embeddings";

const UPSERT_SQL: &str = "INSERT INTO embeddings (key, vector, metadata) \
     VALUES ($1, $2::vector, $3) \
     ON CONFLICT (key) DO UPDATE SET vector = EXCLUDED.vector, metadata = EXCLUDED.metadata";

const QUERY_SQL: &str = "SELECT key, (vector <=> $1::vector)::float8 AS distance, metadata \
     FROM embeddings \
     WHERE (vector <=> $1::vector) < $2 \
     ORDER BY distance ASC \
     LIMIT $3";

const COLUMN_TYPE_SQL: &str = "SELECT format_type(atttypid, atttypmod) AS column_type \
     FROM pg_attribute \
     WHERE attrelid = 'embeddings'::regclass AND attname = 'vector' AND NOT attisdropped";

const GET_SQL: &str = "SELECT key, vector::text AS vector, metadata, created_at \
     FROM embeddings WHERE key = $1";

/// Statements that create the extension, table and index if absent.
fn schema_statements(dimension: usize) -> [String; 3] {
    [
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (\
             id SERIAL PRIMARY KEY, \
             key TEXT UNIQUE NOT NULL, \
             vector vector({dimension}) NOT NULL, \
             metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {TABLE_NAME}_vector_idx \
             ON {TABLE_NAME} USING hnsw (vector vector_cosine_ops)"
        ),
    ]
}

/// VectorStore on PostgreSQL with the pgvector extension.
pub struct PgVectorStore<C: Connector = PgConnector> {
    connection: Arc<LiveConnection<C>>,
    dimension: usize,
}

impl<C: Connector> Clone for PgVectorStore<C> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            dimension: self.dimension,
        }
    }
}

impl PgVectorStore<PgConnector> {
    /// Connect with `config` and make sure the schema exists.
    pub async fn connect(config: &PostgresConfig, dimension: usize) -> SearchResult<Self> {
        Self::open(PgConnector::new(config.clone()), dimension).await
    }
}

impl<C: Connector> PgVectorStore<C> {
    /// Connect through `connector` and create the schema if absent.
    ///
    /// Any failure here is [`SearchError::Connect`].
    #[instrument(skip(connector))]
    pub async fn open(connector: C, dimension: usize) -> SearchResult<Self> {
        let connection = LiveConnection::open(connector)
            .await
            .map_err(|e| SearchError::Connect(e.to_string()))?;

        let store = Self {
            connection: Arc::new(connection),
            dimension,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    async fn ensure_schema(&self) -> SearchResult<()> {
        let db = self
            .connection
            .acquire()
            .await
            .map_err(|e| SearchError::Connect(e.to_string()))?;

        for sql in schema_statements(self.dimension) {
            db.execute_unprepared(&sql)
                .await
                .map_err(|e| SearchError::Connect(format!("schema setup failed: {e}")))?;
        }
        // An existing table is kept as is, so its column must already fit.
        let expected = format!("vector({})", self.dimension);
        let found: Option<String> = db
            .query_one_raw(Statement::from_string(DatabaseBackend::Postgres, COLUMN_TYPE_SQL))
            .await
            .map_err(|e| SearchError::Connect(format!("schema check failed: {e}")))?
            .map(|row| row.try_get::<String>("", "column_type"))
            .transpose()
            .map_err(|e| SearchError::Connect(format!("schema check failed: {e}")))?;

        if found.as_deref() != Some(expected.as_str()) {
            return Err(SearchError::Connect(format!(
                "table {TABLE_NAME} has column vector of type {}, expected {expected}",
                found.as_deref().unwrap_or("<missing>")
            )));
        }

        info!(table = TABLE_NAME, dimension = self.dimension, "Vector schema ready");
        Ok(())
    }

    fn check_dimension(&self, vector: &Embedding) -> SearchResult<()> {
        if vector.dimension() != self.dimension {
            return Err(SearchError::Validation(format!(
                "vector has {} dimensions, store expects {}",
                vector.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }
}

fn statement<const N: usize>(sql: &str, values: [sea_orm::Value; N]) -> Statement {
    Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, values)
}

fn match_from_row(row: &QueryResult) -> Result<Match, sea_orm::DbErr> {
    let distance: f64 = row.try_get("", "distance")?;
    Ok(Match {
        key: row.try_get("", "key")?,
        similarity: 1.0 - distance,
        metadata: row.try_get("", "metadata")?,
    })
}

#[async_trait]
impl<C: Connector> VectorStore for PgVectorStore<C> {
    #[instrument(skip(self, vector, metadata))]
    async fn upsert(&self, key: &str, vector: &Embedding, metadata: &Value) -> SearchResult<()> {
        self.check_dimension(vector)?;
        let db = self.connection.acquire().await?;

        let stmt = statement(
            UPSERT_SQL,
            [
                key.into(),
                vector.to_pgvector().into(),
                metadata.clone().into(),
            ],
        );
        db.execute_raw(stmt)
            .await
            .map_err(|e| SearchError::Write(e.to_string()))?;

        debug!("Upserted vector");
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn query(
        &self,
        vector: &Embedding,
        top_k: i64,
        threshold: f64,
    ) -> SearchResult<Vec<Match>> {
        self.check_dimension(vector)?;
        if !threshold.is_finite() {
            return Err(SearchError::Validation(format!(
                "threshold must be a finite number, got {threshold}"
            )));
        }
        if top_k <= 0 {
            return Ok(Vec::new());
        }

        let db = self.connection.acquire().await?;
        let stmt = statement(
            QUERY_SQL,
            [vector.to_pgvector().into(), threshold.into(), top_k.into()],
        );
        let rows = db
            .query_all_raw(stmt)
            .await
            .map_err(|e| SearchError::Read(e.to_string()))?;

        let matches = rows
            .iter()
            .map(match_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SearchError::Read(e.to_string()))?;

        debug!(hits = matches.len(), "Vector query complete");
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> SearchResult<Option<Record>> {
        let db = self.connection.acquire().await?;
        let row = db
            .query_one_raw(statement(GET_SQL, [key.into()]))
            .await
            .map_err(|e| SearchError::Read(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let read = |e: sea_orm::DbErr| SearchError::Read(e.to_string());
        let vector_text: String = row.try_get("", "vector").map_err(read)?;
        let created_at: DateTime<Utc> = row.try_get("", "created_at").map_err(read)?;

        Ok(Some(Record {
            key: row.try_get("", "key").map_err(read)?,
            vector: Embedding::from_pgvector(&vector_text, self.dimension)?,
            metadata: row.try_get("", "metadata").map_err(read)?,
            created_at,
        }))
    }

    async fn health_check(&self) -> SearchResult<()> {
        let db = self.connection.acquire().await?;
        check_health(&db)
            .await
            .map_err(|e| SearchError::ConnectionLost(e.to_string()))
    }
}
