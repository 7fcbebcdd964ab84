//! Direct Postgres + pgvector backed store.

use anyhow::{Context, Result};
use ::pgvector::Vector;
use tokio::runtime::Runtime;
use tokio_postgres::types::Json as PgJson;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use super::{ChunkMatch, ChunkRow, InsertAck, MatchQuery, QualifiedName, VectorStore};
use crate::corpus::ChunkMetadata;
use crate::schema::SchemaPlan;

/// Synchronous facade over a `tokio-postgres` connection.
///
/// Owns a private runtime that drives the connection task; every call
/// blocks on it, so the store must not be used from inside another runtime.
pub struct PgVectorStore {
    runtime: Runtime,
    client: Client,
    insert_sql: String,
    match_sql: String,
}

impl PgVectorStore {
    /// Connects to Postgres and prepares SQL for the given table/function.
    pub fn connect(
        database_url: &str,
        table: &QualifiedName,
        function: &QualifiedName,
    ) -> Result<Self> {
        let runtime = Runtime::new().context("failed to start tokio runtime")?;
        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(database_url, NoTls))
            .context("failed to connect to Postgres")?;
        runtime.spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection error");
            }
        });
        Ok(Self {
            runtime,
            client,
            insert_sql: insert_sql(table),
            match_sql: match_sql(function),
        })
    }

    /// Creates the extension, table and match function when missing.
    pub fn prepare(&self, plan: &SchemaPlan) -> Result<()> {
        self.runtime.block_on(async {
            for statement in plan.statements() {
                self.client
                    .batch_execute(&statement)
                    .await
                    .with_context(|| format!("failed to apply schema statement: {statement}"))?;
            }
            Ok::<_, anyhow::Error>(())
        })?;
        info!(dimensions = plan.dimensions(), "schema prepared");
        Ok(())
    }
}

impl VectorStore for PgVectorStore {
    fn insert(&self, row: &ChunkRow) -> Result<InsertAck> {
        let embedding = Vector::from(row.embedding.clone());
        let metadata = PgJson(&row.metadata);
        let inserted = self
            .runtime
            .block_on(
                self.client
                    .query_one(&self.insert_sql, &[&row.content, &metadata, &embedding]),
            )
            .with_context(|| format!("failed to insert chunk {}", row.metadata.chunk_id))?;
        let id: i64 = inserted.try_get("id").context("insert returned no id")?;
        debug!(chunk_id = %row.metadata.chunk_id, id, "row inserted");
        Ok(InsertAck {
            row_id: Some(id.to_string()),
        })
    }

    fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<ChunkMatch>> {
        let embedding = Vector::from(query.query_embedding.clone());
        let count = i32::try_from(query.match_count).context("match_count exceeds i32 range")?;
        let rows = self
            .runtime
            .block_on(self.client.query(
                &self.match_sql,
                &[&embedding, &query.match_threshold, &count],
            ))
            .context("match function query failed")?;
        rows.iter().map(row_to_match).collect()
    }
}

fn insert_sql(table: &QualifiedName) -> String {
    format!(
        "INSERT INTO {} (content, metadata, embedding) VALUES ($1, $2, $3) RETURNING id",
        table.qualified()
    )
}

fn match_sql(function: &QualifiedName) -> String {
    format!(
        "SELECT id, content, metadata, similarity FROM {}($1, $2, $3)",
        function.qualified()
    )
}

fn row_to_match(row: &Row) -> Result<ChunkMatch> {
    let id: Option<i64> = row.try_get("id")?;
    let metadata: PgJson<ChunkMetadata> = row.try_get("metadata")?;
    Ok(ChunkMatch {
        id: id.map(|id| id.to_string()),
        content: row.try_get("content")?,
        metadata: metadata.0,
        similarity: row.try_get("similarity")?,
    })
}
