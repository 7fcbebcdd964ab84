//! SQL for the chunk table and its similarity function.
//!
//! The same statements are printed by the `schema` subcommand for hosted
//! projects and applied directly by the pgvector backend.

use anyhow::Result;

use crate::vector_store::QualifiedName;

/// Statements that make a database ready for uploads and searches.
#[derive(Debug, Clone)]
pub struct SchemaPlan {
    table: QualifiedName,
    function: QualifiedName,
    dimensions: usize,
}

impl SchemaPlan {
    /// Plans the schema for embeddings of `dimensions` floats.
    pub fn new(table: QualifiedName, function: QualifiedName, dimensions: usize) -> Result<Self> {
        anyhow::ensure!(dimensions > 0, "embedding dimension must be positive");
        Ok(Self {
            table,
            function,
            dimensions,
        })
    }

    /// Embedding width the table is declared with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// `CREATE EXTENSION` for pgvector.
    pub fn extension_sql(&self) -> String {
        "CREATE EXTENSION IF NOT EXISTS vector".to_string()
    }

    /// `CREATE TABLE` for the chunk rows.
    pub fn table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id BIGSERIAL PRIMARY KEY,
    content TEXT NOT NULL,
    metadata JSONB NOT NULL,
    embedding VECTOR({}) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)",
            self.table.qualified(),
            self.dimensions
        )
    }

    /// HNSW index serving cosine-distance ordering.
    pub fn index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding vector_cosine_ops)",
            self.table.index_name("embedding_idx"),
            self.table.qualified()
        )
    }

    /// The similarity function; rows at or above the threshold, closest first.
    pub fn function_sql(&self) -> String {
        format!(
            "CREATE OR REPLACE FUNCTION {function} (
    query_embedding VECTOR({dims}),
    match_threshold FLOAT,
    match_count INT
)
RETURNS TABLE (id BIGINT, content TEXT, metadata JSONB, similarity FLOAT)
LANGUAGE sql STABLE
AS $$
    SELECT
        chunks.id,
        chunks.content,
        chunks.metadata,
        1 - (chunks.embedding <=> query_embedding) AS similarity
    FROM {table} AS chunks
    WHERE 1 - (chunks.embedding <=> query_embedding) >= match_threshold
    ORDER BY chunks.embedding <=> query_embedding
    LIMIT match_count;
$$",
            function = self.function.qualified(),
            dims = self.dimensions,
            table = self.table.qualified(),
        )
    }

    /// Every statement in execution order.
    pub fn statements(&self) -> Vec<String> {
        vec![
            self.extension_sql(),
            self.table_sql(),
            self.index_sql(),
            self.function_sql(),
        ]
    }

    /// Statements joined into a script suitable for a SQL editor.
    pub fn script(&self) -> String {
        let mut script = String::new();
        for statement in self.statements() {
            script.push_str(&statement);
            script.push_str(";\n\n");
        }
        script
    }
}
