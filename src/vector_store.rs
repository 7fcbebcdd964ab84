//! Remote chunk storage and similarity search.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::corpus::ChunkMetadata;

pub mod memory;
pub mod pgvector;
pub mod postgrest;

pub use self::memory::MemoryStore;
pub use self::pgvector::PgVectorStore;
pub use self::postgrest::PostgrestStore;

/// Default table holding embedded chunks.
pub const DEFAULT_TABLE: &str = "framework_chunks";

/// Default server-side similarity function.
pub const DEFAULT_MATCH_FUNCTION: &str = "match_framework_chunks_hf";

/// Insert and search operations offered by a chunk store.
///
/// Every insert creates a new row; stores never deduplicate by chunk id.
pub trait VectorStore {
    /// Stores one embedded chunk.
    fn insert(&self, row: &ChunkRow) -> Result<InsertAck>;

    /// Runs the similarity function for a query embedding.
    fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<ChunkMatch>>;
}

/// Insert payload: content, metadata document and embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRow {
    /// Chunk body text.
    pub content: String,
    /// Classification and attribution fields.
    pub metadata: ChunkMetadata,
    /// Embedding of `content`.
    pub embedding: Vec<f32>,
}

/// Store acknowledgement for an insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertAck {
    /// Row identifier assigned by the store, when it reports one.
    pub row_id: Option<String>,
}

/// Named parameters of the server-side similarity function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchQuery {
    /// Embedding of the search text.
    pub query_embedding: Vec<f32>,
    /// Minimum similarity a row needs to be returned.
    pub match_threshold: f64,
    /// Maximum number of rows returned.
    pub match_count: usize,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkMatch {
    /// Row identifier, when the function returns one.
    #[serde(default, deserialize_with = "postgrest::id_to_string")]
    pub id: Option<String>,
    /// Stored chunk text.
    pub content: String,
    /// Stored metadata document.
    #[serde(default)]
    pub metadata: ChunkMetadata,
    /// Similarity score, higher is closer.
    pub similarity: f64,
}

/// Schema-qualified Postgres relation or function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    schema: String,
    name: String,
}

impl QualifiedName {
    /// Builds a new identifier.
    pub fn new<S, N>(schema: S, name: N) -> Result<Self>
    where
        S: Into<String>,
        N: Into<String>,
    {
        let schema = schema.into();
        let name = name.into();
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!name.trim().is_empty(), "relation name is required");
        Ok(Self { schema, name })
    }

    /// Fully-qualified reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// Returns the raw schema string.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the raw relation or function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index name derived from the schema, name and a suffix.
    pub fn index_name(&self, suffix: &str) -> String {
        format!(
            "{}_{}_{}",
            sanitize_ident(&self.schema),
            sanitize_ident(&self.name),
            sanitize_ident(suffix)
        )
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

/// Cosine similarity of two vectors; zero when either is all zeros or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
