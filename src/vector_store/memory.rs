//! In-process store used for offline runs and tests.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;

use super::{cosine_similarity, ChunkMatch, ChunkRow, InsertAck, MatchQuery, VectorStore};

/// Append-only row list with brute-force cosine search.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ChunkRow>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// Number of rows whose metadata carries `chunk_id`.
    pub fn count_chunk(&self, chunk_id: &str) -> usize {
        self.rows()
            .iter()
            .filter(|row| row.metadata.chunk_id == chunk_id)
            .count()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<ChunkRow>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VectorStore for MemoryStore {
    fn insert(&self, row: &ChunkRow) -> Result<InsertAck> {
        let mut rows = self.rows();
        rows.push(row.clone());
        Ok(InsertAck {
            row_id: Some(rows.len().to_string()),
        })
    }

    fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<ChunkMatch>> {
        let rows = self.rows();
        let dims = query.query_embedding.len();
        if let Some(row) = rows.iter().find(|row| row.embedding.len() != dims) {
            anyhow::bail!(
                "different vector dimensions {} and {} (row {})",
                row.embedding.len(),
                dims,
                row.metadata.chunk_id
            );
        }
        let mut matches: Vec<ChunkMatch> = rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let similarity = cosine_similarity(&query.query_embedding, &row.embedding);
                (similarity >= query.match_threshold).then(|| ChunkMatch {
                    id: Some((idx + 1).to_string()),
                    content: row.content.clone(),
                    metadata: row.metadata.clone(),
                    similarity,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(query.match_count);
        Ok(matches)
    }
}
