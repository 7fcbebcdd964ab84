//! Sequential embed-and-insert pipeline over a corpus.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::corpus::{Chunk, Corpus, MetadataStamp};
use crate::embedder::Embedder;
use crate::vector_store::{ChunkRow, InsertAck, VectorStore};

/// Embeds one chunk and inserts it with its metadata.
pub fn upload_chunk(
    chunk: &Chunk,
    stamp: &MetadataStamp,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<InsertAck> {
    let embedding = embedder
        .embed(&chunk.content)
        .with_context(|| format!("failed to embed {}", chunk.chunk_id))?;
    let row = ChunkRow {
        content: chunk.content.clone(),
        metadata: chunk.metadata(stamp),
        embedding,
    };
    store
        .insert(&row)
        .with_context(|| format!("failed to insert {}", chunk.chunk_id))
}

/// Result of uploading a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Store acknowledged the row.
    Uploaded(InsertAck),
    /// Embedding or insert failed; holds the error chain.
    Failed(String),
}

/// Per-chunk entry of an [`UploadReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Identifier of the chunk.
    pub chunk_id: String,
    /// What happened to it.
    pub status: UploadStatus,
}

impl ChunkOutcome {
    /// Whether the chunk reached the store.
    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, UploadStatus::Uploaded(_))
    }
}

/// Outcome of a batch upload, in corpus order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// One entry per attempted chunk.
    pub outcomes: Vec<ChunkOutcome>,
}

impl UploadReport {
    /// Chunks the store acknowledged.
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_uploaded()).count()
    }

    /// Chunks that failed to embed or insert.
    pub fn failed(&self) -> usize {
        self.total() - self.successful()
    }

    /// Chunks attempted.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when every chunk was uploaded.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}

/// Uploads every chunk in order, one round trip at a time.
///
/// A failing chunk is recorded and skipped; later chunks still run.
pub fn upload_all(
    corpus: &Corpus,
    stamp: &MetadataStamp,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> UploadReport {
    upload_all_with_progress(corpus, stamp, embedder, store, |_, _, _| {})
}

/// Like [`upload_all`], calling `on_outcome(index, total, outcome)` as each
/// chunk finishes. `index` is 1-based.
pub fn upload_all_with_progress<F>(
    corpus: &Corpus,
    stamp: &MetadataStamp,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    mut on_outcome: F,
) -> UploadReport
where
    F: FnMut(usize, usize, &ChunkOutcome),
{
    let total = corpus.len();
    info!(total, model = embedder.model(), "starting upload");
    let mut report = UploadReport {
        outcomes: Vec::with_capacity(total),
    };
    for (idx, chunk) in corpus.chunks().iter().enumerate() {
        let index = idx + 1;
        info!(index, total, chunk_id = %chunk.chunk_id, "processing chunk");
        let status = match upload_chunk(chunk, stamp, embedder, store) {
            Ok(ack) => {
                info!(chunk_id = %chunk.chunk_id, row_id = ?ack.row_id, "uploaded");
                UploadStatus::Uploaded(ack)
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(chunk_id = %chunk.chunk_id, error = %message, "upload failed");
                UploadStatus::Failed(message)
            }
        };
        let outcome = ChunkOutcome {
            chunk_id: chunk.chunk_id.clone(),
            status,
        };
        on_outcome(index, total, &outcome);
        report.outcomes.push(outcome);
    }
    info!(
        successful = report.successful(),
        failed = report.failed(),
        "upload finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::vector_store::{ChunkMatch, MatchQuery, MemoryStore};
    use std::cell::Cell;

    struct FailingStore;

    impl VectorStore for FailingStore {
        fn insert(&self, _row: &ChunkRow) -> Result<InsertAck> {
            anyhow::bail!("connection refused")
        }

        fn match_chunks(&self, _query: &MatchQuery) -> Result<Vec<ChunkMatch>> {
            Ok(Vec::new())
        }
    }

    struct CountingEmbedder {
        calls: Cell<usize>,
    }

    impl Embedder for CountingEmbedder {
        fn model(&self) -> &str {
            "counting"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn chunk(id: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            category: "Assessment".to_string(),
            educational_level: "Universal".to_string(),
            content_type: "Assessment Strategy".to_string(),
            content: format!("portfolio text {id}"),
        }
    }

    #[test]
    fn upload_chunk_stores_embedding_of_content() {
        let store = MemoryStore::new();
        let embedder = HashingEmbedder::new(16).unwrap();
        let ack = upload_chunk(&chunk("a"), &MetadataStamp::default(), &embedder, &store)
            .expect("upload succeeds");
        assert_eq!(ack.row_id.as_deref(), Some("1"));

        let matches = store
            .match_chunks(&MatchQuery {
                query_embedding: embedder.embed("portfolio text a").unwrap(),
                match_threshold: 0.99,
                match_count: 1,
            })
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.chunk_id, "a");
        assert_eq!(matches[0].metadata.framework, "SHE IS AI");
    }

    #[test]
    fn insert_error_names_the_chunk() {
        let embedder = HashingEmbedder::new(4).unwrap();
        let err = upload_chunk(&chunk("broken"), &MetadataStamp::default(), &embedder, &FailingStore)
            .expect_err("insert fails");
        let msg = format!("{err:#}");
        assert!(msg.contains("broken"), "unexpected error: {msg}");
        assert!(msg.contains("connection refused"), "unexpected error: {msg}");
    }

    #[test]
    fn store_failures_are_counted_per_chunk() {
        let corpus = Corpus::new(vec![chunk("a"), chunk("b")]).unwrap();
        let embedder = CountingEmbedder {
            calls: Cell::new(0),
        };
        let report = upload_all(&corpus, &MetadataStamp::default(), &embedder, &FailingStore);
        assert_eq!(report.successful(), 0);
        assert_eq!(report.failed(), 2);
        assert_eq!(embedder.calls.get(), 2);
        assert!(!report.is_complete());
        match &report.outcomes[1].status {
            UploadStatus::Failed(msg) => assert!(msg.contains("failed to insert b")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn progress_reported_as_each_chunk_finishes() {
        let corpus = Corpus::new(vec![chunk("a"), chunk("b"), chunk("c")]).unwrap();
        let store = MemoryStore::new();
        let mut seen = Vec::new();
        let report = upload_all_with_progress(
            &corpus,
            &MetadataStamp::default(),
            &HashingEmbedder::new(8).unwrap(),
            &store,
            |index, total, outcome| {
                // rows land before the callback fires
                assert_eq!(store.len(), index);
                seen.push((index, total, outcome.chunk_id.clone()));
            },
        );
        assert_eq!(
            seen,
            vec![
                (1, 3, "a".to_string()),
                (2, 3, "b".to_string()),
                (3, 3, "c".to_string()),
            ]
        );
        assert_eq!(report.successful(), 3);
    }

    #[test]
    fn outcomes_follow_corpus_order() {
        let corpus = Corpus::new(vec![chunk("z"), chunk("a"), chunk("m")]).unwrap();
        let store = MemoryStore::new();
        let report = upload_all(
            &corpus,
            &MetadataStamp::default(),
            &HashingEmbedder::new(8).unwrap(),
            &store,
        );
        let ids: Vec<_> = report.outcomes.iter().map(|o| o.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert!(report.is_complete());
    }
}
