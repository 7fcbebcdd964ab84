//! Similarity search probe against the store's match function.

use anyhow::{Context, Result};
use tracing::info;

use crate::controls::SearchControls;
use crate::embedder::Embedder;
use crate::vector_store::{ChunkMatch, MatchQuery, VectorStore};

/// Query used when none is given.
pub const DEFAULT_QUERY: &str = "bias in AI education";

/// Embeds `query` and returns the store's ranked matches.
pub fn search(
    query: &str,
    controls: &SearchControls,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<Vec<ChunkMatch>> {
    let query_embedding = embedder
        .embed(query)
        .context("failed to embed search query")?;
    let request = MatchQuery {
        query_embedding,
        match_threshold: controls.match_threshold(),
        match_count: controls.match_count(),
    };
    let matches = store
        .match_chunks(&request)
        .context("similarity search failed")?;
    info!(query, found = matches.len(), "search finished");
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, MetadataStamp};
    use crate::embedder::HashingEmbedder;
    use crate::upload::upload_all;
    use crate::vector_store::MemoryStore;

    fn loaded_store(embedder: &HashingEmbedder) -> MemoryStore {
        let store = MemoryStore::new();
        let corpus = Corpus::bundled().unwrap();
        let report = upload_all(&corpus, &MetadataStamp::default(), embedder, &store);
        assert!(report.is_complete());
        store
    }

    #[test]
    fn ethics_chunk_ranks_in_top_three() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let store = loaded_store(&embedder);
        let controls = SearchControls::new(0.0, 3).unwrap();

        let matches = search(DEFAULT_QUERY, &controls, &embedder, &store).unwrap();
        assert_eq!(matches.len(), 3);
        assert!(
            matches
                .iter()
                .any(|m| m.metadata.chunk_id == "core_concepts_ethics_001"),
            "top matches: {:?}",
            matches.iter().map(|m| &m.metadata.chunk_id).collect::<Vec<_>>()
        );
        assert!(matches
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn threshold_above_one_returns_nothing() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let store = loaded_store(&embedder);
        let controls = SearchControls::new(1.1, 8).unwrap();

        let matches = search(DEFAULT_QUERY, &controls, &embedder, &store).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn match_count_caps_results() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let store = loaded_store(&embedder);
        let controls = SearchControls::new(-1.0, 5).unwrap();

        let matches = search("framework", &controls, &embedder, &store).unwrap();
        assert_eq!(matches.len(), 5);
    }
}
