use std::cell::Cell;

use anyhow::Result;
use framework_vectorizer::embedder::HashingEmbedder;
use framework_vectorizer::vector_store::MemoryStore;
use framework_vectorizer::{
    search, upload_all, ChunkMatch, ChunkRow, Corpus, Embedder, InsertAck, MatchQuery,
    MetadataStamp, SearchControls, UploadStatus, VectorStore,
};

/// Fails for one specific text, embeds everything else with feature hashing.
struct FlakyEmbedder {
    inner: HashingEmbedder,
    poison: String,
}

impl Embedder for FlakyEmbedder {
    fn model(&self) -> &str {
        "flaky"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        anyhow::ensure!(text != self.poison, "provider unavailable");
        self.inner.embed(text)
    }
}

/// Counts inserts without storing anything.
#[derive(Default)]
struct CountingStore {
    inserts: Cell<usize>,
}

impl VectorStore for CountingStore {
    fn insert(&self, _row: &ChunkRow) -> Result<InsertAck> {
        self.inserts.set(self.inserts.get() + 1);
        Ok(InsertAck::default())
    }

    fn match_chunks(&self, _query: &MatchQuery) -> Result<Vec<ChunkMatch>> {
        Ok(Vec::new())
    }
}

fn hashing() -> HashingEmbedder {
    HashingEmbedder::new(384).expect("hashing embedder")
}

#[test]
fn one_failing_chunk_out_of_eight() {
    let corpus = Corpus::bundled().unwrap();
    assert_eq!(corpus.len(), 8);
    let poisoned = &corpus.chunks()[3];
    let embedder = FlakyEmbedder {
        inner: hashing(),
        poison: poisoned.content.clone(),
    };
    let store = MemoryStore::new();

    let report = upload_all(&corpus, &MetadataStamp::default(), &embedder, &store);

    assert_eq!(report.successful(), 7);
    assert_eq!(report.failed(), 1);
    assert_eq!(store.len(), 7);
    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| !o.is_uploaded())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].chunk_id, poisoned.chunk_id);
    match &failed[0].status {
        UploadStatus::Failed(msg) => assert!(msg.contains("provider unavailable"), "{msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
    // chunks after the failure still ran
    assert!(report.outcomes[4..].iter().all(|o| o.is_uploaded()));
}

#[test]
fn reruns_duplicate_rows() {
    let corpus = Corpus::bundled().unwrap();
    let embedder = hashing();
    let store = MemoryStore::new();

    for run in 1..=3 {
        let report = upload_all(&corpus, &MetadataStamp::default(), &embedder, &store);
        assert!(report.is_complete());
        assert_eq!(store.len(), corpus.len() * run);
    }
    for chunk in corpus.chunks() {
        assert_eq!(store.count_chunk(&chunk.chunk_id), 3);
    }
}

#[test]
fn empty_corpus_makes_no_inserts() {
    let corpus = Corpus::from_json("[]").unwrap();
    let store = CountingStore::default();

    let report = upload_all(&corpus, &MetadataStamp::default(), &hashing(), &store);

    assert_eq!(report.successful(), 0);
    assert_eq!(report.failed(), 0);
    assert_eq!(store.inserts.get(), 0);
}

#[test]
fn unreachable_threshold_yields_no_matches() {
    let corpus = Corpus::bundled().unwrap();
    let embedder = hashing();
    let store = MemoryStore::new();
    upload_all(&corpus, &MetadataStamp::default(), &embedder, &store);

    for query in ["bias in AI education", "facilitator training", "quality assurance"] {
        let controls = SearchControls::new(1.1, 8).unwrap();
        let matches = search(query, &controls, &embedder, &store).unwrap();
        assert!(matches.is_empty(), "{query} returned {} matches", matches.len());
    }
}

#[test]
fn search_finds_ethics_chunk_for_bias_query() {
    let corpus = Corpus::bundled().unwrap();
    let embedder = hashing();
    let store = MemoryStore::new();
    upload_all(&corpus, &MetadataStamp::default(), &embedder, &store);

    let controls = SearchControls::new(0.1, 3).unwrap();
    let matches = search("bias in AI education", &controls, &embedder, &store).unwrap();
    let ids: Vec<_> = matches.iter().map(|m| m.metadata.chunk_id.as_str()).collect();
    assert!(ids.contains(&"core_concepts_ethics_001"), "top 3: {ids:?}");
    assert!(matches.iter().all(|m| m.metadata.author == "Lenise Kenney"));
}
