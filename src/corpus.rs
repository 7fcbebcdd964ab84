//! Framework chunk definitions and corpus loading.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BUNDLED_CORPUS: &str = include_str!("../data/framework_chunks.json");

/// One unit of framework text plus its classification labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, unique within a corpus.
    pub chunk_id: String,
    /// Free-text category label.
    pub category: String,
    /// Intended audience label.
    pub educational_level: String,
    /// Kind of material the chunk holds.
    pub content_type: String,
    /// Body text that gets embedded and stored.
    pub content: String,
}

impl Chunk {
    /// Builds the metadata record stored next to the chunk content.
    pub fn metadata(&self, stamp: &MetadataStamp) -> ChunkMetadata {
        ChunkMetadata {
            chunk_id: self.chunk_id.clone(),
            category: self.category.clone(),
            educational_level: self.educational_level.clone(),
            content_type: self.content_type.clone(),
            author: stamp.author.clone(),
            framework: stamp.framework.clone(),
        }
    }
}

/// Constant attribution fields stamped onto every uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStamp {
    /// Author credited in the metadata.
    pub author: String,
    /// Framework name recorded in the metadata.
    pub framework: String,
}

impl MetadataStamp {
    /// Creates a stamp from the two attribution strings.
    pub fn new(author: impl Into<String>, framework: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            framework: framework.into(),
        }
    }
}

impl Default for MetadataStamp {
    fn default() -> Self {
        Self::new("Lenise Kenney", "SHE IS AI")
    }
}

/// Metadata document stored in the `metadata` column.
///
/// Fields default to empty strings when decoding so rows written by other
/// tools still deserialize during search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Identifier copied from the chunk.
    #[serde(default)]
    pub chunk_id: String,
    /// Category copied from the chunk.
    #[serde(default)]
    pub category: String,
    /// Educational level copied from the chunk.
    #[serde(default)]
    pub educational_level: String,
    /// Content type copied from the chunk.
    #[serde(default)]
    pub content_type: String,
    /// Attribution author.
    #[serde(default)]
    pub author: String,
    /// Attribution framework name.
    #[serde(default)]
    pub framework: String,
}

/// Ordered, read-only list of chunks with unique identifiers.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<Chunk>,
}

impl Corpus {
    /// Wraps a list of chunks, rejecting duplicate identifiers.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            anyhow::ensure!(
                !chunk.chunk_id.trim().is_empty(),
                "chunk with empty chunk_id in corpus"
            );
            anyhow::ensure!(
                seen.insert(chunk.chunk_id.as_str()),
                "duplicate chunk_id {:?} in corpus",
                chunk.chunk_id
            );
        }
        Ok(Self { chunks })
    }

    /// Corpus shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CORPUS).context("bundled corpus is invalid")
    }

    /// Parses a JSON array of chunks.
    pub fn from_json(raw: &str) -> Result<Self> {
        let chunks: Vec<Chunk> =
            serde_json::from_str(raw).context("corpus must be a JSON array of chunks")?;
        Self::new(chunks)
    }

    /// Reads a JSON corpus file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("invalid corpus {:?}", path))
    }

    /// Chunks in upload order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
