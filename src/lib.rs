#![warn(missing_docs)]
//! Embeds framework text chunks and loads them into a pgvector-backed store.

pub mod controls;
pub mod corpus;
pub mod embedder;
pub mod report;
pub mod schema;
pub mod search;
pub mod upload;
pub mod vector_store;

pub use controls::{Cli, Command, SearchControls};
pub use corpus::{Chunk, ChunkMetadata, Corpus, MetadataStamp};
pub use embedder::Embedder;
pub use schema::SchemaPlan;
pub use search::search;
pub use upload::{
    upload_all, upload_all_with_progress, upload_chunk, ChunkOutcome, UploadReport, UploadStatus,
};
pub use vector_store::{ChunkMatch, ChunkRow, InsertAck, MatchQuery, QualifiedName, VectorStore};
