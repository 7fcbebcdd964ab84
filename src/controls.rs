//! Command-line configuration and the dependencies built from it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::corpus::{Corpus, MetadataStamp};
use crate::embedder::huggingface::{DEFAULT_HF_BASE_URL, DEFAULT_HF_MODEL};
use crate::embedder::{Embedder, HashingEmbedder, HuggingFaceEmbedder, OpenAiEmbedder};
use crate::schema::SchemaPlan;
use crate::search::DEFAULT_QUERY;
use crate::vector_store::{
    MemoryStore, PgVectorStore, PostgrestStore, QualifiedName, VectorStore,
    DEFAULT_MATCH_FUNCTION, DEFAULT_TABLE,
};

/// Threshold and result cap passed to the match function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchControls {
    match_threshold: f64,
    match_count: usize,
}

impl SearchControls {
    /// Validates and builds search controls.
    pub fn new(match_threshold: f64, match_count: usize) -> Result<Self> {
        anyhow::ensure!(match_threshold.is_finite(), "match threshold must be finite");
        anyhow::ensure!(match_count > 0, "match count must be at least 1");
        Ok(Self {
            match_threshold,
            match_count,
        })
    }

    /// Minimum similarity returned.
    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    /// Maximum rows returned.
    pub fn match_count(&self) -> usize {
        self.match_count
    }
}

impl Default for SearchControls {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            match_count: 3,
        }
    }
}

/// Which store receives uploads and answers searches.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StoreKind {
    /// Supabase REST API (table insert + `/rpc` match function).
    Postgrest,
    /// Direct Postgres connection with the pgvector extension.
    Pgvector,
    /// In-process rows, discarded on exit.
    Memory,
}

/// Which provider turns text into vectors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbedderKind {
    /// Hugging Face feature-extraction pipeline.
    Huggingface,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
    /// Offline feature hashing.
    Hashing,
}

/// Top-level CLI.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "framework-vectorizer",
    about = "Embed framework chunks, load them into a vector store and probe similarity search"
)]
pub struct Cli {
    /// Operation to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Query, threshold and result cap for the search probe
    #[command(flatten)]
    pub search: SearchArgs,

    /// Store, embedder and corpus options
    #[command(flatten)]
    pub options: Options,

    /// Log debug output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Upload the corpus, then run the search probe
    Run,
    /// Upload the corpus only
    Upload,
    /// Run the search probe only
    Search,
    /// Print SQL that creates the chunk table and match function
    Schema {
        /// Embedding width declared on the table
        #[arg(long, env = "VECTORIZER_DIMENSIONS", default_value_t = 384)]
        dimensions: usize,
    },
}

impl Cli {
    /// Subcommand to execute; bare invocations run the full pipeline.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// Search probe arguments.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Text to search for
    #[arg(long, global = true, env = "VECTORIZER_QUERY", default_value = DEFAULT_QUERY)]
    pub query: String,

    /// Minimum similarity a match must reach
    #[arg(long, global = true, env = "VECTORIZER_MATCH_THRESHOLD", default_value_t = 0.3)]
    pub match_threshold: f64,

    /// Maximum number of matches returned
    #[arg(long, global = true, env = "VECTORIZER_MATCH_COUNT", default_value_t = 3)]
    pub match_count: usize,
}

impl SearchArgs {
    /// Converts the parsed arguments into `SearchControls`.
    pub fn controls(&self) -> Result<SearchControls> {
        SearchControls::new(self.match_threshold, self.match_count)
    }
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Options {
    /// JSON array of chunks to upload (bundled corpus when omitted)
    #[arg(long, global = true, env = "VECTORIZER_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// Store backend
    #[arg(long, global = true, env = "VECTORIZER_STORE", value_enum, default_value = "postgrest")]
    pub store: StoreKind,

    /// Supabase project URL
    #[arg(long, global = true, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, global = true, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Postgres connection string (postgres://...)
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Create the pgvector extension, table and match function before uploading
    #[arg(long, global = true, env = "VECTORIZER_PREPARE_SCHEMA", default_value_t = false)]
    pub prepare_schema: bool,

    /// Schema holding the table and match function
    #[arg(long = "db-schema", global = true, env = "VECTORIZER_DB_SCHEMA", default_value = "public")]
    pub db_schema: String,

    /// Table receiving chunk rows
    #[arg(long, global = true, env = "VECTORIZER_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Server-side similarity function
    #[arg(long, global = true, env = "VECTORIZER_MATCH_FUNCTION", default_value = DEFAULT_MATCH_FUNCTION)]
    pub match_function: String,

    /// Embedding provider
    #[arg(long, global = true, env = "VECTORIZER_EMBEDDER", value_enum, default_value = "huggingface")]
    pub embedder: EmbedderKind,

    /// Hugging Face access token
    #[arg(long, global = true, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Hugging Face model id
    #[arg(long, global = true, env = "VECTORIZER_HF_MODEL", default_value = DEFAULT_HF_MODEL)]
    pub hf_model: String,

    /// Hugging Face inference base URL
    #[arg(long, global = true, env = "VECTORIZER_HF_BASE", default_value = DEFAULT_HF_BASE_URL)]
    pub hf_base_url: String,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI embedding model
    #[arg(long, global = true, env = "VECTORIZER_OPENAI_MODEL", default_value = "text-embedding-3-small")]
    pub openai_model: String,

    /// Base URL for the OpenAI-compatible API
    #[arg(long, global = true, env = "VECTORIZER_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Optional dimension override when supported by the model
    #[arg(long, global = true, env = "VECTORIZER_OPENAI_DIMENSIONS")]
    pub openai_dimensions: Option<usize>,

    /// Output width of the hashing embedder
    #[arg(long, global = true, env = "VECTORIZER_HASHING_DIMENSIONS", default_value_t = 384)]
    pub hashing_dimensions: usize,

    /// Seconds before HTTP requests time out
    #[arg(long, global = true, env = "VECTORIZER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Tries per embedding request (1 disables retries)
    #[arg(long, global = true, env = "VECTORIZER_MAX_ATTEMPTS", default_value_t = 1)]
    pub max_attempts: usize,

    /// Author stamped into chunk metadata
    #[arg(long, global = true, env = "VECTORIZER_AUTHOR", default_value = "Lenise Kenney")]
    pub author: String,

    /// Framework name stamped into chunk metadata
    #[arg(long, global = true, env = "VECTORIZER_FRAMEWORK", default_value = "SHE IS AI")]
    pub framework: String,
}

impl Options {
    /// Loads the corpus file, or the bundled corpus.
    pub fn load_corpus(&self) -> Result<Corpus> {
        match &self.corpus {
            Some(path) => Corpus::from_path(path),
            None => Corpus::bundled(),
        }
    }

    /// Attribution fields for metadata.
    pub fn stamp(&self) -> MetadataStamp {
        MetadataStamp::new(self.author.clone(), self.framework.clone())
    }

    /// Qualified chunk table.
    pub fn table_name(&self) -> Result<QualifiedName> {
        QualifiedName::new(self.db_schema.clone(), self.table.clone())
    }

    /// Qualified match function.
    pub fn function_name(&self) -> Result<QualifiedName> {
        QualifiedName::new(self.db_schema.clone(), self.match_function.clone())
    }

    /// Schema statements for embeddings of `dimensions` floats.
    pub fn schema_plan(&self, dimensions: usize) -> Result<SchemaPlan> {
        SchemaPlan::new(self.table_name()?, self.function_name()?, dimensions)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Builds the configured embedding provider.
    pub fn build_embedder(&self) -> Result<Box<dyn Embedder>> {
        let embedder: Box<dyn Embedder> = match self.embedder {
            EmbedderKind::Huggingface => Box::new(HuggingFaceEmbedder::new(
                required(&self.hf_token, "--hf-token / HF_TOKEN")?,
                self.hf_base_url.clone(),
                self.hf_model.clone(),
                self.timeout(),
                self.max_attempts,
            )?),
            EmbedderKind::Openai => Box::new(OpenAiEmbedder::new(
                required(&self.openai_api_key, "--openai-api-key / OPENAI_API_KEY")?,
                self.openai_base_url.clone(),
                self.openai_model.clone(),
                self.openai_dimensions,
                self.timeout(),
                self.max_attempts,
            )?),
            EmbedderKind::Hashing => Box::new(HashingEmbedder::new(self.hashing_dimensions)?),
        };
        Ok(embedder)
    }

    /// Builds the configured store, preparing the schema when requested.
    pub fn build_store(&self) -> Result<Box<dyn VectorStore>> {
        let table = self.table_name()?;
        let function = self.function_name()?;
        let store: Box<dyn VectorStore> = match self.store {
            StoreKind::Postgrest => Box::new(PostgrestStore::new(
                required(&self.supabase_url, "--supabase-url / SUPABASE_URL")?,
                required(&self.supabase_key, "--supabase-key / SUPABASE_KEY")?,
                &table,
                &function,
                self.timeout(),
            )?),
            StoreKind::Pgvector => {
                let url = required(&self.database_url, "--database-url / DATABASE_URL")?;
                let store = PgVectorStore::connect(&url, &table, &function)?;
                if self.prepare_schema {
                    store.prepare(&self.schema_plan(self.embedding_dimensions())?)?;
                }
                Box::new(store)
            }
            StoreKind::Memory => Box::new(MemoryStore::new()),
        };
        Ok(store)
    }

    /// Width the configured provider is expected to produce.
    pub fn embedding_dimensions(&self) -> usize {
        match self.embedder {
            EmbedderKind::Hashing => self.hashing_dimensions,
            EmbedderKind::Openai => self.openai_dimensions.unwrap_or(1536),
            EmbedderKind::Huggingface => 384,
        }
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .with_context(|| format!("{name} is required for the selected backend"))
}
