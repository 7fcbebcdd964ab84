//! Text embedding providers.

use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;

pub mod hashing;
pub mod huggingface;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use huggingface::HuggingFaceEmbedder;
pub use openai::OpenAiEmbedder;

/// Turns text into a fixed-length vector.
///
/// Implementations pass the text through untouched; callers own any
/// truncation policy.
pub trait Embedder {
    /// Model identifier reported in logs.
    fn model(&self) -> &str;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub(crate) fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

pub(crate) fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}
