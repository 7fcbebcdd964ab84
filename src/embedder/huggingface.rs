//! Hugging Face Inference feature-extraction client.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{is_retryable_error, retry_backoff, should_retry, Embedder};

/// Default router prefix for serverless inference.
pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Sentence-transformers model the framework corpus is embedded with.
pub const DEFAULT_HF_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Blocking client for a sentence-transformers model served by Hugging Face.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_attempts: usize,
}

impl HuggingFaceEmbedder {
    /// Builds a new feature-extraction client.
    ///
    /// # Arguments
    /// * `token` - Hugging Face access token (usually `HF_TOKEN`)
    /// * `base_url` - Prefix the model id is appended to
    /// * `model` - Model repository id, e.g. `sentence-transformers/all-MiniLM-L6-v2`
    /// * `max_attempts` - Total tries per text; `1` disables retries
    pub fn new(
        token: String,
        base_url: String,
        model: String,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!token.trim().is_empty(), "missing Hugging Face token");
        anyhow::ensure!(!model.trim().is_empty(), "missing Hugging Face model name");
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Hugging Face base URL must be an http(s) URL"
        );
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid Hugging Face token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Hugging Face HTTP client")?;
        let endpoint = format!(
            "{}/{}/pipeline/feature-extraction",
            base_url.trim_end_matches('/'),
            model.trim_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            model,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Embedder for HuggingFaceEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = FeatureExtractionRequest {
            inputs: text,
            options: RequestOptions {
                wait_for_model: true,
            },
        };
        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let payload: FeatureExtraction = resp
                            .json()
                            .context("failed to parse Hugging Face embedding response")?;
                        let vector = payload.into_vector()?;
                        debug!(model = %self.model, dims = vector.len(), "embedded text");
                        return Ok(vector);
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        warn!(%status, attempt, "retrying Hugging Face request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    anyhow::bail!(
                        "Hugging Face embedding request failed ({}): {}",
                        status,
                        body
                    );
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        warn!(error = %err, attempt, "retrying Hugging Face request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err).context("Hugging Face embedding request failed");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

/// The pipeline answers with either one pooled vector or a list of rows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtraction {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl FeatureExtraction {
    fn into_vector(self) -> Result<Vec<f32>> {
        let vector = match self {
            FeatureExtraction::Flat(vector) => vector,
            FeatureExtraction::Nested(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Hugging Face returned no embedding rows"))?,
        };
        anyhow::ensure!(!vector.is_empty(), "Hugging Face returned an empty embedding");
        Ok(vector)
    }
}
