//! Supabase / PostgREST backed store.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::{ChunkMatch, ChunkRow, InsertAck, MatchQuery, QualifiedName, VectorStore};

/// Blocking PostgREST client for the chunk table and its match function.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    insert_url: String,
    rpc_url: String,
    profile: Option<HeaderValue>,
}

impl PostgrestStore {
    /// Builds a client against a Supabase project.
    ///
    /// # Arguments
    /// * `project_url` - Project base URL, e.g. `https://<ref>.supabase.co`
    /// * `api_key` - Key sent as both `apikey` and bearer token
    /// * `table` - Table receiving inserts
    /// * `function` - Similarity function invoked through `/rpc`
    pub fn new(
        project_url: String,
        api_key: String,
        table: &QualifiedName,
        function: &QualifiedName,
        timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(
            project_url.starts_with("http://") || project_url.starts_with("https://"),
            "Supabase URL must be an http(s) URL"
        );
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Supabase API key");
        anyhow::ensure!(
            table.schema() == function.schema(),
            "table and match function must live in the same schema"
        );
        let key = api_key.trim();
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).context("invalid Supabase API key")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).context("invalid Supabase API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Supabase HTTP client")?;

        let rest = format!("{}/rest/v1", project_url.trim_end_matches('/'));
        let profile = if table.schema() == "public" {
            None
        } else {
            Some(HeaderValue::from_str(table.schema()).context("invalid schema name")?)
        };
        Ok(Self {
            client,
            insert_url: format!("{rest}/{}", table.name()),
            rpc_url: format!("{rest}/rpc/{}", function.name()),
            profile,
        })
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let request = self.client.post(url);
        match &self.profile {
            Some(profile) => request.header("Content-Profile", profile.clone()),
            None => request,
        }
    }
}

impl VectorStore for PostgrestStore {
    fn insert(&self, row: &ChunkRow) -> Result<InsertAck> {
        let resp = self
            .post(&self.insert_url)
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .context("Supabase insert request failed")?;
        let resp = ensure_success(resp, "insert")?;
        let rows: Vec<InsertedRow> = resp
            .json()
            .context("failed to parse Supabase insert response")?;
        let row_id = rows.into_iter().next().and_then(|row| row.id);
        debug!(chunk_id = %row.metadata.chunk_id, ?row_id, "row inserted");
        Ok(InsertAck { row_id })
    }

    fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<ChunkMatch>> {
        let resp = self
            .post(&self.rpc_url)
            .json(query)
            .send()
            .context("Supabase match request failed")?;
        let resp = ensure_success(resp, "match")?;
        resp.json()
            .context("failed to parse Supabase match response")
    }
}

fn ensure_success(resp: Response, action: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    match serde_json::from_str::<PostgrestError>(&body) {
        Ok(err) => anyhow::bail!("Supabase {} failed ({}): {}", action, status, err),
        Err(_) => anyhow::bail!("Supabase {} failed ({}): {}", action, status, body),
    }
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    #[serde(default, deserialize_with = "id_to_string")]
    id: Option<String>,
}

/// Error document PostgREST returns for failed requests.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

impl std::fmt::Display for PostgrestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{code} ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Accepts numeric, string or null row identifiers.
pub(crate) fn id_to_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(id)) => Some(id),
        Some(other) => Some(other.to_string()),
    })
}
