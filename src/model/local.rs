//! Ollama-compatible local generation backend

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use super::stream::{LineChunk, line_stream};
use super::{ModelBackend, ModelRequest};
use crate::Result;
use crate::response::ChunkStream;

/// Default generate endpoint
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434/api/generate";

/// Default local model
pub const DEFAULT_LOCAL_MODEL: &str = "llama3";

/// Default bound on a request, and on each read of a streamed reply
pub const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Model served on the local machine
///
/// The system prompt is folded into the prompt text since the generate
/// endpoint takes a single prompt. The requested model name is ignored; the
/// configured local model is always used.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

impl LocalBackend {
    /// Create a backend for the given generate endpoint
    ///
    /// Complete calls are bounded by `timeout` overall. Streams are bounded
    /// per read, so a server that stalls mid-reply ends the stream.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    fn body(&self, request: &ModelRequest, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "prompt": format!("System: {}\nUser: {}", request.system_prompt, request.prompt),
            "stream": stream,
        })
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.body(request, false))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "local model returned error status");
            return Ok(status_message(status));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response.trim().to_string())
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.body(request, true))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "local model returned error status");
            return Ok(futures::stream::once(async move { status_message(status) }).boxed());
        }

        Ok(line_stream(response, parse_ndjson_line))
    }
}

fn status_message(status: reqwest::StatusCode) -> String {
    format!("Local model error: {}", status.as_u16())
}

/// Decode one newline-delimited JSON object of a generate stream
pub(crate) fn parse_ndjson_line(line: &str) -> LineChunk {
    if line.is_empty() {
        return LineChunk::Skip;
    }
    match serde_json::from_str::<GenerateResponse>(line) {
        Ok(chunk) if !chunk.response.is_empty() => LineChunk::Text(chunk.response),
        Ok(chunk) if chunk.done => LineChunk::Done,
        Ok(_) => LineChunk::Skip,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed stream line");
            LineChunk::Skip
        }
    }
}
