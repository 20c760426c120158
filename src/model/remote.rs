//! `OpenAI`-compatible chat completions backend

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::stream::{LineChunk, line_stream};
use super::{ModelBackend, ModelRequest};
use crate::response::ChunkStream;
use crate::{Error, Result};

/// Default API base URL
pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-3.5-turbo";

/// Default bound on a remote request, and on each read of a streamed reply
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted model reached over `/chat/completions`
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteBackend {
    /// Create a backend for the given credential
    ///
    /// # Errors
    ///
    /// A server that stops answering for longer than `timeout` fails the
    /// request, which sends the caller on to the local tier.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: SecretString, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("API key required for remote model".to_string()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    async fn send(&self, request: &ModelRequest, stream: bool) -> Result<reqwest::Response> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "stream": stream,
        });

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        // Streams may run long overall; only their individual reads are bounded
        if !stream {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!("remote model returned {status}: {text}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let response: ChatResponse = self.send(request, false).await?.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Model("remote model returned no choices".to_string()))?;
        Ok(content.trim().to_string())
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let response = self.send(request, true).await?;
        Ok(line_stream(response, parse_sse_line))
    }
}

/// Decode one server-sent-events line of a chat completion stream
pub(crate) fn parse_sse_line(line: &str) -> LineChunk {
    let Some(data) = line.strip_prefix("data:") else {
        return LineChunk::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return LineChunk::Done;
    }

    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => event
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .map_or(LineChunk::Skip, LineChunk::Text),
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed stream event");
            LineChunk::Skip
        }
    }
}
