//! Tiered language-model access
//!
//! Requests go to the remote backend when one is configured and the
//! connectivity probe passes, fall back to the local backend on any remote
//! failure, and end in a fixed diagnostic when the local backend is
//! unreachable too. Callers never see an error.

mod local;
mod probe;
mod remote;
mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

pub use local::{DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_TIMEOUT, DEFAULT_LOCAL_URL, LocalBackend};
pub use probe::{ConnectivityProbe, DEFAULT_PROBE_URL, HttpProbe, StaticProbe};
pub use remote::{DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_TIMEOUT, DEFAULT_REMOTE_URL, RemoteBackend};
pub use stream::{LineChunk, line_stream};

use crate::Result;
use crate::persona::Persona;
use crate::response::ChunkStream;

/// Reply used when no backend can be reached
pub const OFFLINE_DIAGNOSTIC: &str =
    "I'm offline and can't reach the local model. Please make sure it is running.";

/// Default completion length
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Per-call generation settings
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Remote model override; the local backend always uses its own model
    pub model: Option<String>,
    /// Overrides the client's configured completion length
    pub max_tokens: Option<u32>,
    /// Replaces the persona prompt for this call
    pub system_prompt: Option<String>,
    pub stream: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            system_prompt: None,
            stream: false,
        }
    }
}

impl GenerateOptions {
    /// Default options with streaming enabled
    #[must_use]
    pub fn streaming() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Fully resolved request handed to a backend
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: u32,
}

/// Result of a generation call
pub enum Generation {
    Text(String),
    Stream(ChunkStream),
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl Generation {
    /// Collect into a single string, draining a stream if needed
    pub async fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Stream(chunks) => chunks.collect::<Vec<_>>().await.concat(),
        }
    }

    /// View as a chunk stream; text becomes a single chunk
    #[must_use]
    pub fn into_stream(self) -> ChunkStream {
        match self {
            Self::Text(text) => futures::stream::once(async move { text }).boxed(),
            Self::Stream(chunks) => chunks,
        }
    }
}

/// Strip a Markdown code fence around model output
///
/// Returns the body of the first ```` ```json ```` block, else of the first
/// plain ```` ``` ```` block, else the trimmed input.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let body = if let Some((_, rest)) = text.split_once("```json") {
        rest
    } else if let Some((_, rest)) = text.split_once("```") {
        rest
    } else {
        return text;
    };
    body.split_once("```").map_or(body, |(inner, _)| inner).trim()
}

/// A model endpoint
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    /// Generate a complete reply
    async fn complete(&self, request: &ModelRequest) -> Result<String>;

    /// Open a reply stream; errors cover failures before the first chunk
    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream>;
}

/// Tiered client used by the router and by skills that need the model
#[derive(Clone)]
pub struct ModelClient {
    remote: Option<Arc<dyn ModelBackend>>,
    local: Arc<dyn ModelBackend>,
    probe: Arc<dyn ConnectivityProbe>,
    persona: Arc<Persona>,
    max_tokens: u32,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("remote", &self.remote.as_ref().map(|b| b.name()))
            .field("local", &self.local.name())
            .field("persona", &self.persona.name())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ModelClient {
    /// Build a client; `remote` is `None` when no credential is configured
    #[must_use]
    pub fn new(
        remote: Option<Arc<dyn ModelBackend>>,
        local: Arc<dyn ModelBackend>,
        probe: Arc<dyn ConnectivityProbe>,
        persona: Arc<Persona>,
    ) -> Self {
        Self {
            remote,
            local,
            probe,
            persona,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Set the default completion length
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Persona supplying the default system prompt
    #[must_use]
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Generate a reply to `prompt`
    pub async fn generate(&self, prompt: &str, options: GenerateOptions) -> Generation {
        let stream = options.stream;
        let request = self.request(prompt, options).await;

        if stream {
            Generation::Stream(self.stream_request(&request).await)
        } else {
            Generation::Text(self.complete_request(&request).await)
        }
    }

    /// Generate a complete text reply
    pub async fn generate_text(&self, prompt: &str, options: GenerateOptions) -> String {
        let request = self.request(prompt, options).await;
        self.complete_request(&request).await
    }

    /// Generate a streamed reply
    pub async fn generate_stream(&self, prompt: &str, options: GenerateOptions) -> ChunkStream {
        let request = self.request(prompt, options).await;
        self.stream_request(&request).await
    }

    async fn request(&self, prompt: &str, options: GenerateOptions) -> ModelRequest {
        let system_prompt = match options.system_prompt {
            Some(prompt) => prompt,
            None => self.persona.system_prompt().await,
        };
        ModelRequest {
            system_prompt,
            prompt: prompt.to_string(),
            model: options.model,
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
        }
    }

    async fn remote_tier(&self) -> Option<&Arc<dyn ModelBackend>> {
        let remote = self.remote.as_ref()?;
        if self.probe.is_online().await {
            Some(remote)
        } else {
            tracing::info!("offline, using local model");
            None
        }
    }

    async fn complete_request(&self, request: &ModelRequest) -> String {
        if let Some(remote) = self.remote_tier().await {
            match remote.complete(request).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(backend = remote.name(), error = %e, "remote model failed, falling back to local");
                }
            }
        }

        match self.local.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(backend = self.local.name(), error = %e, "local model unreachable");
                OFFLINE_DIAGNOSTIC.to_string()
            }
        }
    }

    async fn stream_request(&self, request: &ModelRequest) -> ChunkStream {
        if let Some(remote) = self.remote_tier().await {
            match remote.stream(request).await {
                Ok(chunks) => return chunks,
                Err(e) => {
                    tracing::warn!(backend = remote.name(), error = %e, "remote stream failed, falling back to local");
                }
            }
        }

        match self.local.stream(request).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(backend = self.local.name(), error = %e, "local model unreachable");
                futures::stream::once(async { OFFLINE_DIAGNOSTIC.to_string() }).boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Echo(&'static str);

    #[async_trait]
    impl ModelBackend for Echo {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn complete(&self, request: &ModelRequest) -> Result<String> {
            Ok(format!("{}|{}|{}", self.0, request.system_prompt, request.prompt))
        }

        async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
            let parts = vec![self.0.to_string(), ":".to_string(), request.prompt.clone()];
            Ok(futures::stream::iter(parts).boxed())
        }
    }

    struct Down;

    #[async_trait]
    impl ModelBackend for Down {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<String> {
            Err(Error::Model("connection refused".to_string()))
        }

        async fn stream(&self, _request: &ModelRequest) -> Result<ChunkStream> {
            Err(Error::Model("connection refused".to_string()))
        }
    }

    fn client(remote: Option<Arc<dyn ModelBackend>>, local: Arc<dyn ModelBackend>, online: bool) -> ModelClient {
        ModelClient::new(
            remote,
            local,
            Arc::new(StaticProbe(online)),
            Arc::new(Persona::new("T", "sys")),
        )
    }

    #[tokio::test]
    async fn remote_used_when_online() {
        let c = client(Some(Arc::new(Echo("remote"))), Arc::new(Echo("local")), true);
        assert_eq!(c.generate_text("hi", GenerateOptions::default()).await, "remote|sys|hi");
    }

    #[tokio::test]
    async fn system_prompt_override() {
        let c = client(None, Arc::new(Echo("local")), true);
        let options = GenerateOptions::default().with_system_prompt("custom");
        assert_eq!(c.generate_text("hi", options).await, "local|custom|hi");
    }

    #[tokio::test]
    async fn stream_generation_yields_chunks() {
        let c = client(None, Arc::new(Echo("local")), false);
        let generation = c.generate("hi", GenerateOptions::streaming()).await;
        assert!(matches!(generation, Generation::Stream(_)));
        assert_eq!(generation.into_text().await, "local:hi");
    }

    #[tokio::test]
    async fn all_tiers_down_gives_diagnostic() {
        let c = client(Some(Arc::new(Down)), Arc::new(Down), true);
        assert_eq!(c.generate_text("hi", GenerateOptions::default()).await, OFFLINE_DIAGNOSTIC);

        let chunks: Vec<String> = c.generate_stream("hi", GenerateOptions::default()).await.collect().await;
        assert_eq!(chunks, vec![OFFLINE_DIAGNOSTIC.to_string()]);
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("Sure:\n```\n[1]\n```\nDone"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{}"), "{}");
    }

    #[tokio::test]
    async fn text_generation_as_stream() {
        let chunks: Vec<String> = Generation::Text("whole".to_string()).into_stream().collect().await;
        assert_eq!(chunks, vec!["whole".to_string()]);
    }
}
