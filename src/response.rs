//! Routed response types shared by matchers, skills and the router

use std::collections::BTreeMap;
use std::fmt;

use futures::StreamExt;
use futures::stream::BoxStream;

/// Identifier naming a capability (e.g. `get_weather`)
pub type Intent = String;

/// Slot name to extracted value
pub type Entities = BTreeMap<String, String>;

/// Lazy, single-consumer sequence of text chunks
pub type ChunkStream = BoxStream<'static, String>;

/// Intent sentinel for "nothing matched"
pub const UNKNOWN_INTENT: &str = "unknown";

/// Intent label for model-generated chat replies
pub const CHAT_INTENT: &str = "chat";

/// Intent that tells the conversation driver to stop
pub const EXIT_INTENT: &str = "exit";

/// Output of the pattern or semantic matcher
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub intent: Intent,
    pub entities: Entities,
    /// 1.0 for a deterministic pattern hit, similarity-derived for semantic hits
    pub confidence: f32,
}

impl MatchResult {
    /// The no-match result: unknown intent, no entities, zero confidence
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            entities: Entities::new(),
            confidence: 0.0,
        }
    }

    /// Whether the matcher produced a concrete intent
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.intent != UNKNOWN_INTENT
    }
}

/// Response produced by a skill or by the router's model stage
///
/// When `streaming` is false, `text` is the complete reply. When it is true,
/// `text` starts empty and is filled by draining `chunks` exactly once.
pub struct SkillResponse {
    pub text: String,
    pub intent: Intent,
    pub success: bool,
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Display hint for a UI (image path, card name, ...)
    pub visual: Option<String>,
    pub streaming: bool,
    chunks: Option<ChunkStream>,
}

impl SkillResponse {
    /// Successful, complete text response with the unknown intent label
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent: UNKNOWN_INTENT.to_string(),
            success: true,
            data: serde_json::Map::new(),
            visual: None,
            streaming: false,
            chunks: None,
        }
    }

    /// Failed response; the text explains the failure to the user
    #[must_use]
    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::text(text)
        }
    }

    /// Streaming response whose text arrives through `chunks`
    #[must_use]
    pub fn streaming(intent: impl Into<Intent>, chunks: ChunkStream) -> Self {
        Self {
            text: String::new(),
            intent: intent.into(),
            success: true,
            data: serde_json::Map::new(),
            visual: None,
            streaming: true,
            chunks: Some(chunks),
        }
    }

    /// Set the intent label
    #[must_use]
    pub fn with_intent(mut self, intent: impl Into<Intent>) -> Self {
        self.intent = intent.into();
        self
    }

    /// Attach a structured data field
    #[must_use]
    pub fn with_data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Attach a visual hint
    #[must_use]
    pub fn with_visual(mut self, visual: impl Into<String>) -> Self {
        self.visual = Some(visual.into());
        self
    }

    /// Whether the intent label is still the unknown sentinel
    #[must_use]
    pub fn has_unknown_intent(&self) -> bool {
        self.intent == UNKNOWN_INTENT
    }

    /// Take the chunk stream, leaving `None` behind
    ///
    /// The stream is forward-only and not restartable; a second call returns `None`.
    pub fn take_stream(&mut self) -> Option<ChunkStream> {
        self.chunks.take()
    }

    /// Drain the chunk stream (if any) into `text` and return the final text
    ///
    /// Calls `on_chunk` for every chunk as it arrives. Non-streaming responses
    /// return their text unchanged.
    pub async fn drain_with<F>(&mut self, mut on_chunk: F) -> &str
    where
        F: FnMut(&str),
    {
        if let Some(mut chunks) = self.chunks.take() {
            while let Some(chunk) = chunks.next().await {
                on_chunk(&chunk);
                self.text.push_str(&chunk);
            }
        }
        &self.text
    }

    /// Drain the chunk stream (if any) and return the final text
    pub async fn collect_text(&mut self) -> &str {
        self.drain_with(|_| {}).await
    }
}

impl fmt::Debug for SkillResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillResponse")
            .field("text", &self.text)
            .field("intent", &self.intent)
            .field("success", &self.success)
            .field("data", &self.data)
            .field("visual", &self.visual)
            .field("streaming", &self.streaming)
            .field("chunks_pending", &self.chunks.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streaming_text_is_concatenation_of_chunks() {
        let chunks = futures::stream::iter(vec!["Hel".to_string(), "lo".to_string(), "!".to_string()]);
        let mut response = SkillResponse::streaming(CHAT_INTENT, chunks.boxed());
        assert!(response.text.is_empty());

        let mut seen = Vec::new();
        let text = response.drain_with(|c| seen.push(c.to_string())).await.to_string();
        assert_eq!(text, "Hello!");
        assert_eq!(seen.concat(), text);
    }

    #[tokio::test]
    async fn stream_is_drained_once() {
        let chunks = futures::stream::iter(vec!["a".to_string()]);
        let mut response = SkillResponse::streaming(CHAT_INTENT, chunks.boxed());
        assert_eq!(response.collect_text().await, "a");
        assert!(response.take_stream().is_none());
        assert_eq!(response.collect_text().await, "a");
    }

    #[test]
    fn failure_defaults() {
        let response = SkillResponse::failure("nope");
        assert!(!response.success);
        assert!(!response.streaming);
        assert!(response.has_unknown_intent());
    }
}
