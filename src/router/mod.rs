//! Staged intent routing
//!
//! Every request runs the same ordered pipeline and stops at the first stage
//! that yields a response:
//!
//! 1. pattern rules, when the confidence clears its threshold and the intent
//!    is registered
//! 2. semantic lookup on the raw text, executed with no entities
//! 3. model tool selection, with a synthesized reply for tool results and a
//!    chat reply otherwise
//!
//! Earlier stages always win. Skill errors and panics in stages 1 and 2 count
//! as "no response"; any problem in stage 3 ends in a plain streamed chat
//! reply. [`Router::route`] never fails.

mod tool_select;

pub use tool_select::{ToolSelection, chat_prompt, fallback_prompt, selection_prompt, synthesis_prompt};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RoutingConfig;
use crate::model::{GenerateOptions, ModelClient};
use crate::pattern::PatternMatcher;
use crate::response::{CHAT_INTENT, Entities, Intent, MatchResult, SkillResponse};
use crate::skills::{SkillOutcome, SkillRegistry};

/// Which stage produced the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Pattern rule matched a registered intent
    Skill,
    /// Semantic lookup picked this intent
    Semantic(Intent),
    /// Model selected this tool; reply synthesized from its output
    LlmTool(Intent),
    /// Model chat reply, pre-generated or streamed
    LlmChat,
    /// Tool selection was unusable; plain streamed reply
    LlmFallback,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skill => f.write_str("SKILL"),
            Self::Semantic(intent) => write!(f, "SEMANTIC[{intent}]"),
            Self::LlmTool(intent) => write!(f, "LLM-TOOL[{intent}]"),
            Self::LlmChat => f.write_str("LLM-CHAT"),
            Self::LlmFallback => f.write_str("LLM-FALLBACK"),
        }
    }
}

/// A routed response with its classification
#[derive(Debug)]
pub struct Routed {
    pub response: SkillResponse,
    pub kind: RouteKind,
    /// Time to a complete response, or to the stream handle when streaming
    pub latency: Duration,
}

/// The request orchestrator
#[derive(Debug)]
pub struct Router {
    thresholds: RoutingConfig,
    patterns: PatternMatcher,
    registry: Arc<SkillRegistry>,
    model: Arc<ModelClient>,
}

impl Router {
    #[must_use]
    pub const fn new(
        thresholds: RoutingConfig,
        patterns: PatternMatcher,
        registry: Arc<SkillRegistry>,
        model: Arc<ModelClient>,
    ) -> Self {
        Self {
            thresholds,
            patterns,
            registry,
            model,
        }
    }

    /// Registry the router dispatches to
    #[must_use]
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// Route `text` to a response
    pub async fn route(&self, text: &str) -> SkillResponse {
        self.route_traced(text).await.response
    }

    /// Route `text` and report which stage answered
    pub async fn route_traced(&self, text: &str) -> Routed {
        let started = Instant::now();
        let matched = self.patterns.process(text);
        let mut failed = Vec::new();

        let (mut response, kind) = match self.pattern_stage(&matched, &mut failed).await {
            Some(response) => (response, RouteKind::Skill),
            None => match self.semantic_stage(text, &mut failed).await {
                Some((response, intent)) => (response, RouteKind::Semantic(intent)),
                None => self.model_stage(text, &matched, &failed).await,
            },
        };

        if response.has_unknown_intent() && matched.is_known() {
            response.intent.clone_from(&matched.intent);
        }

        let latency = started.elapsed();
        tracing::info!(
            route = %kind,
            intent = %response.intent,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "request handled"
        );

        Routed {
            response,
            kind,
            latency,
        }
    }

    async fn pattern_stage(&self, matched: &MatchResult, failed: &mut Vec<Intent>) -> Option<SkillResponse> {
        if matched.confidence <= self.thresholds.pattern_threshold || !self.registry.contains(&matched.intent) {
            tracing::debug!(intent = %matched.intent, confidence = matched.confidence, "pattern stage skipped");
            return None;
        }

        tracing::info!(intent = %matched.intent, confidence = matched.confidence, "routing to skill");
        self.contained(&matched.intent, &matched.entities, failed).await
    }

    async fn semantic_stage(&self, text: &str, failed: &mut Vec<Intent>) -> Option<(SkillResponse, Intent)> {
        let semantic = self.registry.semantic()?;

        let candidate = match semantic.route(text).await {
            Ok(candidate) => candidate?,
            Err(e) => {
                tracing::error!(error = %e, "semantic routing failed");
                return None;
            }
        };

        if candidate.score <= self.thresholds.semantic_threshold || !self.registry.contains(&candidate.intent) {
            tracing::debug!(intent = %candidate.intent, score = candidate.score, "semantic candidate rejected");
            return None;
        }

        tracing::info!(intent = %candidate.intent, score = candidate.score, "semantic routing");
        let mut response = self.contained(&candidate.intent, &Entities::new(), failed).await?;
        if response.has_unknown_intent() {
            response.intent.clone_from(&candidate.intent);
        }
        Some((response, candidate.intent))
    }

    /// Run a skill, turning errors and panics into "no response"
    async fn contained(&self, intent: &str, entities: &Entities, failed: &mut Vec<Intent>) -> Option<SkillResponse> {
        match self.registry.try_execute(intent, entities).await {
            SkillOutcome::Resolved(response) => Some(response),
            SkillOutcome::Failed(_) => {
                failed.push(intent.to_string());
                None
            }
            SkillOutcome::NotRegistered => None,
        }
    }

    async fn model_stage(&self, text: &str, matched: &MatchResult, failed: &[Intent]) -> (SkillResponse, RouteKind) {
        tracing::info!(intent = %matched.intent, confidence = matched.confidence, "routing to model");
        let assistant = self.model.persona().name();

        let prompt = match selection_prompt(assistant, &self.registry.manifest(), failed, text) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(error = %e, "failed to build tool manifest");
                return self.fallback(text).await;
            }
        };

        let reply = self.model.generate_text(&prompt, GenerateOptions::default()).await;
        let selection = match ToolSelection::parse(&reply) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable tool selection");
                return self.fallback(text).await;
            }
        };

        if let Some(tool) = selection.tool() {
            if self.registry.contains(tool) {
                return self.run_tool(text, tool, &selection.entities()).await;
            }
            tracing::warn!(tool, "model selected an unregistered tool");
        }

        if let Some(reply) = selection.response() {
            return (SkillResponse::text(reply).with_intent(CHAT_INTENT), RouteKind::LlmChat);
        }

        let chunks = self
            .model
            .generate_stream(&chat_prompt(assistant, text), GenerateOptions::streaming())
            .await;
        (SkillResponse::streaming(CHAT_INTENT, chunks), RouteKind::LlmChat)
    }

    async fn run_tool(&self, text: &str, tool: &str, entities: &Entities) -> (SkillResponse, RouteKind) {
        tracing::info!(tool, "model selected tool");
        let mut output = match self.registry.try_execute(tool, entities).await {
            SkillOutcome::Resolved(output) => output,
            SkillOutcome::Failed(e) => {
                tracing::warn!(tool, error = %e, "selected tool failed");
                return self.fallback(text).await;
            }
            SkillOutcome::NotRegistered => return self.fallback(text).await,
        };

        let raw = output.collect_text().await.to_string();
        let chunks = self
            .model
            .generate_stream(&synthesis_prompt(text, tool, &raw), GenerateOptions::streaming())
            .await;

        let mut response = SkillResponse::streaming(tool, chunks);
        response.success = output.success;
        response.data = output.data;
        response.visual = output.visual;
        (response, RouteKind::LlmTool(tool.to_string()))
    }

    async fn fallback(&self, text: &str) -> (SkillResponse, RouteKind) {
        let chunks = self
            .model
            .generate_stream(&fallback_prompt(text), GenerateOptions::streaming())
            .await;
        (SkillResponse::streaming(CHAT_INTENT, chunks), RouteKind::LlmFallback)
    }
}
