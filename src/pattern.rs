//! Regex-based intent and entity extraction
//!
//! Rules are evaluated in order and the first match wins, so more specific
//! patterns must precede the general catch-alls (`weather in X` before
//! `weather`). A hit is always confidence 1.0; no hit is `unknown` at 0.0.

use std::sync::OnceLock;

use regex::Regex;

use crate::response::{Entities, MatchResult};
use crate::{Error, Result};

/// Filler phrases stripped before matching
pub const FILLER_WORDS: &[&str] = &[
    "uh",
    "um",
    "please",
    "can you",
    "could you",
    "i want to",
    "just",
    "actually",
    "really",
    "quickly",
];

/// Default rules as `(pattern, intent, slot)`; an empty slot extracts nothing
const DEFAULT_RULES: &[(&str, &str, &str)] = &[
    (r"what time is it|current time|tell me the time", "get_time", ""),
    (r"what is the date|what's the date|current date|today's date", "get_date", ""),
    (r"weather in (?P<location>.*)", "get_weather", "location"),
    (r"weather for (?P<location>.*)", "get_weather", "location"),
    (r"weather", "get_weather", "location"),
    (r"reload (?:the |all )?skills", "reload_skills", ""),
    (r"set (?:the )?log level to (?P<level>\w+)", "set_log_level", "level"),
    (r"play (?P<query>.*) on youtube", "play_youtube", "query"),
    (r"play (?P<query>.*)", "play_youtube", "query"),
    (r"search for (?P<query>.*) on google", "google_search", "query"),
    (r"search google for (?P<query>.*)", "google_search", "query"),
    (r"search (?P<query>.*)", "google_search", "query"),
    (r"\bopen (?P<app_name>.+)", "open_app", "app_name"),
    (r"\b(?:close|quit) (?P<app_name>.+)", "close_app", "app_name"),
    (r"who am i", "get_profile", ""),
    (r"hello|hi there|hey jarvis", "greet", ""),
    (r"goodbye|bye|exit|shut down|terminate", "exit", ""),
];

/// A single ordered matching rule
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    intent: String,
    slot: Option<String>,
}

impl PatternRule {
    /// Compile a rule; matching is case-insensitive
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is not a valid regex
    pub fn new(pattern: &str, intent: &str, slot: &str) -> Result<Self> {
        let regex = Regex::new(&format!("(?i){pattern}"))
            .map_err(|e| Error::Config(format!("invalid pattern for {intent}: {e}")))?;
        Ok(Self {
            regex,
            intent: intent.to_string(),
            slot: (!slot.is_empty()).then(|| slot.to_string()),
        })
    }

    /// Intent produced by this rule
    #[must_use]
    pub fn intent(&self) -> &str {
        &self.intent
    }
}

/// Deterministic first-stage matcher
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|(pattern, intent, slot)| match PatternRule::new(pattern, intent, slot) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::error!(error = %e, "invalid built-in pattern");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl PatternMatcher {
    /// Build a matcher from an explicit, ordered rule list
    #[must_use]
    pub const fn with_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Ordered rules
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Lowercase the input and strip filler words
    #[must_use]
    pub fn clean_text(text: &str) -> String {
        strip_fillers(&text.to_lowercase())
    }

    /// Classify text into `(intent, entities, confidence)`
    #[must_use]
    pub fn process(&self, text: &str) -> MatchResult {
        // Case is kept so captured slot values read like the user wrote them
        let cleaned = strip_fillers(text);

        for rule in &self.rules {
            let Some(captures) = rule.regex.captures(&cleaned) else {
                continue;
            };

            let mut entities = Entities::new();
            if let Some(slot) = &rule.slot {
                if let Some(value) = captures.name(slot) {
                    let value = value.as_str().trim();
                    if !value.is_empty() {
                        entities.insert(slot.clone(), value.to_string());
                    }
                }
            }

            tracing::debug!(intent = %rule.intent, ?entities, "pattern matched");
            return MatchResult {
                intent: rule.intent.clone(),
                entities,
                confidence: 1.0,
            };
        }

        MatchResult::unknown()
    }
}

fn filler_regexes() -> &'static [Regex] {
    static FILLERS: OnceLock<Vec<Regex>> = OnceLock::new();
    FILLERS.get_or_init(|| {
        FILLER_WORDS
            .iter()
            .filter_map(|word| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).ok())
            .collect()
    })
}

/// Remove filler words on word boundaries and trim the ends
///
/// Whitespace left behind is not collapsed, which keeps the operation
/// idempotent: removing a filler never joins two words into a new filler.
fn strip_fillers(text: &str) -> String {
    let mut cleaned = text.to_string();
    for filler in filler_regexes() {
        cleaned = filler.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_question_matches() {
        let result = PatternMatcher::default().process("what is the date");
        assert_eq!(result.intent, "get_date");
        assert!(result.entities.is_empty());
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn weather_location_extracted() {
        let result = PatternMatcher::default().process("weather in tokyo");
        assert_eq!(result.intent, "get_weather");
        assert_eq!(result.entities.get("location").map(String::as_str), Some("tokyo"));
    }

    #[test]
    fn specific_rule_wins_over_catch_all() {
        let result = PatternMatcher::default().process("weather in Paris");
        assert_eq!(result.intent, "get_weather");
        assert_eq!(result.entities.get("location").map(String::as_str), Some("Paris"));

        let bare = PatternMatcher::default().process("how is the weather");
        assert_eq!(bare.intent, "get_weather");
        assert!(bare.entities.is_empty());
    }

    #[test]
    fn fillers_are_ignored() {
        let result = PatternMatcher::default().process("Um, could you please tell me the time");
        assert_eq!(result.intent, "get_time");
    }

    #[test]
    fn youtube_rule_precedes_plain_play() {
        let result = PatternMatcher::default().process("Play Despacito on YouTube");
        assert_eq!(result.intent, "play_youtube");
        assert_eq!(result.entities.get("query").map(String::as_str), Some("Despacito"));
    }

    #[test]
    fn no_match_is_unknown() {
        let result = PatternMatcher::default().process("tell me a story about dragons");
        assert!(!result.is_known());
        assert!(result.entities.is_empty());
        assert!(result.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn empty_capture_is_not_stored() {
        let result = PatternMatcher::default().process("weather in ");
        assert_eq!(result.intent, "get_weather");
        assert!(result.entities.is_empty());
    }

    #[test]
    fn clean_text_strips_fillers() {
        assert_eq!(PatternMatcher::clean_text("Um I Just want it"), "i  want it");
        assert_eq!(PatternMatcher::clean_text("Please"), "");
    }

    #[test]
    fn clean_text_is_idempotent() {
        let inputs = [
            "Uh, can you please just open Spotify",
            "i want to really quickly check the weather in Paris",
            "could you could you actually um",
            "can just you help",
            "just-uh-um ok",
            "   Really?   ",
        ];
        for input in inputs {
            let once = PatternMatcher::clean_text(input);
            let twice = PatternMatcher::clean_text(&once);
            assert_eq!(once, twice, "input: {input}");
        }
    }

    #[test]
    fn custom_rules_respect_order() {
        let matcher = PatternMatcher::with_rules(vec![
            PatternRule::new(r"lights (?P<state>on|off)", "lights", "state").unwrap(),
            PatternRule::new(r"lights", "lights_generic", "").unwrap(),
        ]);
        let result = matcher.process("turn the lights off");
        assert_eq!(result.intent, "lights");
        assert_eq!(result.entities.get("state").map(String::as_str), Some("off"));
    }

    #[test]
    fn invalid_rule_is_rejected() {
        assert!(PatternRule::new(r"(unclosed", "x", "").is_err());
    }
}
