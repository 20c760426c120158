//! Model-mediated tool selection
//!
//! The model sees every registered intent as a tool and answers with
//! `{"tool": ..., "args": ..., "response": ...}`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::Result;
use crate::model::strip_code_fences;
use crate::response::Entities;
use crate::skills::ManifestEntry;

/// Decoded tool-selection reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolSelection {
    /// Intent to run; `None` for plain chat
    #[serde(default)]
    pub tool: Option<String>,

    #[serde(default)]
    pub args: Option<Map<String, Value>>,

    /// Ready-made chat reply
    #[serde(default)]
    pub response: Option<String>,
}

impl ToolSelection {
    /// Decode a model reply, tolerating a Markdown code fence around it
    ///
    /// # Errors
    ///
    /// Returns error if the reply is not the expected JSON object
    pub fn parse(reply: &str) -> Result<Self> {
        Ok(serde_json::from_str(strip_code_fences(reply))?)
    }

    /// Selected tool, ignoring blank names
    #[must_use]
    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Non-empty chat reply
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// Arguments as skill entities; non-string values are rendered as JSON
    #[must_use]
    pub fn entities(&self) -> Entities {
        self.args
            .iter()
            .flatten()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), value))
            })
            .collect()
    }
}

/// Prompt asking the model to pick a tool or chat
///
/// `failed` lists intents already tried for this request so the model can
/// avoid picking them again.
///
/// # Errors
///
/// Returns error if the manifest cannot be serialized
pub fn selection_prompt(assistant: &str, manifest: &[ManifestEntry], failed: &[String], text: &str) -> Result<String> {
    let tools = serde_json::to_string(manifest)?;
    let note = if failed.is_empty() {
        String::new()
    } else {
        format!("\nAlready tried without success: {}. Prefer another tool or chat.\n", failed.join(", "))
    };

    Ok(format!(
        "You are {assistant}. Decide if you should use a tool or chat.\n\
         Tools: {tools}\n{note}\n\
         User: {text}\n\n\
         Output JSON ONLY:\n\
         {{\n  \"tool\": \"intent_name\" or null,\n  \"args\": {{ \"arg_name\": \"value\" }} or null,\n  \"response\": \"Your conversational response here\"\n}}\n"
    ))
}

/// Prompt rewriting raw skill output as a conversational answer
#[must_use]
pub fn synthesis_prompt(text: &str, tool: &str, output: &str) -> String {
    format!(
        "User asked: \"{text}\"\nTool '{tool}' output: \"{output}\"\n\n\
         Synthesize a helpful, conversational response based on the tool output.\n\
         Do not explicitly mention using a tool.\n"
    )
}

/// Prompt for a short chat reply when no tool fits
#[must_use]
pub fn chat_prompt(assistant: &str, text: &str) -> String {
    format!("User said: '{text}'. You are {assistant}. Respond briefly.")
}

/// Prompt for the last-resort reply after a broken selection
#[must_use]
pub fn fallback_prompt(text: &str) -> String {
    format!("User said: '{text}'. Respond.")
}
