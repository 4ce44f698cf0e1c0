mod gemini;
mod prompts;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::journal::EntryCategory;

pub use gemini::{AiError, GeminiClient};
pub use prompts::{is_placeholder, AI_NEEDS_CONTEXT, AI_STARTER, ANALYSIS_CATEGORIES};

use prompts::{
    analysis_instruction, category_instruction, curated_prompt, dig_deeper_instruction,
    freeform_instruction,
};

/// Where a prompt came from, so the caller can tell the user about degraded
/// modes without inspecting strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSource {
    Assistant,
    Curated,
    Guidance,
}

#[derive(Debug, Clone)]
pub struct GeneratedPrompt {
    pub text: String,
    pub source: PromptSource,
}

/// Classification + one-line insight for a saved entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EntryAnalysis {
    pub category: String,
    pub insight: String,
}

/// Prompt generation and entry analysis with a curated offline fallback.
pub struct PromptEngine {
    gemini: Option<GeminiClient>,
}

impl PromptEngine {
    pub fn from_config(config: &Config) -> Result<Self, AiError> {
        let gemini = GeminiClient::from_config(config)?;
        if gemini.is_none() {
            debug!("No Gemini key configured; prompts run in offline mode");
        }
        Ok(Self { gemini })
    }

    pub fn is_online(&self) -> bool {
        self.gemini.is_some()
    }

    /// Produce a journaling prompt for the category. Never fails: upstream
    /// trouble degrades to the curated tables.
    pub async fn generate_prompt(
        &self,
        category: EntryCategory,
        user_context: Option<&str>,
    ) -> GeneratedPrompt {
        let instruction = match category {
            EntryCategory::Ai => {
                let Some(context) = user_context.filter(|c| !c.trim().is_empty()) else {
                    return GeneratedPrompt {
                        text: AI_NEEDS_CONTEXT.to_string(),
                        source: PromptSource::Guidance,
                    };
                };
                freeform_instruction(context.trim())
            }
            other => {
                let base = category_instruction(other)
                    .expect("guided categories always carry an instruction");
                format!("{base} Ensure the response is unique and thoughtful.")
            }
        };

        if let Some(client) = &self.gemini {
            match client.generate_text(&instruction).await {
                Ok(text) => {
                    return GeneratedPrompt {
                        text: trim_wrapping_quotes(text.trim()).to_string(),
                        source: PromptSource::Assistant,
                    };
                }
                Err(err) => {
                    warn!("Prompt generation failed, falling back: {}", err);
                }
            }
        }

        self.fallback_prompt(category)
    }

    /// A follow-up question that probes the root cause of the current prompt.
    /// Placeholder prompts and upstream failures yield `None`.
    pub async fn dig_deeper(&self, current_prompt: &str) -> Option<String> {
        if is_placeholder(current_prompt) {
            return None;
        }

        let client = self.gemini.as_ref()?;
        match client
            .generate_text(&dig_deeper_instruction(current_prompt))
            .await
        {
            Ok(text) => Some(trim_wrapping_quotes(text.trim()).to_string()),
            Err(err) => {
                warn!("Dig-deeper request failed: {}", err);
                None
            }
        }
    }

    /// Classify an entry and produce a one-line insight.
    pub async fn analyze_entry(&self, entry_text: &str) -> Result<EntryAnalysis, AiError> {
        let client = self.gemini.as_ref().ok_or(AiError::MissingKey)?;

        let raw = client
            .generate_json(&analysis_instruction(entry_text))
            .await?;
        let cleaned = strip_code_fence(&raw);

        let analysis: EntryAnalysis = serde_json::from_str(cleaned)
            .map_err(|err| AiError::ResponseParse(format!("{err} in {cleaned:?}")))?;

        if !ANALYSIS_CATEGORIES.contains(&analysis.category.as_str()) {
            warn!(
                "Analysis returned a category outside the expected set: {:?}",
                analysis.category
            );
        }

        Ok(analysis)
    }

    fn fallback_prompt(&self, category: EntryCategory) -> GeneratedPrompt {
        match category {
            EntryCategory::Ai => GeneratedPrompt {
                text: AI_STARTER.to_string(),
                source: PromptSource::Guidance,
            },
            other => GeneratedPrompt {
                text: curated_prompt(other).to_string(),
                source: PromptSource::Curated,
            },
        }
    }
}

/// Strip one pair of wrapping double quotes, if present.
fn trim_wrapping_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(text)
}

/// JSON mode still occasionally arrives wrapped in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let re = Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("static regex");
    match re.captures(raw) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_quotes_are_trimmed_once() {
        assert_eq!(trim_wrapping_quotes("\"hello\""), "hello");
        assert_eq!(trim_wrapping_quotes("plain"), "plain");
        assert_eq!(trim_wrapping_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(trim_wrapping_quotes("say \"hi\" now"), "say \"hi\" now");
    }

    #[test]
    fn code_fences_are_stripped() {
        let fenced = "```json\n{ \"category\": \"Health\" }\n```";
        assert_eq!(strip_code_fence(fenced), "{ \"category\": \"Health\" }");

        let bare = "  { \"category\": \"Health\" } ";
        assert_eq!(strip_code_fence(bare), "{ \"category\": \"Health\" }");
    }

    #[test]
    fn analysis_json_parses() {
        let raw = "{ \"category\": \"Gratitude\", \"insight\": \"Small joys compound.\" }";
        let analysis: EntryAnalysis = serde_json::from_str(raw).expect("parse");
        assert_eq!(analysis.category, "Gratitude");
        assert_eq!(analysis.insight, "Small joys compound.");
    }

    #[tokio::test]
    async fn offline_engine_serves_curated_prompts() {
        let engine = PromptEngine { gemini: None };

        let prompt = engine
            .generate_prompt(EntryCategory::Daily, None)
            .await;
        assert_eq!(prompt.source, PromptSource::Curated);
        assert!(!prompt.text.is_empty());

        let ai_prompt = engine
            .generate_prompt(EntryCategory::Ai, Some("feeling stuck at work"))
            .await;
        assert_eq!(ai_prompt.source, PromptSource::Guidance);
        assert_eq!(ai_prompt.text, AI_STARTER);
    }

    #[tokio::test]
    async fn freeform_without_context_is_guidance() {
        let engine = PromptEngine { gemini: None };
        let prompt = engine.generate_prompt(EntryCategory::Ai, Some("  ")).await;
        assert_eq!(prompt.source, PromptSource::Guidance);
        assert_eq!(prompt.text, AI_NEEDS_CONTEXT);
    }

    #[tokio::test]
    async fn dig_deeper_skips_placeholders() {
        let engine = PromptEngine { gemini: None };
        assert!(engine.dig_deeper(AI_STARTER).await.is_none());
        assert!(engine.dig_deeper(AI_NEEDS_CONTEXT).await.is_none());
    }

    #[tokio::test]
    async fn analysis_without_a_key_is_an_error() {
        let engine = PromptEngine { gemini: None };
        let err = engine.analyze_entry("wrote some code").await.unwrap_err();
        assert!(matches!(err, AiError::MissingKey));
    }
}
