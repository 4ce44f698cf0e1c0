use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no Gemini API key configured")]
    MissingKey,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("request to Gemini failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("Gemini response did not contain any text")]
    EmptyResponse,
    #[error("unable to parse Gemini response: {0}")]
    ResponseParse(String),
}

/// Thin `generateContent` client for the text model.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GeminiClient {
    /// Returns `Ok(None)` when no API key is configured; callers treat that
    /// as offline mode rather than an error.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AiError> {
        let Some(api_key) = config.resolve_gemini_key() else {
            return Ok(None);
        };

        let endpoint = Url::parse(&format!(
            "{}/models/{}:generateContent",
            config.ai_endpoint.trim_end_matches('/'),
            config.prompt_model
        ))
        .map_err(|err| AiError::Configuration(format!("invalid Gemini endpoint: {err}")))?;

        let client = Client::builder()
            .user_agent("reflect-rs (gemini)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AiError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }))
    }

    /// One instruction in, the model's text out.
    pub async fn generate_text(&self, instruction: &str) -> Result<String, AiError> {
        self.generate(instruction, None).await
    }

    /// Same as [`generate_text`](Self::generate_text) but constrains the
    /// response to a JSON document.
    pub async fn generate_json(&self, instruction: &str) -> Result<String, AiError> {
        self.generate(instruction, Some("application/json")).await
    }

    async fn generate(
        &self,
        instruction: &str,
        response_mime_type: Option<&str>,
    ) -> Result<String, AiError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: instruction }],
            }],
            generation_config: response_mime_type.map(|mime| GenerationConfig {
                response_mime_type: mime,
            }),
        };

        let mut delay = self.retry_backoff;
        let attempts = self.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            debug!("Gemini generateContent attempt {}", attempt);

            let mut url = self.endpoint.clone();
            url.query_pairs_mut().append_pair("key", &self.api_key);

            let response = self.client.post(url).json(&body).send().await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let payload: GeminiResponse = resp
                        .json()
                        .await
                        .map_err(|err| AiError::ResponseParse(err.to_string()))?;
                    return payload.primary_text().ok_or(AiError::EmptyResponse);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let message = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<unavailable>".to_string());
                    warn!("Gemini returned {}: {}", status, truncate(&message));

                    if attempt == attempts || !status.is_server_error() {
                        return Err(AiError::Status {
                            status,
                            message: truncate(&message),
                        });
                    }
                }
                Err(err) => {
                    warn!("Gemini request failed: {}", err);
                    if attempt == attempts {
                        return Err(AiError::Http(err));
                    }
                }
            }

            sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(2));
        }

        Err(AiError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

impl GeminiResponse {
    fn primary_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .find_map(|part| part.text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

fn truncate(input: &str) -> String {
    const MAX_LEN: usize = 512;
    if input.len() <= MAX_LEN {
        input.to_string()
    } else {
        let cut = input
            .char_indices()
            .take_while(|(idx, _)| *idx <= MAX_LEN)
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        format!("{}...", &input[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape_matches_the_wire_format() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: "hello" }],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );

        let plain = GeminiRequest {
            contents: vec![],
            generation_config: None,
        };
        let plain_json = serde_json::to_value(&plain).expect("serialize");
        assert!(plain_json.get("generationConfig").is_none());
    }

    #[test]
    fn response_extraction_takes_the_first_text_part() {
        let payload = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "first" }, { "text": "second" } ] } }
            ]
        }"#;
        let response: GeminiResponse = serde_json::from_str(payload).expect("parse");
        assert_eq!(response.primary_text().as_deref(), Some("first"));

        let empty: GeminiResponse = serde_json::from_str(r#"{}"#).expect("parse");
        assert!(empty.primary_text().is_none());
    }
}
