use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::SpeechError;
use crate::config::Config;

/// The TTS models emit raw 16-bit little-endian mono PCM at 24 kHz.
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;

/// Speech synthesis through the Gemini TTS `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct RemoteSpeech {
    client: Client,
    endpoint: Url,
    api_key: String,
    voice: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl RemoteSpeech {
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, SpeechError> {
        let Some(api_key) = config.resolve_gemini_key() else {
            return Ok(None);
        };

        let endpoint = Url::parse(&format!(
            "{}/models/{}:generateContent",
            config.ai_endpoint.trim_end_matches('/'),
            config.tts_model
        ))
        .map_err(|err| SpeechError::Configuration(format!("invalid TTS endpoint: {err}")))?;

        let client = Client::builder()
            .user_agent("reflect-rs (tts)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                SpeechError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key,
            voice: config.tts_voice.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }))
    }

    /// Synthesize speech, returning the decoded raw PCM payload.
    pub async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let body = TtsRequest {
            contents: vec![TtsContent {
                parts: vec![TtsPart { text }],
            }],
            generation_config: TtsGenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &self.voice,
                        },
                    },
                },
            },
        };

        let mut delay = self.retry_backoff;
        let attempts = self.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            debug!("TTS synthesis attempt {}", attempt);

            let mut url = self.endpoint.clone();
            url.query_pairs_mut().append_pair("key", &self.api_key);

            let response = self.client.post(url).json(&body).send().await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let payload: TtsResponse = resp
                        .json()
                        .await
                        .map_err(|err| SpeechError::ResponseParse(err.to_string()))?;
                    let encoded = payload.audio_data().ok_or(SpeechError::MissingAudio)?;
                    let pcm = BASE64
                        .decode(encoded.as_bytes())
                        .map_err(|err| SpeechError::ResponseParse(err.to_string()))?;
                    debug!("Synthesized {} bytes of PCM", pcm.len());
                    return Ok(Bytes::from(pcm));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let message = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<unavailable>".to_string());
                    warn!("TTS returned {}: {}", status, message);

                    if attempt == attempts || !status.is_server_error() {
                        return Err(SpeechError::Status { status, message });
                    }
                }
                Err(err) => {
                    warn!("TTS request failed: {}", err);
                    if attempt == attempts {
                        return Err(SpeechError::Http(err));
                    }
                }
            }

            sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(2));
        }

        Err(SpeechError::MissingAudio)
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    contents: Vec<TtsContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: TtsGenerationConfig<'a>,
}

#[derive(Serialize)]
struct TtsContent<'a> {
    parts: Vec<TtsPart<'a>>,
}

#[derive(Serialize)]
struct TtsPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct TtsGenerationConfig<'a> {
    #[serde(rename = "responseModalities")]
    response_modalities: [&'static str; 1],
    #[serde(rename = "speechConfig")]
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
struct SpeechConfig<'a> {
    #[serde(rename = "voiceConfig")]
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
struct VoiceConfig<'a> {
    #[serde(rename = "prebuiltVoiceConfig")]
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
struct PrebuiltVoiceConfig<'a> {
    #[serde(rename = "voiceName")]
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    candidates: Option<Vec<TtsCandidate>>,
}

impl TtsResponse {
    fn audio_data(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .find_map(|part| part.inline_data.map(|data| data.data))
    }
}

#[derive(Debug, Deserialize)]
struct TtsCandidate {
    content: TtsResponseContent,
}

#[derive(Debug, Deserialize)]
struct TtsResponseContent {
    parts: Vec<TtsResponsePart>,
}

#[derive(Debug, Deserialize)]
struct TtsResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_audio_modality_and_voice() {
        let body = TtsRequest {
            contents: vec![TtsContent {
                parts: vec![TtsPart { text: "hello" }],
            }],
            generation_config: TtsGenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: "Puck" },
                    },
                },
            },
        };

        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
    }

    #[test]
    fn response_extraction_finds_inline_audio() {
        let payload = r#"{
            "candidates": [
                { "content": { "parts": [
                    { "inlineData": null },
                    { "inlineData": { "data": "AAEC" } }
                ] } }
            ]
        }"#;
        let response: TtsResponse = serde_json::from_str(payload).expect("parse");
        assert_eq!(response.audio_data().as_deref(), Some("AAEC"));

        let empty: TtsResponse = serde_json::from_str(r#"{}"#).expect("parse");
        assert!(empty.audio_data().is_none());
    }
}
