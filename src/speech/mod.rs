mod local;
mod playback;
mod remote;
mod wav;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ai::is_placeholder;
use crate::config::Config;

pub use local::LocalSpeech;
pub use remote::RemoteSpeech;
pub use wav::encode_wav;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("TTS service returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("TTS response did not contain audio data")]
    MissingAudio,
    #[error("unable to parse TTS response: {0}")]
    ResponseParse(String),
    #[error("speech engine not found at '{0}'")]
    EngineMissing(String),
    #[error("speech engine failed: {0}")]
    Engine(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Speaks prompt text aloud: remote synthesis when a key is configured,
/// degrading to the local engine on any failure.
pub struct SpeechEngine {
    enabled: bool,
    volume: f32,
    remote: Option<RemoteSpeech>,
    local: LocalSpeech,
}

impl SpeechEngine {
    pub fn from_config(config: &Config) -> Result<Self, SpeechError> {
        let remote = RemoteSpeech::from_config(config)?;
        if remote.is_none() {
            debug!("No Gemini key configured; speech uses the local engine only");
        }

        Ok(Self {
            enabled: config.speech_enabled,
            volume: config.speech_volume,
            remote,
            local: LocalSpeech::new()?,
        })
    }

    /// Speak the text aloud. Guidance placeholders are never spoken, and all
    /// remote failures degrade to the local engine.
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if !self.enabled {
            debug!("Speech disabled; skipping");
            return Ok(());
        }

        if text.trim().is_empty() || is_placeholder(text) {
            debug!("Skipping placeholder text");
            return Ok(());
        }

        let clean = clean_for_speech(text);

        if let Some(remote) = &self.remote {
            match self.speak_remote(remote, &clean).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!("Remote speech failed, falling back to local engine: {}", err);
                }
            }
        }

        self.local.speak(&clean).await
    }

    async fn speak_remote(&self, remote: &RemoteSpeech, text: &str) -> Result<(), SpeechError> {
        let pcm = remote.synthesize(text).await?;
        let wav = encode_wav(&pcm, remote::SAMPLE_RATE, remote::CHANNELS);
        playback::play_wav(wav, self.volume).await
    }
}

/// Quotes read poorly when spoken; drop them before synthesis.
fn clean_for_speech(text: &str) -> String {
    text.replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AI_STARTER;

    fn offline_engine(enabled: bool) -> SpeechEngine {
        SpeechEngine {
            enabled,
            volume: 1.0,
            remote: None,
            local: LocalSpeech {
                // Points at nothing on purpose; the tests below must never
                // reach the spawn.
                executable: std::path::PathBuf::from("definitely-not-a-tts-binary"),
            },
        }
    }

    #[test]
    fn quotes_are_removed_for_speech() {
        assert_eq!(
            clean_for_speech("What \"exactly\" went well?"),
            "What exactly went well?"
        );
    }

    #[tokio::test]
    async fn disabled_engine_is_silent() {
        let engine = offline_engine(false);
        engine.speak("anything").await.expect("disabled is a no-op");
    }

    #[tokio::test]
    async fn placeholders_are_never_spoken() {
        let engine = offline_engine(true);
        engine.speak(AI_STARTER).await.expect("placeholder skipped");
        engine.speak("   ").await.expect("blank skipped");
    }
}
