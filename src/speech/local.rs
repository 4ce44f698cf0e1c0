use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::SpeechError;

const SPEAK_TIMEOUT: Duration = Duration::from_secs(60);

/// On-device fallback speech via an espeak-compatible binary.
#[derive(Debug, Clone)]
pub struct LocalSpeech {
    pub(super) executable: PathBuf,
}

impl LocalSpeech {
    pub fn new() -> Result<Self, SpeechError> {
        let executable = std::env::var_os("REFLECT_TTS_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("espeak-ng"));

        if !executable.is_file() {
            // A bare name may still resolve on PATH; defer the existence
            // check to spawn time for those.
            if executable.components().count() > 1 {
                return Err(SpeechError::EngineMissing(
                    executable.to_string_lossy().to_string(),
                ));
            }
        }

        Ok(Self { executable })
    }

    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        debug!("Speaking {} chars via {:?}", text.len(), self.executable);

        let child = Command::new(&self.executable)
            .kill_on_drop(true)
            .arg(text)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|_| {
                SpeechError::EngineMissing(self.executable.to_string_lossy().to_string())
            })?;

        let output = timeout(SPEAK_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| SpeechError::Engine("timed out waiting for speech engine".into()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Engine(format!(
                "speech engine exited with status {:?}: {}",
                output.status.code(),
                stderr
            )));
        }

        Ok(())
    }
}
