use std::io::Cursor;

use rodio::{Decoder, OutputStream, Sink};
use tracing::debug;

use super::SpeechError;

/// Play a WAV byte buffer to the default output device, blocking until the
/// clip finishes. Runs on the blocking pool so one utterance plays at a time
/// without stalling the async loop.
pub async fn play_wav(bytes: Vec<u8>, volume: f32) -> Result<(), SpeechError> {
    debug!("Playing {} bytes of audio", bytes.len());

    tokio::task::spawn_blocking(move || play_blocking(bytes, volume))
        .await
        .map_err(|err| SpeechError::Playback(format!("playback task failed: {err}")))?
}

fn play_blocking(bytes: Vec<u8>, volume: f32) -> Result<(), SpeechError> {
    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|err| SpeechError::Playback(format!("failed to open audio output: {err}")))?;

    let sink = Sink::try_new(&stream_handle)
        .map_err(|err| SpeechError::Playback(format!("failed to create audio sink: {err}")))?;

    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|err| SpeechError::Playback(format!("failed to decode audio: {err}")))?;

    sink.set_volume(volume.clamp(0.1, 1.0));
    sink.append(source);
    sink.sleep_until_end();

    Ok(())
}
