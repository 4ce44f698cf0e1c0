use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::auth::Session;

/// Caches the signed-in session on disk so a restart stays signed in.
pub struct SessionStore {
    session_file: PathBuf,
}

impl SessionStore {
    pub fn new(session_file: PathBuf) -> Self {
        Self { session_file }
    }

    /// Load a previously saved session, if any. A corrupt file is treated as
    /// signed-out rather than an error.
    pub fn load(&self) -> Option<Session> {
        let content = fs::read_to_string(&self.session_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!("Ignoring unreadable session cache: {}", err);
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        fs::write(&self.session_file, json).context("Failed to write session cache")?;
        tracing::debug!("Saved session cache: {:?}", self.session_file);
        Ok(())
    }

    /// Remove the cache on sign-out to avoid stale credentials.
    pub fn clear(&self) -> Result<()> {
        if self.session_file.exists() {
            fs::remove_file(&self.session_file).context("Failed to remove session cache")?;
            tracing::debug!("Removed session cache");
        }
        Ok(())
    }
}
