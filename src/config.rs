use anyhow::{anyhow, Context, Result};
use jsonc_parser::{parse_to_serde_value, ParseOptions};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Base URL of the remote journal store project (auth + REST live under it).
    #[serde(default)]
    pub store_url: Option<String>,

    /// Project API key sent as the `apikey` header on every store request.
    #[serde(default)]
    pub store_api_key: Option<String>,

    /// Gemini API key; the GEMINI_API_KEY environment variable takes priority.
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_ai_endpoint")]
    pub ai_endpoint: String,

    #[serde(default = "default_prompt_model")]
    pub prompt_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_speech_enabled")]
    pub speech_enabled: bool,

    #[serde(default = "default_speech_volume")]
    pub speech_volume: f32,
}

fn default_ai_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_prompt_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_tts_voice() -> String {
    "Puck".to_string()
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    600
}

fn default_speech_enabled() -> bool {
    true
}

fn default_speech_volume() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            store_api_key: None,
            gemini_api_key: None,
            ai_endpoint: default_ai_endpoint(),
            prompt_model: default_prompt_model(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            speech_enabled: default_speech_enabled(),
            speech_volume: default_speech_volume(),
        }
    }
}

impl Config {
    /// Resolve the Gemini key, preferring the environment over the file.
    pub fn resolve_gemini_key(&self) -> Option<String> {
        env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.gemini_api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(5))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.max(100))
    }
}

#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ConfigManagerInner>,
}

struct ConfigManagerInner {
    config: RwLock<Config>,
    config_path: PathBuf,
    config_dir: PathBuf,
    change_tx: watch::Sender<Config>,
    watcher_active: AtomicBool,
}

impl ConfigManager {
    pub fn load() -> Result<Self> {
        let config_dir = directories::ProjectDirs::from("", "", "reflect-rs")
            .context("Failed to get config directory")?
            .config_dir()
            .to_path_buf();

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        let config_path = config_dir.join("config.jsonc");

        let config = if config_path.exists() {
            Self::read_config_from_disk(&config_path)?
        } else {
            let default_config = Config::default();
            Self::write_config_file(&config_path, &default_config)?;
            tracing::info!("Created default config at: {:?}", config_path);
            default_config
        };

        tracing::info!("Loaded config from: {:?}", config_path);

        let (change_tx, _) = watch::channel(config.clone());

        Ok(Self {
            inner: Arc::new(ConfigManagerInner {
                config: RwLock::new(config),
                config_path,
                config_dir,
                change_tx,
                watcher_active: AtomicBool::new(false),
            }),
        })
    }

    pub fn start_watching(&self) {
        if self.inner.watcher_active.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut last_state = Self::file_state(&inner.config_path);
            let mut ticker = time::interval(Duration::from_millis(500));

            loop {
                ticker.tick().await;

                let current_state = Self::file_state(&inner.config_path);
                if current_state == last_state {
                    continue;
                }

                last_state = current_state;

                match Self::read_config_from_disk(&inner.config_path) {
                    Ok(new_config) => {
                        let mut guard = inner.config.write().expect("config lock poisoned");
                        if *guard != new_config {
                            *guard = new_config.clone();
                            drop(guard);

                            if inner.change_tx.send(new_config).is_ok() {
                                tracing::info!("Reloaded config from: {:?}", inner.config_path);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Failed to reload config: {err}");
                    }
                }
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.inner.change_tx.subscribe()
    }

    pub fn get(&self) -> Config {
        self.inner
            .config
            .read()
            .expect("config lock poisoned")
            .clone()
    }

    pub fn save(&self) -> Result<()> {
        let config = self.get();
        Self::write_config_file(&self.inner.config_path, &config)?;

        let _ = self.inner.change_tx.send(config);

        tracing::info!("Saved config to: {:?}", self.inner.config_path);
        Ok(())
    }

    /// Where the signed-in session is cached between runs.
    pub fn session_file_path(&self) -> PathBuf {
        self.inner.config_dir.join("session.json")
    }

    fn read_config_from_disk(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {:?}", path))?;
        Self::parse_config(&content)
    }

    fn write_config_file(path: &Path, config: &Config) -> Result<()> {
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file at {:?}", path))
    }

    fn parse_config(content: &str) -> Result<Config> {
        let value = parse_to_serde_value(content, &ParseOptions::default())
            .context("Failed to parse config as JSONC")?
            .ok_or_else(|| anyhow!("Config file did not contain a JSON value"))?;
        serde_json::from_value(value).context("Failed to deserialize config")
    }

    fn file_state(path: &Path) -> Option<(SystemTime, u64)> {
        let metadata = fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        Some((modified, metadata.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jsonc_with_comments_and_defaults() {
        let content = r#"{
            // journal store project
            "store_url": "https://example.supabase.co",
            "store_api_key": "anon-key",
            "tts_voice": "Kore",
        }"#;

        let config = ConfigManager::parse_config(content).expect("config should parse");
        assert_eq!(
            config.store_url.as_deref(),
            Some("https://example.supabase.co")
        );
        assert_eq!(config.tts_voice, "Kore");
        assert_eq!(config.prompt_model, default_prompt_model());
        assert_eq!(config.max_retries, 2);
        assert!(config.speech_enabled);
    }

    #[test]
    fn timeout_and_backoff_have_floors() {
        let config = Config {
            request_timeout_secs: 1,
            retry_backoff_ms: 10,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_backoff(), Duration::from_millis(100));
    }
}
