use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::auth::Session;
use crate::config::Config;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journal store is not configured (set store_url and store_api_key)")]
    NotConfigured,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("unable to parse store response: {0}")]
    ResponseParse(String),
}

/// The journaling modes a prompt (and therefore an entry) can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryCategory {
    Daily,
    Weekly,
    Monthly,
    Stumped,
    Ai,
}

impl EntryCategory {
    pub const ALL: [EntryCategory; 5] = [
        EntryCategory::Daily,
        EntryCategory::Weekly,
        EntryCategory::Monthly,
        EntryCategory::Stumped,
        EntryCategory::Ai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::Daily => "daily",
            EntryCategory::Weekly => "weekly",
            EntryCategory::Monthly => "monthly",
            EntryCategory::Stumped => "stumped",
            EntryCategory::Ai => "ai",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(EntryCategory::Daily),
            "weekly" => Some(EntryCategory::Weekly),
            "monthly" => Some(EntryCategory::Monthly),
            "stumped" | "unblock" => Some(EntryCategory::Stumped),
            "ai" => Some(EntryCategory::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insert payload for a journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct NewEntry {
    pub user_id: String,
    pub category: EntryCategory,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// The slice of an entry the analytics view selects.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredEntry {
    /// Kept as a raw string: the store may hold categories this build does
    /// not know about, and aggregation surfaces those instead of failing.
    pub category: String,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Journal entry persistence against the store's `/rest/v1` endpoints.
#[derive(Debug, Clone)]
pub struct JournalStore {
    client: Client,
    entries_url: Url,
    api_key: String,
}

impl JournalStore {
    /// Returns `Ok(None)` when the journal store is not configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, StoreError> {
        let (Some(store_url), Some(api_key)) = (
            config.store_url.as_deref(),
            config.store_api_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let entries_url = Url::parse(&format!(
            "{}/rest/v1/entries",
            store_url.trim_end_matches('/')
        ))
        .map_err(|err| StoreError::Configuration(format!("invalid store URL: {err}")))?;

        let client = Client::builder()
            .user_agent("reflect-rs (store)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                StoreError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Some(Self {
            client,
            entries_url,
            api_key: api_key.to_string(),
        }))
    }

    pub async fn insert(&self, session: &Session, entry: &NewEntry) -> Result<(), StoreError> {
        debug!(
            "Saving {} entry ({} chars)",
            entry.category,
            entry.content.len()
        );

        let response = self
            .client
            .post(self.entries_url.clone())
            .header("apikey", &self.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&session.access_token)
            .json(entry)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Entry saved ({})", entry.category);
            return Ok(());
        }

        Err(Self::status_error(response).await)
    }

    /// All of the user's entries, oldest first, trimmed to the fields the
    /// analytics view needs.
    pub async fn list(&self, session: &Session) -> Result<Vec<StoredEntry>, StoreError> {
        let mut url = self.entries_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "category,sentiment,created_at")
            .append_pair("user_id", &format!("eq.{}", session.user.id))
            .append_pair("order", "created_at.asc");

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let entries: Vec<StoredEntry> = response
            .json()
            .await
            .map_err(|err| StoreError::ResponseParse(err.to_string()))?;

        debug!("Fetched {} entries", entries.len());
        Ok(entries)
    }

    async fn status_error(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable>".to_string());
        StoreError::Status {
            status,
            message: truncate(&message),
        }
    }
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
    fn category_parse_accepts_aliases() {
        assert_eq!(EntryCategory::parse("daily"), Some(EntryCategory::Daily));
        assert_eq!(EntryCategory::parse("  WEEKLY "), Some(EntryCategory::Weekly));
        assert_eq!(EntryCategory::parse("unblock"), Some(EntryCategory::Stumped));
        assert_eq!(EntryCategory::parse("chores"), None);
    }

    #[test]
    fn new_entry_omits_missing_sentiment() {
        let entry = NewEntry {
            user_id: "user-1".to_string(),
            category: EntryCategory::Daily,
            content: "slept well".to_string(),
            sentiment: None,
        };
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["category"], "daily");
        assert!(json.get("sentiment").is_none());
    }

    #[test]
    fn stored_entry_parses_store_timestamps() {
        let payload = r#"[
            { "category": "daily", "sentiment": "Gratitude",
              "created_at": "2026-01-05T09:30:00.123456+00:00" },
            { "category": "retired-mode", "sentiment": null,
              "created_at": "2026-01-06T10:00:00+00:00" }
        ]"#;

        let entries: Vec<StoredEntry> = serde_json::from_str(payload).expect("entries parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sentiment.as_deref(), Some("Gratitude"));
        assert_eq!(entries[1].category, "retired-mode");
        assert_eq!(entries[1].sentiment, None);
        assert_eq!(entries[0].created_at.year(), 2026);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(600);
        let out = truncate(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 512 + 4);
    }
}
