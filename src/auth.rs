use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("journal store is not configured (set store_url and store_api_key)")]
    NotConfigured,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth service returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("unable to parse auth response: {0}")]
    ResponseParse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Access credentials returned by a successful OTP verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Passwordless email sign-in against the store's `/auth/v1` endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl AuthClient {
    /// Returns `Ok(None)` when the journal store is not configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AuthError> {
        let (Some(store_url), Some(api_key)) = (
            config.store_url.as_deref(),
            config.store_api_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let base = Url::parse(&format!("{}/auth/v1/", store_url.trim_end_matches('/')))
            .map_err(|err| AuthError::Configuration(format!("invalid store URL: {err}")))?;

        let client = Client::builder()
            .user_agent("reflect-rs (auth)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AuthError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Some(Self {
            client,
            base,
            api_key: api_key.to_string(),
        }))
    }

    /// Email a one-time passcode; creates the account on first sign-in.
    pub async fn request_otp(&self, email: &str) -> Result<(), AuthError> {
        let url = self.endpoint("otp")?;
        debug!("Requesting OTP for {}", email);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;

        if response.status().is_success() {
            info!("Login code sent to {}", email);
            return Ok(());
        }

        Err(Self::status_error(response).await)
    }

    /// Exchange an emailed passcode for a session.
    pub async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, AuthError> {
        let url = self.endpoint("verify")?;

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "type": "email", "email": email, "token": token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let session: Session = response
            .json()
            .await
            .map_err(|err| AuthError::ResponseParse(err.to_string()))?;

        info!(
            "Signed in as {}",
            session.user.email.as_deref().unwrap_or(&session.user.id)
        );
        Ok(session)
    }

    /// Revoke the session server-side. Best effort - a failure is logged, not
    /// propagated, so a local sign-out always succeeds.
    pub async fn sign_out(&self, session: &Session) {
        let url = match self.endpoint("logout") {
            Ok(url) => url,
            Err(err) => {
                warn!("Skipping remote sign-out: {}", err);
                return;
            }
        };

        let result = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Remote session revoked");
            }
            Ok(response) => {
                warn!("Remote sign-out returned {}", response.status());
            }
            Err(err) => {
                warn!("Remote sign-out failed: {}", err);
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path)
            .map_err(|err| AuthError::Configuration(format!("invalid auth endpoint: {err}")))
    }

    async fn status_error(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let message = match response.json::<AuthErrorBody>().await {
            Ok(body) => body.message(),
            Err(_) => "<unavailable>".to_string(),
        };
        AuthError::Status { status, message }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AuthErrorBody {
    fn message(self) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .unwrap_or_else(|| "<no detail>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips_through_json() {
        let payload = r#"{
            "access_token": "token-abc",
            "refresh_token": "refresh-xyz",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "a@b.c" }
        }"#;

        let session: Session = serde_json::from_str(payload).expect("session should parse");
        assert_eq!(session.access_token, "token-abc");
        assert_eq!(session.user.email.as_deref(), Some("a@b.c"));

        let encoded = serde_json::to_string(&session).expect("session should serialize");
        let reparsed: Session = serde_json::from_str(&encoded).expect("round trip");
        assert_eq!(reparsed, session);
    }

    #[test]
    fn missing_store_config_yields_none() {
        let config = Config::default();
        assert!(AuthClient::from_config(&config)
            .expect("no configuration is not an error")
            .is_none());
    }

    #[test]
    fn error_body_prefers_msg_field() {
        let body: AuthErrorBody =
            serde_json::from_str(r#"{ "msg": "otp expired", "error_description": "other" }"#)
                .expect("error body should parse");
        assert_eq!(body.message(), "otp expired");
    }
}
