//! Telegram Bot API client for operator alerts.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The request URL embeds the bot token and is always stripped.
    #[error("telegram unreachable: {0}")]
    Transport(reqwest::Error),

    #[error("telegram rejected message: {0}")]
    Rejected(String),
}

/// Telegram `sendMessage` client bound to a single chat.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Transport(e.without_url())
    }
}

impl TelegramClient {
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: TELEGRAM_API.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Send a plain-text message to the configured chat.
    #[instrument(skip(self, text), fields(chat_id = %self.chat_id))]
    pub async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let parsed: TelegramResponse = response.json().await?;

        if !parsed.ok {
            let reason = parsed
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(TelegramError::Rejected(reason));
        }

        debug!(len = text.len(), "Telegram message delivered");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let client = TelegramClient::new("123:secret", "42", Duration::from_secs(5)).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("42"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_response_parsing() {
        let ok: TelegramResponse = serde_json::from_str(r#"{"ok":true,"result":{}}"#).unwrap();
        assert!(ok.ok);

        let err: TelegramResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("chat not found"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        let client = TelegramClient::new("123:supersecret", "42", Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = client.send_message("hi").await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, TelegramError::Transport(_)));
        assert!(!text.contains("supersecret"), "token leaked: {text}");
        assert!(!format!("{:?}", err).contains("supersecret"));
    }
}
