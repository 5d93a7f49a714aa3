use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::AppError;
use crate::http;
use crate::notify::InstantChannel;

const SEND_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Telegram Bot API `sendMessage`.
pub struct Telegram {
    client: Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl Telegram {
    pub fn new(api_base: &str, token: Option<String>, chat_id: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            client: http::client(SEND_TIMEOUT)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            chat_id: chat_id.filter(|c| !c.is_empty()),
        })
    }

    /// Credentials come from `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env(config: &TelegramConfig) -> Result<Self, AppError> {
        Self::new(
            &config.api_base,
            std::env::var("TELEGRAM_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        )
    }
}

#[async_trait]
impl InstantChannel for Telegram {
    async fn send(&self, message: &str) -> Result<(), AppError> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::warn!("Telegram not configured (TELEGRAM_TOKEN / TELEGRAM_CHAT_ID unset), skipping");
            return Ok(());
        };

        let url = format!("{}/bot{token}/sendMessage", self.api_base);
        let resp = self
            .client
            .post(&url)
            .form(&[("chat_id", chat_id.as_str()), ("text", message)])
            .send()
            .await?;
        http::ensure_success(resp).await.map_err(|e| match e {
            // The token is part of the URL; keep it out of the logs.
            AppError::Status { status, body, .. } => {
                AppError::Notify(format!("telegram returned {status}: {body}"))
            }
            other => other,
        })?;

        tracing::info!("Telegram message sent");
        Ok(())
    }
}
