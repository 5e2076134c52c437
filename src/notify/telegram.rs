// src/notify/telegram.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::message::{split_message, TELEGRAM_MAX_LEN};
use super::Notifier;
use crate::config::Credentials;
use crate::retry::{is_transient, RetryPolicy};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(credentials: &Credentials, retry: RetryPolicy) -> Self {
        Self {
            api_base: API_BASE.to_string(),
            bot_token: credentials.bot_token.clone(),
            chat_id: credentials.chat_id.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            retry,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Point at a different Bot API host (local bot server, test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send_once(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("telegram post")?
            .error_for_status()
            .map_err(|e| e.without_url())
            .context("telegram non-2xx")?;

        let api: ApiResponse = rsp.json().await.context("telegram response body")?;
        if api.ok {
            Ok(())
        } else {
            Err(anyhow!(
                "telegram API error: {}",
                api.description.unwrap_or_else(|| "unknown".into())
            ))
        }
    }
}

/// Messages over the Bot API length limit go out as several parts, in order.
/// Delivery counts as successful only if every part was accepted; the first
/// failed part stops the rest.
#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> bool {
        let parts = split_message(message, TELEGRAM_MAX_LEN);
        let total = parts.len();
        for (idx, part) in parts.iter().enumerate() {
            let res = self
                .retry
                .run("telegram send", |_| self.send_once(part), is_transient)
                .await;
            if let Err(e) = res {
                tracing::error!(
                    part = idx + 1,
                    parts = total,
                    "failed to send telegram message after all retries: {e:#}"
                );
                counter!("screener_notify_failures_total").increment(1);
                return false;
            }
        }
        tracing::info!(parts = total, "telegram message sent");
        true
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
