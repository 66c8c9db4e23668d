//! Telegram Bot API notifier.
//!
//! Delivers messages via the `sendMessage` endpoint with HTML formatting.
//! Tenant-facing messages carry an inline "Ask AI" button; operator
//! messages are sent plain.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::Notifier;
use crate::error::NotifyError;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends messages via the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot_token: String,
    ask_ai_button: bool,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Returns [`NotifyError::Config`] if the token is empty.
    pub fn new(client: reqwest::Client, bot_token: impl Into<String>) -> Result<Self, NotifyError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(NotifyError::Config("Telegram bot token must not be empty".to_string()));
        }

        Ok(Self {
            bot_token,
            ask_ai_button: false,
            client,
        })
    }

    /// Attach the inline "Ask AI" button to every message.
    pub fn with_ask_ai_button(mut self, enabled: bool) -> Self {
        self.ask_ai_button = enabled;
        self
    }

    fn payload(&self, chat_id: &str, text: &str) -> Value {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        if self.ask_ai_button {
            body["reply_markup"] = json!({
                "inline_keyboard": [[{ "text": "Ask AI", "callback_data": "ask_ai" }]]
            });
        }

        body
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, receiver: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.bot_token);
        let body = self.payload(receiver, text);

        tracing::debug!(chat_id = %receiver, "Sending Telegram message");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let resp_body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() && resp_body.get("ok") == Some(&Value::Bool(true)) {
            return Ok(());
        }

        let description = resp_body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Telegram API error")
            .to_string();

        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
