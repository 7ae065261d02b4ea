//! Minimal Telegram Bot API client: the send/edit surface the notifier
//! needs plus long-polled updates for the command loop.

use crate::Error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<TgMessage>,

    #[serde(default)]
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,

    #[serde(default)]
    pub data: Option<String>,

    #[serde(default)]
    pub message: Option<TgMessage>,
}

#[derive(Debug)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, Error> {
        Self::with_base_url(API_BASE, token)
    }

    /// Point the client at a different API host, used by tests.
    pub fn with_base_url(base: &str, token: &str) -> Result<Self, Error> {
        // long polls must outlive the poll horizon
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(TelegramClient {
            client,
            base_url: format!("{}/bot{token}", base.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, Error> {
        let url = format!("{}/{method}", self.base_url);
        let response: ApiResponse<T> = self.client.post(&url).json(&body).send().await?.json().await?;
        if !response.ok {
            return Err(Error::Telegram(
                response.description.unwrap_or_else(|| method.to_string()),
            ));
        }
        response
            .result
            .ok_or_else(|| Error::Telegram(format!("{method}: ok without result")))
    }

    /// Send a Markdown message; returns the platform message id.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, Error> {
        let message: TgMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "Markdown",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(message.message_id)
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), Error> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": text,
                    "parse_mode": "Markdown",
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, query_id: &str, text: &str) -> Result<(), Error> {
        let _: serde_json::Value = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": query_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_s: u64) -> Result<Vec<TgUpdate>, Error> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": timeout_s }),
        )
        .await
    }
}
