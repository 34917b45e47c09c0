//! Telegram Bot API surface used by the offer bot.
//!
//! Only four methods are needed: `getMe` at startup, `setWebhook` to register
//! the `/bot/` receiver, `sendMessage` for `/start` and `answerInlineQuery`
//! to publish offers. Updates arrive through the webhook, so there is no
//! polling loop here.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http_client::build_http_client;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Header Telegram uses to echo the webhook secret back to us.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

// ─── Incoming types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
}

/// A `/command` or `/command@bot` at the start of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand<'a> {
    pub name: &'a str,
    pub target: Option<&'a str>,
}

impl Message {
    /// The `bot_command` entity at offset 0, sliced by its UTF-16 length.
    pub fn command(&self) -> Option<BotCommand<'_>> {
        let entity = self
            .entities
            .iter()
            .find(|entity| entity.kind == "bot_command" && entity.offset == 0)?;

        let token = utf16_prefix(self.text.as_deref()?, entity.length)?;
        let token = token.strip_prefix('/')?;
        let (name, target) = match token.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (token, None),
        };
        if name.is_empty() {
            return None;
        }
        Some(BotCommand { name, target })
    }
}

/// Leading slice of `text` spanning `units` UTF-16 code units, if that lands
/// on a char boundary inside the text.
fn utf16_prefix(text: &str, units: usize) -> Option<&str> {
    let mut seen = 0;
    for (index, ch) in text.char_indices() {
        if seen == units {
            return Some(&text[..index]);
        }
        if seen > units {
            return None;
        }
        seen += ch.len_utf16();
    }
    (seen == units).then_some(text)
}

// ─── Outgoing types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputTextMessageContent {
    pub message_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineQueryResultContact {
    pub id: String,
    pub phone_number: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_message_content: Option<InputTextMessageContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineQueryResult {
    Contact(InlineQueryResultContact),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineQueryResultsButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerInlineQuery {
    pub inline_query_id: String,
    pub results: Vec<InlineQueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<InlineQueryResultsButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetWebhook {
    pub url: String,
    pub secret_token: String,
    pub drop_pending_updates: bool,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// The slice of the Bot API handlers depend on; fakes implement it in tests.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_me(&self) -> Result<User>;

    async fn set_webhook(&self, request: &SetWebhook) -> Result<()>;

    async fn send_message(&self, request: &SendMessage) -> Result<Message>;

    async fn answer_inline_query(&self, request: &AnswerInlineQuery) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramClient {
    api_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            api_base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client: build_http_client(Some(Duration::from_secs(30)))?,
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_base, method);

        // The URL embeds the bot token, keep it out of error messages.
        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {} request failed", method))?;

        let status = response.status();
        let body: TelegramResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {} returned unreadable body (HTTP {})", method, status))?;

        if !body.ok {
            bail!(
                "Telegram {} failed (HTTP {}): {}",
                method,
                status,
                body.description.as_deref().unwrap_or("no description")
            );
        }

        body.result
            .ok_or_else(|| anyhow!("Telegram {} returned ok without a result", method))
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    async fn set_webhook(&self, request: &SetWebhook) -> Result<()> {
        let _: bool = self.call("setWebhook", request).await?;
        Ok(())
    }

    async fn send_message(&self, request: &SendMessage) -> Result<Message> {
        self.call("sendMessage", request).await
    }

    async fn answer_inline_query(&self, request: &AnswerInlineQuery) -> Result<()> {
        let _: bool = self.call("answerInlineQuery", request).await?;
        Ok(())
    }
}
