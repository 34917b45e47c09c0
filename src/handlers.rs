use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::dispatcher::{CommandHandler, InlineQueryHandler};
use crate::store::OfferStore;
use crate::telegram::{
    AnswerInlineQuery, BotApi, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery,
    InlineQueryResult, InlineQueryResultContact, InlineQueryResultsButton,
    InputTextMessageContent, Message, ParseMode, ReplyParameters, SendMessage, WebAppInfo,
};

pub const START_BUTTON_TEXT: &str = "Press me";
pub const OPEN_FORM_TEXT: &str = "Open form";
pub const PUBLISH_PHONE_TEXT: &str = "Жми сюда";
pub const PUBLISH_TITLE_TEXT: &str = "Опубликовать моё предложение";

/// `/start`: greet and offer a button into the web app.
pub struct StartCommand {
    bot_username: String,
    web_app_url: String,
}

impl StartCommand {
    pub fn new(bot_username: impl Into<String>, web_app_url: impl Into<String>) -> Self {
        Self {
            bot_username: bot_username.into(),
            web_app_url: web_app_url.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for StartCommand {
    async fn handle(&self, bot: &dyn BotApi, message: &Message) -> Result<()> {
        let request = SendMessage {
            chat_id: message.chat.id,
            text: format!("Hello, I'm @{}.\n", self.bot_username),
            parse_mode: Some(ParseMode::Html),
            reply_parameters: Some(ReplyParameters {
                message_id: message.message_id,
            }),
            reply_markup: Some(InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: START_BUTTON_TEXT.to_string(),
                    web_app: Some(WebAppInfo {
                        url: self.web_app_url.clone(),
                    }),
                }]],
            }),
        };

        bot.send_message(&request)
            .await
            .context("failed to send start message")?;
        Ok(())
    }
}

/// Resolves an inline query as an offer key. Each key is revealed once.
pub struct OfferInlineQuery {
    store: Arc<dyn OfferStore>,
    web_app_url: String,
}

impl OfferInlineQuery {
    pub fn new(store: Arc<dyn OfferStore>, web_app_url: impl Into<String>) -> Self {
        Self {
            store,
            web_app_url: web_app_url.into(),
        }
    }

    fn empty_answer(&self, query: &InlineQuery) -> AnswerInlineQuery {
        AnswerInlineQuery {
            inline_query_id: query.id.clone(),
            results: Vec::new(),
            button: Some(InlineQueryResultsButton {
                text: OPEN_FORM_TEXT.to_string(),
                web_app: Some(WebAppInfo {
                    url: self.web_app_url.clone(),
                }),
            }),
        }
    }
}

#[async_trait]
impl InlineQueryHandler for OfferInlineQuery {
    async fn handle(&self, bot: &dyn BotApi, query: &InlineQuery) -> Result<()> {
        let offer = if query.query.is_empty() {
            None
        } else {
            self.store.take(&query.query)
        };

        let Some(message) = offer else {
            return bot
                .answer_inline_query(&self.empty_answer(query))
                .await
                .with_context(|| format!("failed to answer inline query {}", query.id));
        };

        tracing::info!("Offer {} claimed by user {}", query.query, query.from.id);
        let answer = AnswerInlineQuery {
            inline_query_id: query.id.clone(),
            results: vec![InlineQueryResult::Contact(InlineQueryResultContact {
                id: "1".to_string(),
                phone_number: PUBLISH_PHONE_TEXT.to_string(),
                first_name: PUBLISH_TITLE_TEXT.to_string(),
                input_message_content: Some(InputTextMessageContent {
                    message_text: message.clone(),
                    parse_mode: Some(ParseMode::Markdown),
                }),
            })],
            button: None,
        };

        if let Err(error) = bot.answer_inline_query(&answer).await {
            // The user never saw the offer; keep it claimable.
            self.store.put(&query.query, message);
            return Err(error)
                .with_context(|| format!("failed to answer inline query {}", query.id));
        }
        Ok(())
    }
}
