use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::telegram::{BotApi, InlineQuery, Message, Update};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, bot: &dyn BotApi, message: &Message) -> Result<()>;
}

#[async_trait]
pub trait InlineQueryHandler: Send + Sync {
    async fn handle(&self, bot: &dyn BotApi, query: &InlineQuery) -> Result<()>;
}

/// Routes webhook updates to registered handlers.
pub struct Dispatcher {
    bot: Arc<dyn BotApi>,
    bot_username: String,
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    inline_query: Option<Arc<dyn InlineQueryHandler>>,
}

impl Dispatcher {
    pub fn new(bot: Arc<dyn BotApi>, bot_username: impl Into<String>) -> Self {
        Self {
            bot,
            bot_username: bot_username.into(),
            commands: HashMap::new(),
            inline_query: None,
        }
    }

    pub fn add_command(&mut self, name: &str, handler: Arc<dyn CommandHandler>) {
        self.commands.insert(name.to_ascii_lowercase(), handler);
    }

    pub fn set_inline_query_handler(&mut self, handler: Arc<dyn InlineQueryHandler>) {
        self.inline_query = Some(handler);
    }

    /// Handle one update. Handler failures are logged, never returned: the
    /// webhook response does not depend on them.
    pub async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        if let Err(error) = self.route(update).await {
            tracing::error!("Update {} handler failed: {:#}", update_id, error);
        }
    }

    async fn route(&self, update: Update) -> Result<()> {
        if let Some(query) = update.inline_query {
            let Some(handler) = self.inline_query.as_ref() else {
                tracing::debug!("No inline query handler registered; dropping {}", query.id);
                return Ok(());
            };
            tracing::debug!("Inline query {} from user {}", query.id, query.from.id);
            return handler.handle(self.bot.as_ref(), &query).await;
        }

        if let Some(message) = update.message {
            let Some(command) = message.command() else {
                return Ok(());
            };
            if let Some(target) = command.target {
                if !target.eq_ignore_ascii_case(&self.bot_username) {
                    tracing::debug!("Ignoring /{} addressed to @{}", command.name, target);
                    return Ok(());
                }
            }
            let Some(handler) = self.commands.get(&command.name.to_ascii_lowercase()) else {
                tracing::debug!("Unknown command /{}", command.name);
                return Ok(());
            };
            tracing::info!("Command /{} in chat {}", command.name, message.chat.id);
            return handler.handle(self.bot.as_ref(), &message).await;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{command_update, inline_update, RecordingBot};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler for Counting {
        async fn handle(&self, _bot: &dyn BotApi, _message: &Message) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl InlineQueryHandler for Counting {
        async fn handle(&self, _bot: &dyn BotApi, _query: &InlineQuery) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("inline handler failed")
        }
    }

    fn dispatcher_with(command: Arc<Counting>, inline: Arc<Counting>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::new(RecordingBot::default()), "offer_bot");
        dispatcher.add_command("start", command);
        dispatcher.set_inline_query_handler(inline);
        dispatcher
    }

    #[tokio::test]
    async fn routes_commands_by_name_and_target() {
        let command = Arc::new(Counting::default());
        let dispatcher = dispatcher_with(command.clone(), Arc::new(Counting::default()));

        dispatcher.dispatch(command_update("/start")).await;
        dispatcher.dispatch(command_update("/START@Offer_Bot")).await;
        dispatcher.dispatch(command_update("/start@other_bot")).await;
        dispatcher.dispatch(command_update("/help")).await;

        assert_eq!(command.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let command = Arc::new(Counting::default());
        let dispatcher = dispatcher_with(command.clone(), Arc::new(Counting::default()));

        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 3,
            "message": { "message_id": 1, "chat": { "id": 1 }, "text": "start" }
        }))
        .unwrap();
        dispatcher.dispatch(update).await;

        assert_eq!(command.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_errors_do_not_escape_dispatch() {
        let inline = Arc::new(Counting::default());
        let dispatcher = dispatcher_with(Arc::new(Counting::default()), inline.clone());

        dispatcher.dispatch(inline_update("abcde")).await;
        dispatcher.dispatch(inline_update("")).await;

        assert_eq!(inline.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_queries_without_handler_are_dropped() {
        let bot = Arc::new(RecordingBot::default());
        let dispatcher = Dispatcher::new(bot.clone(), "offer_bot");
        dispatcher.dispatch(inline_update("abcde")).await;
        assert!(bot.answers().is_empty());
    }
}
