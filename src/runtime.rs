use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::BotConfig;
use crate::dispatcher::Dispatcher;
use crate::handlers::{OfferInlineQuery, StartCommand};
use crate::keygen::KeyGenerator;
use crate::server::ServerState;
use crate::store::{InMemoryOfferStore, OfferStore};
use crate::telegram::{BotApi, SetWebhook, TelegramClient, User};

/// Everything the server needs, wired once at startup.
pub struct BotRuntime {
    pub config: BotConfig,
    pub me: User,
    pub store: Arc<dyn OfferStore>,
    pub keys: Arc<KeyGenerator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl BotRuntime {
    pub async fn bootstrap(config: BotConfig) -> Result<Self> {
        let client = TelegramClient::new(&config.bot_token)
            .context("failed to create Telegram client")?;
        Self::bootstrap_with(config, Arc::new(client)).await
    }

    /// Identify the bot, register the webhook and wire the handlers.
    pub async fn bootstrap_with(config: BotConfig, bot: Arc<dyn BotApi>) -> Result<Self> {
        let me = bot.get_me().await.context("failed to fetch bot identity")?;
        tracing::info!("Bot identity: {} (is_bot: {})", me.first_name, me.is_bot);
        let username = me
            .username
            .clone()
            .unwrap_or_else(|| me.first_name.clone());

        let webhook_url = config.webhook_url();
        bot.set_webhook(&SetWebhook {
            url: webhook_url.clone(),
            secret_token: config.webhook_secret.clone(),
            drop_pending_updates: false,
        })
        .await
        .with_context(|| format!("failed to register webhook at {}", webhook_url))?;
        tracing::info!("Webhook registered at {}", webhook_url);

        let store: Arc<dyn OfferStore> = Arc::new(InMemoryOfferStore::new());

        let mut dispatcher = Dispatcher::new(bot.clone(), username.clone());
        dispatcher.add_command(
            "start",
            Arc::new(StartCommand::new(&username, &config.web_app_domain)),
        );
        dispatcher.set_inline_query_handler(Arc::new(OfferInlineQuery::new(
            store.clone(),
            &config.web_app_domain,
        )));

        tracing::info!("{} has been started...", username);

        Ok(Self {
            config,
            me,
            store,
            keys: Arc::new(KeyGenerator::new()),
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            dispatcher: self.dispatcher.clone(),
            store: self.store.clone(),
            keys: self.keys.clone(),
            webhook_secret: self.config.webhook_secret.clone(),
        }
    }
}
