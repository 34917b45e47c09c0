use anyhow::{anyhow, Result};
use std::env;

/// Address the HTTP server binds to.
pub const BIND_ADDR: &str = "0.0.0.0:8080";

/// Path Telegram delivers webhook updates to.
pub const WEBHOOK_PATH: &str = "/bot/";

/// Path the web app posts offer forms to.
pub const FORM_PATH: &str = "/bot/form";

pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
pub const WEBHOOK_SECRET_VAR: &str = "BOT_WEBHOOK_SECRET";
pub const BOT_DOMAIN_VAR: &str = "BOT_DOMAIN";
pub const WEB_APP_DOMAIN_VAR: &str = "WEB_APP_DOMAIN";

#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub webhook_secret: String,
    /// Public base URL of this service, used to register the webhook.
    pub bot_domain: String,
    /// Public URL of the offer form. Doubles as the CORS origin.
    pub web_app_domain: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("bot_domain", &self.bot_domain)
            .field("web_app_domain", &self.web_app_domain)
            .finish()
    }
}

impl BotConfig {
    /// Load from the process environment. Every variable is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| -> Result<String> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| anyhow!("{} is required but not set", name))
        };

        Ok(Self {
            bot_token: require(BOT_TOKEN_VAR)?,
            webhook_secret: require(WEBHOOK_SECRET_VAR)?,
            bot_domain: require(BOT_DOMAIN_VAR)?,
            web_app_domain: require(WEB_APP_DOMAIN_VAR)?,
        })
    }

    /// Full URL Telegram should push updates to.
    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.bot_domain.trim_end_matches('/'), WEBHOOK_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (BOT_TOKEN_VAR, "123:abc".to_string()),
            (WEBHOOK_SECRET_VAR, "s3cret".to_string()),
            (BOT_DOMAIN_VAR, "https://bot.example.com".to_string()),
            (WEB_APP_DOMAIN_VAR, "https://form.example.com".to_string()),
        ])
    }

    #[test]
    fn loads_all_required_values() {
        let vars = full_env();
        let config = BotConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.webhook_secret, "s3cret");
        assert_eq!(config.web_app_domain, "https://form.example.com");
        assert_eq!(config.webhook_url(), "https://bot.example.com/bot/");
    }

    #[test]
    fn missing_variable_is_named_in_error() {
        let mut vars = full_env();
        vars.remove(BOT_DOMAIN_VAR);
        let err = BotConfig::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert!(err.to_string().contains("BOT_DOMAIN"));
    }

    #[test]
    fn blank_variable_counts_as_missing() {
        let mut vars = full_env();
        vars.insert(WEBHOOK_SECRET_VAR, "   ".to_string());
        let err = BotConfig::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert!(err.to_string().contains("BOT_WEBHOOK_SECRET"));
    }

    #[test]
    fn webhook_url_tolerates_trailing_slash() {
        let mut vars = full_env();
        vars.insert(BOT_DOMAIN_VAR, "https://bot.example.com/".to_string());
        let config = BotConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(config.webhook_url(), "https://bot.example.com/bot/");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let vars = full_env();
        let config = BotConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("123:abc"));
        assert!(!rendered.contains("s3cret"));
    }
}
