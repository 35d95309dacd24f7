use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the bot's access token.
pub const TOKEN_ENV: &str = "WT_BOT_TOKEN";
/// Environment variable holding the bot's own email (sender identity).
pub const EMAIL_ENV: &str = "WT_BOT_EMAIL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webex: WebexConfig,
    #[serde(default)]
    pub cards: CardsConfig,
    #[serde(default)]
    pub menu: MenuConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebexConfig {
    #[serde(default)]
    pub bot_token: String,
    /// The bot's own email. Messages sent from this address are ignored.
    #[serde(default)]
    pub bot_email: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CardsConfig {
    #[serde(default = "default_cards_dir")]
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MenuConfig {
    /// Menu definition file. The built-in helpdesk menu is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_base_url() -> String {
    "https://webexapis.com/v1".to_string()
}

fn default_cards_dir() -> PathBuf {
    PathBuf::from("cards")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for WebexConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_email: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            directory: default_cards_dir(),
        }
    }
}

impl Config {
    /// Load the config file (if present), apply environment overrides and
    /// check that the required settings are there.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Override settings from the environment. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.webex.bot_token = token;
        }
        if let Some(email) = lookup(EMAIL_ENV).filter(|v| !v.trim().is_empty()) {
            self.webex.bot_email = email;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.webex.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Missing bot token: set {} or [webex] bot_token in the config file",
                TOKEN_ENV
            );
        }
        if self.webex.bot_email.trim().is_empty() {
            anyhow::bail!(
                "Missing bot email: set {} or [webex] bot_email in the config file",
                EMAIL_ENV
            );
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
