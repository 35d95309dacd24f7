mod bot;
mod cards;
mod config;
mod menu;
mod platform;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::cards::CardStore;
use crate::config::Config;
use crate::menu::MenuTable;
use crate::platform::webex::WebexClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,helpdesk_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bot: {}", config.webex.bot_email);
    info!("  Webex API: {}", config.webex.base_url);

    let menu = match &config.menu.path {
        Some(path) => MenuTable::load(path)?,
        None => MenuTable::builtin()?,
    };

    let cards = CardStore::new(config.cards.directory.clone());
    info!("  Cards: {}", cards.directory().display());
    let report = cards.check(&menu).await;
    if !report.is_clean() {
        warn!(
            "Menu and cards disagree: {} missing cards, {} unrouted buttons",
            report.missing_cards.len(),
            report.unrouted_actions.len()
        );
    }

    let client = Arc::new(WebexClient::new(config.webex.clone()));
    let bot = Arc::new(Bot::new(client, cards, menu, config.webex.bot_email.clone()));

    info!("Bot is starting...");
    server::serve(&config.listen_address(), bot).await?;

    Ok(())
}
