use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cards::CardStore;
use crate::menu::{MenuTable, Response};
use crate::platform::{ActionCreated, InboundEvent, MessageCreated, MessagingClient};

/// Card input holding the pressed button's identifier.
const ACTION_INPUT: &str = "action";

/// What a webhook delivery amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    Ignored(&'static str),
}

/// Webhook handlers. Everything they talk to is injected, so tests can swap
/// in a recording client and a temporary card directory.
pub struct Bot {
    client: Arc<dyn MessagingClient>,
    cards: CardStore,
    menu: MenuTable,
    bot_email: String,
}

impl Bot {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        cards: CardStore,
        menu: MenuTable,
        bot_email: impl Into<String>,
    ) -> Self {
        Self {
            client,
            cards,
            menu,
            bot_email: bot_email.into(),
        }
    }

    pub fn menu(&self) -> &MenuTable {
        &self.menu
    }

    pub async fn handle(&self, event: &InboundEvent) -> Result<Outcome> {
        match event {
            InboundEvent::MessageCreated(message) => self.on_message(message).await,
            InboundEvent::ActionCreated(action) => self.on_action(action).await,
        }
    }

    /// Greet whoever wrote and show the root menu.
    async fn on_message(&self, message: &MessageCreated) -> Result<Outcome> {
        info!(
            "Message {} from {} in room {}",
            message.id.as_deref().unwrap_or("-"),
            message.person_email,
            message.room_id
        );

        // Our own messages come back through the same webhook.
        if message.person_email.eq_ignore_ascii_case(&self.bot_email) {
            debug!("Ignoring message sent by the bot itself");
            return Ok(Outcome::Ignored("message from the bot itself"));
        }

        self.client
            .send_message(&message.room_id, &self.menu.greeting)
            .await?;
        self.send_card(&message.room_id, &self.menu.root_card)
            .await?;

        Ok(Outcome::Replied)
    }

    /// Answer a card button press.
    async fn on_action(&self, action: &ActionCreated) -> Result<Outcome> {
        let inputs = self.client.action_inputs(&action.id).await?;

        // The card that was answered is stale now.
        self.client.delete_message(&action.message_id).await?;

        let identifier = match inputs
            .get(ACTION_INPUT)
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
        {
            Some(identifier) => identifier,
            None => {
                warn!(
                    "Attachment action {} has no '{}' input, ignoring",
                    action.id, ACTION_INPUT
                );
                return Ok(Outcome::Ignored("no action input"));
            }
        };

        let response = self.menu.dispatch(identifier);
        info!("Action '{}' in room {} -> {:?}", identifier, action.room_id, response);

        self.respond(&action.room_id, &response).await?;
        Ok(Outcome::Replied)
    }

    async fn respond(&self, room_id: &str, response: &Response) -> Result<()> {
        match response {
            Response::Card(card) => self.send_card(room_id, card).await,
            Response::Confirmation { message, follow_up } => {
                self.client.send_message(room_id, message).await?;
                if let Some(card) = follow_up {
                    self.send_card(room_id, card).await?;
                }
                Ok(())
            }
            Response::Fallback(message) => self.client.send_message(room_id, message).await,
        }
    }

    /// Send a card from the store, or tell the user it is unavailable.
    async fn send_card(&self, room_id: &str, name: &str) -> Result<()> {
        match self.cards.load(name).await {
            Ok(card) => self.client.send_card(room_id, &card).await,
            Err(e) => {
                error!("Failed to load card {}: {:#}", name, e);
                self.client
                    .send_message(room_id, &self.menu.unavailable_message(name))
                    .await
            }
        }
    }
}
