pub mod webex;

#[cfg(test)]
pub mod testing;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Fields a user submitted from a card, keyed by input id.
pub type ActionInputs = Map<String, Value>;

/// Outbound operations against the messaging platform.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Send a markdown message to a room.
    async fn send_message(&self, room_id: &str, markdown: &str) -> Result<()>;

    /// Send an Adaptive Card to a room.
    async fn send_card(&self, room_id: &str, card: &Value) -> Result<()>;

    async fn delete_message(&self, message_id: &str) -> Result<()>;

    /// Resolve an attachment action id into the inputs the user submitted.
    async fn action_inputs(&self, action_id: &str) -> Result<ActionInputs>;
}

/// Webhook envelope. Only `data` is used.
#[derive(Debug, Clone, Deserialize)]
struct Webhook<T> {
    data: T,
}

/// `messages:created`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreated {
    pub room_id: String,
    pub person_email: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// `attachmentActions:created`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCreated {
    /// Attachment action id, resolved through the client.
    pub id: String,
    pub room_id: String,
    /// The card message the button belongs to.
    pub message_id: String,
}

/// An event delivered by a webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    MessageCreated(MessageCreated),
    ActionCreated(ActionCreated),
}

impl InboundEvent {
    pub fn message_created(body: &[u8]) -> Result<Self> {
        parse_data(body).map(InboundEvent::MessageCreated)
    }

    pub fn action_created(body: &[u8]) -> Result<Self> {
        parse_data(body).map(InboundEvent::ActionCreated)
    }

    pub fn room_id(&self) -> &str {
        match self {
            InboundEvent::MessageCreated(m) => &m.room_id,
            InboundEvent::ActionCreated(a) => &a.room_id,
        }
    }
}

fn parse_data<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let webhook: Webhook<T> =
        serde_json::from_slice(body).context("Webhook body is missing required fields")?;
    Ok(webhook.data)
}
