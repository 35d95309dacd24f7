//! In-memory `MessagingClient` that records every call.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{ActionInputs, MessagingClient};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Message { room_id: String, markdown: String },
    Card { room_id: String, card: Value },
    Delete { message_id: String },
    Inputs { action_id: String },
}

#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    inputs: ActionInputs,
    fail_sends: bool,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `action_inputs` with these fields.
    pub fn with_inputs(inputs: Value) -> Self {
        Self {
            inputs: inputs.as_object().cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Every send fails, as if the platform were down.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Messages and cards only.
    pub async fn sends(&self) -> Vec<Call> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, Call::Message { .. } | Call::Card { .. }))
            .collect()
    }

    async fn record(&self, call: Call) -> Result<()> {
        let is_send = matches!(call, Call::Message { .. } | Call::Card { .. });
        self.calls.lock().await.push(call);
        if is_send && self.fail_sends {
            anyhow::bail!("Webex API error on create message (429 Too Many Requests)");
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for RecordingClient {
    async fn send_message(&self, room_id: &str, markdown: &str) -> Result<()> {
        self.record(Call::Message {
            room_id: room_id.to_string(),
            markdown: markdown.to_string(),
        })
        .await
    }

    async fn send_card(&self, room_id: &str, card: &Value) -> Result<()> {
        self.record(Call::Card {
            room_id: room_id.to_string(),
            card: card.clone(),
        })
        .await
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.record(Call::Delete {
            message_id: message_id.to_string(),
        })
        .await
    }

    async fn action_inputs(&self, action_id: &str) -> Result<ActionInputs> {
        self.record(Call::Inputs {
            action_id: action_id.to_string(),
        })
        .await?;
        Ok(self.inputs.clone())
    }
}
