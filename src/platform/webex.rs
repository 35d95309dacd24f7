use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ActionInputs, MessagingClient};
use crate::config::WebexConfig;

const CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Plain-text body shown by clients that cannot render cards.
pub const CARD_FALLBACK_TEXT: &str = "Card Message: If you see this your client cannot render cards";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessage<'a> {
    room_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Attachment<'a> {
    content_type: &'static str,
    content: &'a Value,
}

#[derive(Debug, Deserialize)]
struct AttachmentAction {
    #[serde(default)]
    inputs: ActionInputs,
}

/// Webex REST client authenticated with the bot token.
pub struct WebexClient {
    client: reqwest::Client,
    config: WebexConfig,
}

impl WebexClient {
    pub fn new(config: WebexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webex API error on {} ({}): {}", what, status, error_body);
        }
        Ok(response)
    }

    async fn create_message(&self, message: &CreateMessage<'_>) -> Result<()> {
        let url = self.url("messages");
        debug!("Posting message to room {}", message.room_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.bot_token)
            .json(message)
            .send()
            .await
            .context("Failed to send message to Webex")?;

        Self::check(response, "create message").await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for WebexClient {
    async fn send_message(&self, room_id: &str, markdown: &str) -> Result<()> {
        self.create_message(&CreateMessage {
            room_id,
            markdown: Some(markdown),
            text: None,
            attachments: Vec::new(),
        })
        .await
    }

    async fn send_card(&self, room_id: &str, card: &Value) -> Result<()> {
        self.create_message(&CreateMessage {
            room_id,
            markdown: None,
            text: Some(CARD_FALLBACK_TEXT),
            attachments: vec![Attachment {
                content_type: CARD_CONTENT_TYPE,
                content: card,
            }],
        })
        .await
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        let url = self.url(&format!("messages/{}", message_id));
        debug!("Deleting message {}", message_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.config.bot_token)
            .send()
            .await
            .context("Failed to delete Webex message")?;

        Self::check(response, "delete message").await?;
        Ok(())
    }

    async fn action_inputs(&self, action_id: &str) -> Result<ActionInputs> {
        let url = self.url(&format!("attachment/actions/{}", action_id));
        debug!("Fetching attachment action {}", action_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.bot_token)
            .send()
            .await
            .context("Failed to fetch attachment action from Webex")?;

        let action: AttachmentAction = Self::check(response, "get attachment action")
            .await?
            .json()
            .await
            .context("Failed to parse attachment action")?;

        Ok(action.inputs)
    }
}
