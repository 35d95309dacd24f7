use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bot::{Bot, Outcome};
use crate::platform::InboundEvent;

/// Body returned to every webhook delivery.
#[derive(Debug, Serialize)]
struct Ack {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    menu_entries: usize,
    checked_at: String,
}

/// A handler failure, reported to the platform as a failed delivery.
struct WebhookError(anyhow::Error);

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Ack {
                success: false,
                error: Some(format!("{:#}", self.0)),
            }),
        )
            .into_response()
    }
}

pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/", post(message_webhook))
        .route("/attachment_action", post(action_webhook))
        .route("/health", get(health))
        .with_state(bot)
}

/// Serve the webhooks until Ctrl-C.
pub async fn serve(address: &str, bot: Arc<Bot>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening for webhooks on {}", address);

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("Webhook server failed")
}

async fn message_webhook(
    State(bot): State<Arc<Bot>>,
    body: Bytes,
) -> Result<Json<Ack>, WebhookError> {
    deliver(&bot, "messages", InboundEvent::message_created(&body), &body).await
}

async fn action_webhook(
    State(bot): State<Arc<Bot>>,
    body: Bytes,
) -> Result<Json<Ack>, WebhookError> {
    deliver(&bot, "attachment_actions", InboundEvent::action_created(&body), &body).await
}

async fn deliver(
    bot: &Bot,
    route: &'static str,
    parsed: Result<InboundEvent>,
    body: &[u8],
) -> Result<Json<Ack>, WebhookError> {
    let span = info_span!("webhook", route, correlation_id = %Uuid::new_v4());

    async move {
        debug!("Payload: {}", String::from_utf8_lossy(body));

        // Nothing to act on, but the delivery itself was fine.
        let event = match parsed {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring webhook: {:#}", e);
                return Ok(ack());
            }
        };

        match bot.handle(&event).await {
            Ok(Outcome::Replied) => {
                info!("Replied in room {}", event.room_id());
                Ok(ack())
            }
            Ok(Outcome::Ignored(reason)) => {
                debug!("Ignored: {}", reason);
                Ok(ack())
            }
            Err(e) => {
                error!("Webhook failed: {:#}", e);
                Err(WebhookError(e))
            }
        }
    }
    .instrument(span)
    .await
}

fn ack() -> Json<Ack> {
    Json(Ack {
        success: true,
        error: None,
    })
}

async fn health(State(bot): State<Arc<Bot>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: env!("CARGO_PKG_NAME"),
        menu_entries: bot.menu().entry_count(),
        checked_at: Utc::now().to_rfc3339(),
    })
}
