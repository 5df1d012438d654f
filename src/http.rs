//! HTTP transports. Handlers only adapt requests; all decisions live in the pipeline.

use crate::error::AppError;
use crate::models::payload::Transport;
use crate::processor::Pipeline;
use crate::telegram::{rejection_text, TelegramGate, Update};
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub telegram: TelegramGate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub checked_by: String,
    #[serde(default)]
    pub bon_livraison: Option<String>,
}

pub fn routes(config: &mut web::ServiceConfig) {
    config
        .service(gps_webhook)
        .service(telegram_webhook)
        .service(tracking_location)
        .service(mark_arrived)
        .service(check_truck)
        .service(health_check);
}

#[post("/api/gps/webhook")]
async fn gps_webhook(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let ack = data.pipeline.ingest(&Transport::Webhook, &body).await?;
    Ok(HttpResponse::Ok().json(ack))
}

#[post("/api/tracking/{token}/location")]
async fn tracking_location(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let transport = Transport::TrackingLink {
        token: path.into_inner(),
    };
    let ack = data.pipeline.ingest(&transport, &body).await?;
    Ok(HttpResponse::Ok().json(ack))
}

/// Always answers 200 unless a retry is wanted, since Telegram redelivers
/// updates on any other status. Replies ride along as an inline `sendMessage`.
#[post("/api/telegram/webhook")]
async fn telegram_webhook(
    data: web::Data<AppState>,
    update: web::Json<Update>,
) -> Result<HttpResponse, AppError> {
    let update = update.into_inner();
    let chat_id = update
        .message
        .as_ref()
        .or(update.edited_message.as_ref())
        .map(|m| m.chat.id);

    let outcome = match data.telegram.handle_update(update).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let Some(text) = rejection_text(&e) else {
                return Err(e);
            };
            warn!(?chat_id, "Telegram update rejected: {}", e);
            let body = match chat_id {
                Some(chat_id) => send_message(chat_id, text),
                None => json!({ "result": "rejected" }),
            };
            return Ok(HttpResponse::Ok().json(body));
        }
    };

    let body = match (chat_id, outcome.reply_text()) {
        (Some(chat_id), Some(text)) => send_message(chat_id, text),
        _ => json!(outcome),
    };
    Ok(HttpResponse::Ok().json(body))
}

fn send_message(chat_id: i64, text: &str) -> serde_json::Value {
    json!({
        "method": "sendMessage",
        "chat_id": chat_id,
        "text": text,
    })
}

#[post("/api/trucks/{id}/arrived")]
async fn mark_arrived(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ack = data.pipeline.mark_arrived(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ack))
}

#[post("/api/trucks/{id}/check")]
async fn check_truck(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CheckRequest>,
) -> Result<HttpResponse, AppError> {
    let CheckRequest {
        checked_by,
        bon_livraison,
    } = body.into_inner();
    if checked_by.trim().is_empty() {
        return Err(AppError::InvalidRequest("checkedBy is required".to_string()));
    }
    let bon_livraison = bon_livraison.filter(|b| !b.trim().is_empty());

    let record = data
        .pipeline
        .check_truck(path.into_inner(), checked_by, bon_livraison)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[get("/health")]
async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    match data.pipeline.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(e) => {
            error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({ "status": "unavailable" }))
        }
    }
}
