//! Inbound settlement-provider webhook. Authenticity is checked against the
//! raw body before anything is parsed or mutated.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;
use crate::services::Observation;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: Option<String>,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    /// Provider-assigned transfer id; the only value used for lookup.
    pub id: String,
    pub status: String,
}

/// HMAC-SHA256 over the raw request body, base64 in the signature header.
/// The hmac crate's `verify_slice` compares in constant time.
pub fn verify_signature(secret: &[u8], signature_b64: &str, body: &[u8]) -> Result<(), AppError> {
    let provided = BASE64
        .decode(signature_b64)
        .map_err(|_| AppError::Authentication("signature is not valid base64".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| AppError::Authentication("webhook secret is not usable".to_string()))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| AppError::Authentication("invalid webhook signature".to_string()))
}

pub async fn settlement_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            AppError::Authentication(format!("missing {} header", SIGNATURE_HEADER))
        })?;
    verify_signature(state.config.webhook_secret.as_bytes(), signature, &body)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook payload: {}", e)))?;
    let raw = serde_json::from_slice::<serde_json::Value>(&body).ok();

    let transfer_id = event.data.id;
    match state
        .engine
        .observe(&transfer_id, &event.data.status, raw.as_ref())
        .await
    {
        Ok(outcome) => {
            if outcome.halts_polling() {
                state.pollers.cancel(&transfer_id).await;
            }
            let message = match &outcome {
                Observation::Confirmed { .. } => "Transfer confirmed",
                Observation::AlreadyConfirmed => "Already confirmed before",
                Observation::Transitioned { .. } => "Status updated",
                Observation::Noop { .. } => "Acknowledged",
                Observation::Ignored { .. } => "Ignored unrecognized status",
            };
            Ok(Json(json!({ "success": true, "message": message })))
        }
        Err(AppError::NotFound(what)) if !state.config.webhook_strict => {
            // Acknowledge so the provider does not hammer us with retries
            // for a transfer we never created.
            warn!(transfer_id = %transfer_id, "webhook for unknown transfer");
            Ok(Json(json!({
                "success": true,
                "message": format!("{} not recognized", what),
            })))
        }
        Err(e) => Err(e),
    }
}
