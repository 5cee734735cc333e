pub mod ledger;
pub mod transactions;
pub mod webhook;

use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_pool: Option<DbPoolStats>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (db_status, db_pool) = match &state.db {
        Some(pool) => {
            let db_status = match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => "connected",
                Err(_) => "disconnected",
            };
            let stats = DbPoolStats {
                active_connections: pool.size(),
                idle_connections: pool.num_idle() as u32,
                max_connections: pool.options().get_max_connections(),
            };
            (db_status, Some(stats))
        }
        None => ("not configured", None),
    };

    let healthy = db_status != "disconnected";
    let health_response = HealthStatus {
        status: if healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
        db_pool,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
