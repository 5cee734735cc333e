use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::domain::EntryType;
use crate::error::AppError;
use crate::ports::LedgerFilter;

#[derive(Deserialize)]
pub struct ListQuery {
    pub owner_id: Option<Uuid>,
    pub entry_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entry_type = match &query.entry_type {
        Some(raw) => Some(EntryType::from_str(raw).ok_or_else(|| {
            AppError::Validation(format!("unknown entry type '{}'", raw))
        })?),
        None => None,
    };

    let entries = state
        .ledger
        .list_entries(
            LedgerFilter {
                owner_id: query.owner_id,
                entry_type,
            },
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0),
        )
        .await?;

    Ok(Json(entries))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.ledger.balance(owner_id).await?;
    Ok(Json(json!({ "owner_id": owner_id, "balance": balance })))
}
