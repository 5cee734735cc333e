use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::services::CreateExchangeRequest;

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateExchangeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.exchange.create_transaction(request).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.store.get(id).await?;
    Ok(Json(tx))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("user_id query parameter is required".to_string()))?;
    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    let txs = state.store.list_for_user(user_id, limit, offset).await?;
    Ok(Json(txs))
}
