use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

use guestbook_chat::{ChatEngine, DEFAULT_PAGE_LIMIT};
use guestbook_types::api::{AdminReplyRequest, SendMessageRequest};
use guestbook_types::models::MessageThread;

use crate::error::ApiError;

pub type AppState = Arc<ChatEngine>;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Fetch top-level messages with `id` strictly below this; omit for
    /// the most recent page.
    pub cursor: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

/// `GET /chat` — one page of threads, newest first, replies attached.
pub async fn list_messages(
    State(engine): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<MessageThread>>, ApiError> {
    let threads = engine.load_messages(query.cursor, query.limit).await?;
    Ok(Json(threads))
}

/// `GET /chat/count` — total stored messages, replies included.
pub async fn message_count(State(engine): State<AppState>) -> Result<Json<i64>, ApiError> {
    let count = engine.message_count().await?;
    Ok(Json(count))
}

/// `POST /chat` — public guest submission.
pub async fn send_message(
    State(engine): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = engine
        .send_message(&req.name, &req.content, req.reply_to_id)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /chat/reply` — operator reply, bearer token required.
pub async fn admin_reply(
    State(engine): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = engine
        .admin_reply(&req.content, req.reply_to_id, bearer_token(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `DELETE /chat/{id}` — operator delete, bearer token required.
pub async fn admin_delete(
    State(engine): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    engine.admin_delete(id, bearer_token(&headers)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Extract the bearer token from the Authorization header. A missing or
/// non-bearer header yields an empty token, which the verifier rejects.
fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
}
