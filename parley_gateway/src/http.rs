//! JSON endpoints over the orchestrator, the round runner and message history.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Local, NaiveDateTime};
use parley_conversation::ConversationError;
use parley_core::{ExchangeParams, Page, TimeRange, monotonic_millis};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::server::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) | Self::Conversation(ConversationError::InvalidRounds(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conversation(ConversationError::AgentNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Conversation(ConversationError::Generation(_)) => StatusCode::BAD_GATEWAY,
            Self::Conversation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = status.as_u16(), "Request failed: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateRequest {
    pub sender_agent_id: i64,
    pub receiver_agent_id: i64,
    pub session_id: String,
    pub content: String,
    #[serde(default)]
    pub extra_params: Option<ExchangeParams>,
}

pub async fn conversation_private(
    State(state): State<AppState>,
    Json(req): Json<PrivateRequest>,
) -> ApiResult {
    let params = req.extra_params.unwrap_or_default();
    let reply = state
        .orchestrator
        .send_private(
            req.sender_agent_id,
            req.receiver_agent_id,
            &req.session_id,
            &req.content,
            &params,
        )
        .await?;
    Ok(Json(json!({ "reply": reply })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_id: String,
    #[serde(default)]
    pub sender_agent_id: Option<i64>,
    #[serde(default)]
    pub participant_ids: Vec<i64>,
    pub content: String,
    #[serde(default)]
    pub extra_params: Option<ExchangeParams>,
}

pub async fn conversation_room(
    State(state): State<AppState>,
    Json(req): Json<RoomRequest>,
) -> ApiResult {
    let params = req.extra_params.unwrap_or_default();
    let summary = state
        .orchestrator
        .broadcast_room(
            &req.room_id,
            req.sender_agent_id,
            &req.participant_ids,
            &req.content,
            &params,
        )
        .await?;
    Ok(Json(json!({
        "summary": summary.render(),
        "messageId": summary.message_id,
        "participants": summary.participants,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRequest {
    #[serde(default)]
    pub participant_ids: Vec<i64>,
    #[serde(default)]
    pub round_id: Option<i64>,
}

pub async fn round_run(State(state): State<AppState>, Json(req): Json<RoundRequest>) -> ApiResult {
    let round_id = req.round_id.unwrap_or_else(monotonic_millis);
    let report = state.rounds.run_round(&req.participant_ids, round_id).await;
    Ok(Json(json!({ "status": "ok", "roundId": round_id, "report": report })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub participant_ids: Vec<i64>,
    #[serde(default)]
    pub start_round_id: Option<i64>,
    #[serde(default)]
    pub rounds: Option<u32>,
}

pub async fn round_run_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> ApiResult {
    let start = req.start_round_id.unwrap_or_else(monotonic_millis);
    let reports = state
        .rounds
        .run_rounds(&req.participant_ids, start, req.rounds.unwrap_or(1))
        .await?;
    Ok(Json(json!({ "status": "ok", "roundsRun": reports.len() })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

fn clamp(limit: Option<u64>, default: u64, max: u64) -> u64 {
    limit.unwrap_or(default).clamp(1, max)
}

pub async fn public_feed(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> ApiResult {
    let items = state
        .store
        .recent_in_room(&state.public_room, clamp(q.limit, 10, 100))
        .await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn private_inbox(
    State(state): State<AppState>,
    Path(agent_id): Path<i64>,
    Query(q): Query<LimitQuery>,
) -> ApiResult {
    let items = state
        .store
        .recent_inbound_private(agent_id, clamp(q.limit, 10, 100))
        .await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn room_feed(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult {
    let items = state
        .store
        .recent_in_room(&room_id, clamp(q.limit, 20, 200))
        .await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn session_feed(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult {
    let items = state
        .store
        .recent_in_session(&session_id, clamp(q.limit, 50, 500))
        .await?;
    Ok(Json(json!({ "items": items })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByRoundQuery {
    pub round_id: i64,
    pub limit: Option<u64>,
}

pub async fn public_by_round(
    State(state): State<AppState>,
    Query(q): Query<ByRoundQuery>,
) -> ApiResult {
    let items = state
        .store
        .recent_in_room_by_round(&state.public_room, q.round_id, clamp(q.limit, 20, 200))
        .await?;
    Ok(Json(json!({ "items": items })))
}

/// Largest page size the chat history endpoints serve.
const MAX_PAGE_SIZE: u64 = 200;

/// Highest one-based page number; larger requests read this page.
const MAX_PAGE: u64 = 1_000_000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// One-based.
    pub page: Option<u64>,
    pub size: Option<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl HistoryQuery {
    fn page(&self) -> Page {
        Page {
            number: self.page.unwrap_or(1).clamp(1, MAX_PAGE) - 1,
            size: clamp(self.size, 20, MAX_PAGE_SIZE),
        }
    }

    fn range(&self) -> Result<TimeRange, ApiError> {
        Ok(TimeRange {
            from: self.start_time.as_deref().map(parse_time).transpose()?,
            to: self.end_time.as_deref().map(parse_time).transpose()?,
        })
    }
}

/// Epoch ms of an ISO-8601 timestamp. Values without an offset are local time.
fn parse_time(raw: &str) -> Result<i64, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|ts| ts.timestamp_millis())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp: {raw}")))
}

pub async fn group_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult {
    let page = q.page();
    let items = state.store.group_history(&room_id, q.range()?, page).await?;
    Ok(Json(json!({ "items": items, "page": page.number + 1, "size": page.size })))
}

// Spelled out rather than flattening `HistoryQuery`: flattened structs lose
// the numeric parsing of query strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateHistoryQuery {
    pub user_a: String,
    pub user_b: String,
    pub page: Option<u64>,
    pub size: Option<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

pub async fn private_history(
    State(state): State<AppState>,
    Query(q): Query<PrivateHistoryQuery>,
) -> ApiResult {
    let history = HistoryQuery {
        page: q.page,
        size: q.size,
        start_time: q.start_time,
        end_time: q.end_time,
    };
    let page = history.page();
    let items = state
        .store
        .private_history(&q.user_a, &q.user_b, history.range()?, page)
        .await?;
    Ok(Json(json!({ "items": items, "page": page.number + 1, "size": page.size })))
}
