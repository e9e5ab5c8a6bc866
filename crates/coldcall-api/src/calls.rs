//! Handlers for `/calls` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/calls` | Initiate one call |
//! | `POST` | `/calls/bulk` | Initiate a batch |
//! | `POST` | `/calls/:id/retry` | Re-dial a failed call |
//! | `GET`  | `/calls/:id` | 404 if not found |
//! | `GET`  | `/calls/:id/messages` | Transcript in conversational order |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use coldcall_core::{
  call::Call,
  message::CallMessage,
  script::TargetType,
  store::{CallStore, ScriptStore},
};
use coldcall_engine::{
  gateway::TelephonyGateway,
  orchestrator::{BulkOutcome, DialRequest},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Initiate ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InitiateBody {
  pub target_id:     Uuid,
  pub target_type:   TargetType,
  pub customer_name: String,
  pub phone_number:  String,
  /// Omit to select the active script for the target type.
  pub script_id:    Option<Uuid>,
  pub initiated_by: String,
}

impl From<InitiateBody> for DialRequest {
  fn from(body: InitiateBody) -> Self {
    Self {
      target_id:     body.target_id,
      target_type:   body.target_type,
      customer_name: body.customer_name,
      phone_number:  body.phone_number,
      script_id:     body.script_id,
      initiated_by:  body.initiated_by,
    }
  }
}

/// `POST /calls`
pub async fn initiate<S, G>(
  State(state): State<ApiState<S, G>>,
  Json(body): Json<InitiateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let call = state.orchestrator.initiate_call(body.into()).await?;
  Ok((StatusCode::CREATED, Json(call)))
}

// ─── Bulk ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkBody {
  pub calls: Vec<InitiateBody>,
}

#[derive(Debug, Serialize)]
pub struct BulkReplyError {
  pub target_id: Uuid,
  pub reason:    String,
}

#[derive(Debug, Serialize)]
pub struct BulkReply {
  pub queued:  Vec<Call>,
  pub skipped: usize,
  pub errors:  Vec<BulkReplyError>,
}

impl From<BulkOutcome> for BulkReply {
  fn from(outcome: BulkOutcome) -> Self {
    Self {
      queued:  outcome.queued,
      skipped: outcome.skipped,
      errors:  outcome
        .errors
        .into_iter()
        .map(|e| BulkReplyError { target_id: e.target_id, reason: e.reason })
        .collect(),
    }
  }
}

/// `POST /calls/bulk` — an oversized batch is rejected whole with 400.
pub async fn initiate_bulk<S, G>(
  State(state): State<ApiState<S, G>>,
  Json(body): Json<BulkBody>,
) -> Result<Json<BulkReply>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let requests = body.calls.into_iter().map(DialRequest::from).collect();
  let outcome = state.orchestrator.initiate_bulk_calls(requests).await?;
  Ok(Json(outcome.into()))
}

// ─── Retry ───────────────────────────────────────────────────────────────────

/// `POST /calls/:id/retry`
pub async fn retry<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let call = state.orchestrator.retry_call(id).await?;
  Ok((StatusCode::CREATED, Json(call)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /calls/:id`
pub async fn get_one<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Call>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let call = state
    .store
    .get_call(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("call {id} not found")))?;
  Ok(Json(call))
}

/// `GET /calls/:id/messages`
pub async fn messages<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<CallMessage>>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  state
    .store
    .get_call(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("call {id} not found")))?;
  let messages = state.store.get_messages(id).await.map_err(ApiError::store)?;
  Ok(Json(messages))
}
