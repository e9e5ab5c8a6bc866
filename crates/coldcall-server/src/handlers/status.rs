//! `POST /webhooks/status/{call_id}` — call lifecycle callbacks.

use axum::{
  body::Body,
  extract::{Path, Request, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use coldcall_core::{
  call::CallStatus,
  store::{CallStore, ScriptStore},
};
use coldcall_engine::{gateway::TelephonyGateway, textgen::TextGenerator};
use tracing::{info, warn};
use uuid::Uuid;

use super::{authenticate, load_call, spawn_enrichment};
use crate::{AppState, error::Error};

/// Map a gateway lifecycle event onto the call state machine. `initiated`
/// carries no transition; unknown events are tolerated.
fn map_event(event: &str) -> Option<CallStatus> {
  match event {
    "ringing" => Some(CallStatus::Ringing),
    "answered" | "in-progress" => Some(CallStatus::InProgress),
    "completed" => Some(CallStatus::Completed),
    "busy" => Some(CallStatus::Busy),
    "no-answer" => Some(CallStatus::NoAnswer),
    "failed" | "canceled" => Some(CallStatus::Failed),
    _ => None,
  }
}

pub async fn status<S, G, T>(
  State(state): State<AppState<S, G, T>>,
  Path(call_id): Path<Uuid>,
  req: Request<Body>,
) -> Result<Response, Error>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
  T: TextGenerator + Send + Sync + 'static,
{
  let webhook = authenticate(&state.auth, req).await?;

  let lock = state.locks.lock_for(call_id).await;
  let _guard = lock.lock().await;

  let call = load_call(&state.store, call_id).await?;
  let event = webhook
    .param("CallStatus")
    .ok_or_else(|| Error::BadRequest("missing CallStatus".into()))?;

  let Some(next) = map_event(event) else {
    if event != "initiated" {
      warn!(%call_id, event, "unknown status event ignored");
    }
    return Ok(StatusCode::OK.into_response());
  };

  if call.status.is_terminal() {
    // Replay against a finished call is a no-op.
    warn!(%call_id, event, status = %call.status,
      "status event for terminal call ignored");
    return Ok(StatusCode::OK.into_response());
  }
  if call.status != next && !call.status.can_transition_to(next) {
    warn!(%call_id, event, status = %call.status,
      "regressing status event ignored");
    return Ok(StatusCode::OK.into_response());
  }

  let updated = state
    .store
    .transition_status(call_id, next)
    .await
    .map_err(Error::store)?;
  info!(%call_id, status = %updated.status, "call status updated");

  if updated.status.is_terminal() {
    state.locks.release(call_id).await;
    if updated.status == CallStatus::Completed {
      spawn_enrichment(state.engine.clone(), call_id);
    }
  }
  Ok(StatusCode::OK.into_response())
}
