//! `POST /webhooks/voice/{call_id}` — the call was answered.

use axum::{
  body::Body,
  extract::{Path, Request, State},
  response::Response,
};
use coldcall_core::store::{CallStore, ScriptStore};
use coldcall_engine::{gateway::TelephonyGateway, textgen::TextGenerator};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
  authenticate, ensure_in_progress, fallback_action, gather_action,
  load_call, reply_response, xml,
};
use crate::{AppState, error::Error, twiml};

pub async fn voice<S, G, T>(
  State(state): State<AppState<S, G, T>>,
  Path(call_id): Path<Uuid>,
  req: Request<Body>,
) -> Result<Response, Error>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
  T: TextGenerator + Send + Sync + 'static,
{
  authenticate(&state.auth, req).await?;

  let lock = state.locks.lock_for(call_id).await;
  let _guard = lock.lock().await;

  let call = load_call(&state.store, call_id).await?;
  if call.status.is_terminal() {
    warn!(%call_id, status = %call.status, "voice webhook for terminal call ignored");
    return Ok(xml(twiml::empty_response()?));
  }
  let call = ensure_in_progress(&state.store, call).await?;

  if call.current_question_index == 0 {
    info!(%call_id, "call answered; opening conversation");
    let reply = state.engine.build_greeting(&call).await?;
    return reply_response(&state, call_id, reply).await;
  }

  // Redelivered answer event mid-conversation: re-issue the pending gather
  // without recording another transcript line.
  let script = state
    .store
    .get_script(call.script_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::BadRequest("call references a missing script".into()))?;
  let pending = call
    .current_question_index
    .checked_sub(1)
    .and_then(|i| script.question_at(i));

  match pending {
    Some(q) => Ok(xml(twiml::speak_and_gather(&twiml::GatherPrompt {
      text:     &q.text_primary,
      action:   &gather_action(call_id, Some(&q.key)),
      fallback: &fallback_action(call_id, Some(&q.key)),
    })?)),
    None => Ok(xml(twiml::empty_response()?)),
  }
}
