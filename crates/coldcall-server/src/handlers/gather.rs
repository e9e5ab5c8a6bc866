//! `POST /webhooks/gather/{call_id}?question_key=` — speech captured.

use axum::{
  body::Body,
  extract::{Path, Request, State},
  response::Response,
};
use coldcall_core::store::{CallStore, ScriptStore};
use coldcall_engine::{gateway::TelephonyGateway, textgen::TextGenerator};
use tracing::warn;
use uuid::Uuid;

use super::{authenticate, ensure_in_progress, load_call, reply_response, xml};
use crate::{AppState, error::Error, twiml};

pub async fn gather<S, G, T>(
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
  if call.status.is_terminal() {
    warn!(%call_id, status = %call.status, "gather webhook for terminal call ignored");
    return Ok(xml(twiml::empty_response()?));
  }
  let call = ensure_in_progress(&state.store, call).await?;

  let question_key = webhook.query("question_key");
  let speech = webhook.param("SpeechResult").unwrap_or_default().trim();

  // An empty capture is a no-response, not an answer.
  let reply = if speech.is_empty() {
    state.engine.handle_no_response(&call, question_key).await?
  } else {
    state
      .engine
      .process_client_response(&call, question_key, speech)
      .await?
  };
  reply_response(&state, call_id, reply).await
}
