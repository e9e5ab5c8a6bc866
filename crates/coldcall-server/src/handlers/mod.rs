//! Webhook request handlers.
//!
//! Shared discipline: verify the signature before touching any state, then
//! serialise on the per-call lock for the whole handler body.

pub mod fallback;
pub mod gather;
pub mod status;
pub mod voice;

use std::sync::Arc;

use axum::{
  body::Body,
  extract::Request,
  http::header,
  response::{IntoResponse, Response},
};
use coldcall_core::{
  call::{Call, CallStatus},
  store::{CallStore, ScriptStore},
};
use coldcall_engine::{
  conversation::{ConversationEngine, EngineReply},
  textgen::TextGenerator,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{SignatureConfig, parse_form, verify_signature},
  error::Error,
  twiml::{self, GatherPrompt},
};

const MAX_WEBHOOK_BODY: usize = 64 * 1024;

/// A signature-verified webhook request: decoded POST params and query.
pub(crate) struct WebhookRequest {
  params: Vec<(String, String)>,
  query:  Vec<(String, String)>,
}

impl WebhookRequest {
  pub fn param(&self, key: &str) -> Option<&str> {
    self
      .params
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn query(&self, key: &str) -> Option<&str> {
    self
      .query
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }
}

/// Collect the body, decode the form, and verify the signature over the
/// reconstructed public URL. Nothing else happens first.
pub(crate) async fn authenticate(
  auth: &SignatureConfig,
  req: Request<Body>,
) -> Result<WebhookRequest, Error> {
  let (parts, body) = req.into_parts();
  let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
    .await
    .map_err(|_| Error::BadRequest("webhook body too large".into()))?;
  let params = parse_form(&bytes)?;

  let path_and_query = parts
    .uri
    .path_and_query()
    .map(|pq| pq.as_str().to_owned())
    .unwrap_or_else(|| parts.uri.path().to_owned());
  verify_signature(auth, &parts.headers, &path_and_query, &params)?;

  let query = parse_form(parts.uri.query().unwrap_or_default().as_bytes())?;
  Ok(WebhookRequest { params, query })
}

pub(crate) async fn load_call<S: CallStore>(
  store: &S,
  call_id: Uuid,
) -> Result<Call, Error> {
  store
    .get_call(call_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::UnknownCall(call_id))
}

/// Ensure the call has reached `InProgress`, tolerating a skipped `ringing`
/// event. Terminal calls are the caller's responsibility.
pub(crate) async fn ensure_in_progress<S: CallStore>(
  store: &S,
  call: Call,
) -> Result<Call, Error> {
  if call.status == CallStatus::InProgress {
    return Ok(call);
  }
  store
    .transition_status(call.call_id, CallStatus::InProgress)
    .await
    .map_err(Error::store)
}

pub(crate) fn gather_action(call_id: Uuid, key: Option<&str>) -> String {
  action_url("gather", call_id, key)
}

pub(crate) fn fallback_action(call_id: Uuid, key: Option<&str>) -> String {
  action_url("fallback", call_id, key)
}

fn action_url(endpoint: &str, call_id: Uuid, key: Option<&str>) -> String {
  match key {
    Some(key) => format!(
      "/webhooks/{endpoint}/{call_id}?question_key={}",
      urlencoding::encode(key)
    ),
    None => format!("/webhooks/{endpoint}/{call_id}"),
  }
}

pub(crate) fn xml(body: String) -> Response {
  ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Render an [`EngineReply`] into the gather-or-hangup document. A complete
/// reply releases the call's lock and spawns the enrichment hook.
pub(crate) async fn reply_response<S, G, T>(
  state: &AppState<S, G, T>,
  call_id: Uuid,
  reply: EngineReply,
) -> Result<Response, Error>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  T: TextGenerator + Send + Sync + 'static,
{
  if reply.is_complete {
    state.locks.release(call_id).await;
    spawn_enrichment(state.engine.clone(), call_id);
    return Ok(xml(twiml::speak_and_hangup(&reply.text)?));
  }
  Ok(xml(twiml::speak_and_gather(&GatherPrompt {
    text:     &reply.text,
    action:   &gather_action(call_id, reply.question_key.as_deref()),
    fallback: &fallback_action(call_id, reply.question_key.as_deref()),
  })?))
}

/// Best-effort post-call summary and qualification. Failures are logged,
/// never surfaced: the call itself is already finished.
pub(crate) fn spawn_enrichment<S, T>(
  engine: Arc<ConversationEngine<S, T>>,
  call_id: Uuid,
) where
  S: ScriptStore + CallStore + Send + Sync + 'static,
  T: TextGenerator + Send + Sync + 'static,
{
  tokio::spawn(async move {
    if let Err(e) = engine.generate_call_summary(call_id).await {
      warn!(%call_id, error = %e, "post-call summary failed");
    }
    if let Err(e) = engine.qualify_lead(call_id).await {
      warn!(%call_id, error = %e, "post-call qualification failed");
    }
  });
}
