//! Integration tests driving the full router with `tower::ServiceExt`.

use std::{sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use coldcall_core::{
  call::{Call, CallStatus, NewCall},
  script::{NewScript, Question, TargetType},
  store::{CallLimits, CallStore, ScriptStore},
};
use coldcall_engine::{
  conversation::ConversationEngine,
  gateway::{PlacementError, TelephonyGateway},
  locks::CallLocks,
  orchestrator::{Orchestrator, OrchestratorConfig},
  textgen::{GenerationError, TextGenerator},
};
use coldcall_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  AppState, router,
  auth::{SIGNATURE_HEADER, SignatureConfig, compute_signature},
};

const AUTH_TOKEN: &str = "test-token";
const PUBLIC_BASE: &str = "https://calls.example.com";

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct FakeGateway;

impl TelephonyGateway for FakeGateway {
  async fn place_call(&self, _call: &Call) -> Result<(), PlacementError> {
    Ok(())
  }
}

#[derive(Clone)]
struct FakeTextGen;

impl TextGenerator for FakeTextGen {
  async fn generate(
    &self,
    _system: &str,
    _prompt: &str,
  ) -> Result<String, GenerationError> {
    Ok("Noted. Next question coming up.".into())
  }

  async fn generate_json(
    &self,
    _system: &str,
    _prompt: &str,
  ) -> Result<serde_json::Value, GenerationError> {
    Ok(serde_json::json!({ "score": 60, "notes": "lukewarm" }))
  }
}

type TestState = AppState<SqliteStore, FakeGateway, FakeTextGen>;

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn make_state() -> TestState {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let engine = ConversationEngine::new(store.clone(), FakeTextGen);
  let orchestrator = Orchestrator::new(
    store.clone(),
    FakeGateway,
    OrchestratorConfig {
      bulk_dispatch_interval: Duration::ZERO,
      ..Default::default()
    },
  );
  AppState {
    store,
    engine: Arc::new(engine),
    orchestrator: Arc::new(orchestrator),
    locks: CallLocks::new(),
    auth: Arc::new(SignatureConfig {
      auth_token:      AUTH_TOKEN.into(),
      public_base_url: PUBLIC_BASE.into(),
    }),
  }
}

fn question(key: &str) -> Question {
  Question {
    key:           key.to_string(),
    text_primary:  format!("What is your {key}?"),
    text_fallback: format!("Could you tell me your {key}?"),
  }
}

async fn seed_script(state: &TestState) -> Uuid {
  let script = state
    .store
    .add_script(NewScript {
      active: true,
      target_types: vec![TargetType::Lead],
      questions: vec![question("budget"), question("timeline")],
      greeting_text: "Hi {customer_name}, this is Coldcall Realty.".into(),
      closing_text: "Thanks for your time, {customer_name}. Goodbye.".into(),
      max_retries_per_question: 1,
    })
    .await
    .unwrap();
  script.script_id
}

async fn seed_call(state: &TestState, script_id: Uuid) -> Uuid {
  state
    .store
    .create_call(
      NewCall {
        target_id: Uuid::new_v4(),
        target_type: TargetType::Lead,
        customer_name: "Alice".into(),
        phone_number: "+14155550123".into(),
        script_id,
        initiated_by: "tests".into(),
      },
      CallLimits { max_active_calls: 100, max_attempts_per_target: 100 },
    )
    .await
    .unwrap()
    .unwrap()
    .call_id
}

/// POST a correctly signed webhook and return the response.
async fn post_webhook(
  state: &TestState,
  path_and_query: &str,
  params: &[(&str, &str)],
) -> Response {
  post_webhook_signed(state, path_and_query, params, AUTH_TOKEN).await
}

async fn post_webhook_signed(
  state: &TestState,
  path_and_query: &str,
  params: &[(&str, &str)],
  token: &str,
) -> Response {
  let owned: Vec<(String, String)> = params
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
  let url = format!("{PUBLIC_BASE}{path_and_query}");
  let signature = compute_signature(token, &url, &owned);
  let body = owned
    .iter()
    .map(|(k, v)| {
      format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
    })
    .collect::<Vec<_>>()
    .join("&");

  let req = Request::builder()
    .method("POST")
    .uri(path_and_query)
    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    .header(SIGNATURE_HEADER, signature)
    .body(Body::from(body))
    .unwrap();
  router(state.clone()).oneshot(req).await.unwrap()
}

async fn body_string(resp: Response) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
    .await
    .unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

// ─── Signature enforcement ───────────────────────────────────────────────────

#[tokio::test]
async fn bad_signature_is_rejected_with_403() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;

  let resp = post_webhook_signed(
    &state,
    &format!("/webhooks/voice/{call_id}"),
    &[],
    "wrong-token",
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  // State untouched: the call is still pending.
  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.status, CallStatus::Pending);
}

#[tokio::test]
async fn unknown_call_is_404() {
  let state = make_state().await;
  let resp = post_webhook(
    &state,
    &format!("/webhooks/voice/{}", Uuid::new_v4()),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Voice ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn voice_webhook_greets_and_gathers() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;

  let resp =
    post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let xml = body_string(resp).await;
  assert!(xml.contains("Hi Alice, this is Coldcall Realty. What is your budget?"));
  assert!(xml.contains(&format!(
    "action=\"/webhooks/gather/{call_id}?question_key=budget\""
  )));

  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.status, CallStatus::InProgress);
  assert_eq!(call.current_question_index, 1);
  assert!(call.started_at.is_some());
}

#[tokio::test]
async fn redelivered_voice_webhook_does_not_duplicate_the_greeting() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;

  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;
  let resp =
    post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let xml = body_string(resp).await;
  // The pending question is re-issued verbatim.
  assert!(xml.contains("What is your budget?"));

  let messages = state.store.get_messages(call_id).await.unwrap();
  assert_eq!(messages.len(), 1);
}

// ─── Gather and fallback ─────────────────────────────────────────────────────

#[tokio::test]
async fn gather_advances_to_the_next_question() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  let resp = post_webhook(
    &state,
    &format!("/webhooks/gather/{call_id}?question_key=budget"),
    &[("CallSid", "CA123"), ("SpeechResult", "around 500k")],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let xml = body_string(resp).await;
  assert!(xml.contains("Noted. Next question coming up."));
  assert!(xml.contains("question_key=timeline"));

  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.current_question_index, 2);
  assert_eq!(call.total_questions_answered, 1);
}

#[tokio::test]
async fn redelivered_gather_webhook_does_not_complete_the_call() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  let path = format!("/webhooks/gather/{call_id}?question_key=budget");
  let params = [("CallSid", "CA123"), ("SpeechResult", "around 500k")];
  post_webhook(&state, &path, &params).await;

  // The gateway retries the delivery. Budget is already answered and
  // timeline has not been: the pending gather is re-issued untouched.
  let resp = post_webhook(&state, &path, &params).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let xml = body_string(resp).await;
  assert!(xml.contains("What is your timeline?"));
  assert!(xml.contains("question_key=timeline"));
  assert!(!xml.contains("<Hangup/>"));

  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.status, CallStatus::InProgress);
  assert_eq!(call.current_question_index, 2);
  assert_eq!(call.total_questions_answered, 1);
  // greeting, answer, transition reply; the duplicate recorded nothing.
  assert_eq!(state.store.get_messages(call_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn empty_speech_degrades_to_a_retry() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  let resp = post_webhook(
    &state,
    &format!("/webhooks/gather/{call_id}?question_key=budget"),
    &[("CallSid", "CA123"), ("SpeechResult", "")],
  )
  .await;
  let xml = body_string(resp).await;
  // The apostrophe in the retry preamble is XML-escaped.
  assert!(xml.contains("catch that. What is your budget?"));
}

#[tokio::test]
async fn silent_conversation_runs_to_completion() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  // budget: retry once, then move on; timeline: retry once, then close.
  let mut resp = None;
  for key in ["budget", "budget", "timeline", "timeline"] {
    let r = post_webhook(
      &state,
      &format!("/webhooks/fallback/{call_id}?question_key={key}"),
      &[("CallSid", "CA123")],
    )
    .await;
    assert_eq!(r.status(), StatusCode::OK);
    resp = Some(r);
  }
  let resp = resp.unwrap();
  let xml = body_string(resp).await;
  assert!(xml.contains("Thanks for your time, Alice. Goodbye."));
  assert!(xml.contains("<Hangup/>"));

  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.status, CallStatus::Completed);
  assert_eq!(call.total_questions_answered, 0);
}

#[tokio::test]
async fn completed_call_is_enriched_in_the_background() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  post_webhook(
    &state,
    &format!("/webhooks/gather/{call_id}?question_key=budget"),
    &[("SpeechResult", "around 500k")],
  )
  .await;
  let resp = post_webhook(
    &state,
    &format!("/webhooks/gather/{call_id}?question_key=timeline"),
    &[("SpeechResult", "in three months")],
  )
  .await;
  let xml = body_string(resp).await;
  assert!(xml.contains("<Hangup/>"));

  // The enrichment hook is detached; poll for its result.
  for _ in 0..50 {
    let call = state.store.get_call(call_id).await.unwrap().unwrap();
    if call.call_summary.is_some() && call.qualification.is_some() {
      let q = call.qualification.unwrap();
      assert_eq!(q.score, Some(60));
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("completed call was never enriched");
}

// ─── Status callbacks ────────────────────────────────────────────────────────

#[tokio::test]
async fn status_events_drive_the_state_machine() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  let path = format!("/webhooks/status/{call_id}");

  for (event, expected) in [
    ("initiated", CallStatus::Pending),
    ("ringing", CallStatus::Ringing),
    ("in-progress", CallStatus::InProgress),
    ("completed", CallStatus::Completed),
  ] {
    let resp = post_webhook(&state, &path, &[("CallStatus", event)]).await;
    assert_eq!(resp.status(), StatusCode::OK, "event {event}");
    let call = state.store.get_call(call_id).await.unwrap().unwrap();
    assert_eq!(call.status, expected, "event {event}");
  }
}

#[tokio::test]
async fn answered_event_may_skip_ringing() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;

  post_webhook(
    &state,
    &format!("/webhooks/status/{call_id}"),
    &[("CallStatus", "answered")],
  )
  .await;
  let call = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(call.status, CallStatus::InProgress);
}

#[tokio::test]
async fn replayed_terminal_event_is_a_noop() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  let path = format!("/webhooks/status/{call_id}");

  post_webhook(&state, &path, &[("CallStatus", "no-answer")]).await;
  let before = state.store.get_call(call_id).await.unwrap().unwrap();

  // Redelivery, plus a regressing event: both 200, both ignored.
  let resp = post_webhook(&state, &path, &[("CallStatus", "no-answer")]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let resp = post_webhook(&state, &path, &[("CallStatus", "ringing")]).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let after = state.store.get_call(call_id).await.unwrap().unwrap();
  assert_eq!(after.status, before.status);
  assert_eq!(after.ended_at, before.ended_at);
}

#[tokio::test]
async fn gather_against_a_terminal_call_is_an_empty_ack() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(
    &state,
    &format!("/webhooks/status/{call_id}"),
    &[("CallStatus", "failed")],
  )
  .await;

  let resp = post_webhook(
    &state,
    &format!("/webhooks/gather/{call_id}?question_key=budget"),
    &[("SpeechResult", "too late")],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let xml = body_string(resp).await;
  assert!(xml.ends_with("<Response/>"));
  assert!(state.store.get_messages(call_id).await.unwrap().is_empty());
}

// ─── JSON API ────────────────────────────────────────────────────────────────

async fn post_json(state: &TestState, path: &str, body: serde_json::Value) -> Response {
  let req = Request::builder()
    .method("POST")
    .uri(path)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  router(state.clone()).oneshot(req).await.unwrap()
}

async fn get_path(state: &TestState, path: &str) -> Response {
  let req = Request::builder()
    .method("GET")
    .uri(path)
    .body(Body::empty())
    .unwrap();
  router(state.clone()).oneshot(req).await.unwrap()
}

#[tokio::test]
async fn api_initiates_a_call() {
  let state = make_state().await;
  seed_script(&state).await;

  let resp = post_json(
    &state,
    "/api/calls",
    serde_json::json!({
      "target_id": Uuid::new_v4(),
      "target_type": "lead",
      "customer_name": "Alice",
      "phone_number": "+14155550123",
      "initiated_by": "tests",
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: serde_json::Value =
    serde_json::from_str(&body_string(resp).await).unwrap();
  assert_eq!(body["status"], "pending");
  assert_eq!(body["attempt_number"], 1);
}

#[tokio::test]
async fn api_rejects_an_invalid_phone_number_with_400() {
  let state = make_state().await;
  seed_script(&state).await;

  let resp = post_json(
    &state,
    "/api/calls",
    serde_json::json!({
      "target_id": Uuid::new_v4(),
      "target_type": "lead",
      "customer_name": "Alice",
      "phone_number": "not-a-number",
      "initiated_by": "tests",
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_surfaces_missing_script_as_conflict() {
  let state = make_state().await;

  let resp = post_json(
    &state,
    "/api/calls",
    serde_json::json!({
      "target_id": Uuid::new_v4(),
      "target_type": "lead",
      "customer_name": "Alice",
      "phone_number": "+14155550123",
      "initiated_by": "tests",
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn api_creates_and_lists_scripts() {
  let state = make_state().await;

  let resp = post_json(
    &state,
    "/api/scripts",
    serde_json::json!({
      "active": true,
      "target_types": ["lead"],
      "questions": [
        { "key": "budget",
          "text_primary": "What is your budget?",
          "text_fallback": "Could you tell me your budget?" },
      ],
      "greeting_text": "Hi {customer_name}.",
      "closing_text": "Goodbye {customer_name}.",
      "max_retries_per_question": 1,
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let resp = get_path(&state, "/api/scripts").await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: serde_json::Value =
    serde_json::from_str(&body_string(resp).await).unwrap();
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn api_rejects_an_empty_script_with_400() {
  let state = make_state().await;

  let resp = post_json(
    &state,
    "/api/scripts",
    serde_json::json!({
      "active": true,
      "target_types": ["lead"],
      "questions": [],
      "greeting_text": "Hi.",
      "closing_text": "Bye.",
      "max_retries_per_question": 1,
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_serves_transcripts_and_analytics() {
  let state = make_state().await;
  let script_id = seed_script(&state).await;
  let call_id = seed_call(&state, script_id).await;
  post_webhook(&state, &format!("/webhooks/voice/{call_id}"), &[]).await;

  let resp = get_path(&state, &format!("/api/calls/{call_id}/messages")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: serde_json::Value =
    serde_json::from_str(&body_string(resp).await).unwrap();
  assert_eq!(body.as_array().unwrap().len(), 1);

  let resp = get_path(&state, "/api/analytics?target_type=lead").await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: serde_json::Value =
    serde_json::from_str(&body_string(resp).await).unwrap();
  assert_eq!(body["total_calls"], 1);
}
