//! Integration tests for `SqliteStore` against an in-memory database.

use coldcall_core::{
  call::{CallStatus, NewCall},
  message::{MessageRole, NewMessage},
  outcome::{Qualification, QualificationResult},
  script::{NewScript, Question, TargetType},
  store::{
    CallFilter, CallLimits, CallProgress, CallRejection, CallStore,
    ScriptStore,
  },
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn question(key: &str) -> Question {
  Question {
    key:           key.to_string(),
    text_primary:  format!("Primary text for {key}?"),
    text_fallback: format!("Fallback text for {key}?"),
  }
}

fn lead_script() -> NewScript {
  NewScript {
    active: true,
    target_types: vec![TargetType::Lead],
    questions: vec![question("budget"), question("timeline")],
    greeting_text: "Hello {customer_name}.".into(),
    closing_text: "Goodbye {customer_name}.".into(),
    max_retries_per_question: 1,
  }
}

fn new_call(script_id: Uuid) -> NewCall {
  NewCall {
    target_id: Uuid::new_v4(),
    target_type: TargetType::Lead,
    customer_name: "Alice Liddell".into(),
    phone_number: "+14155550123".into(),
    script_id,
    initiated_by: "tests".into(),
  }
}

fn roomy_limits() -> CallLimits {
  CallLimits { max_active_calls: 100, max_attempts_per_target: 100 }
}

// ─── Scripts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_script() {
  let s = store().await;

  let script = s.add_script(lead_script()).await.unwrap();
  assert!(script.active);
  assert!(script.activated_at.is_some());
  assert_eq!(script.question_count(), 2);

  let fetched = s.get_script(script.script_id).await.unwrap().unwrap();
  assert_eq!(fetched.script_id, script.script_id);
  assert_eq!(fetched.questions, script.questions);
}

#[tokio::test]
async fn get_script_missing_returns_none() {
  let s = store().await;
  assert!(s.get_script(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn add_script_rejects_empty_questions() {
  let s = store().await;
  let mut input = lead_script();
  input.questions.clear();
  assert!(matches!(
    s.add_script(input).await,
    Err(Error::Core(coldcall_core::Error::EmptyScript))
  ));
}

#[tokio::test]
async fn active_script_respects_target_type() {
  let s = store().await;

  let mut customers_only = lead_script();
  customers_only.target_types = vec![TargetType::Customer];
  s.add_script(customers_only).await.unwrap();

  assert!(
    s.active_script_for(TargetType::Lead)
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    s.active_script_for(TargetType::Customer)
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn active_script_prefers_most_recently_activated() {
  let s = store().await;

  let older = s.add_script(lead_script()).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let newer = s.add_script(lead_script()).await.unwrap();

  let picked = s
    .active_script_for(TargetType::Lead)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(picked.script_id, newer.script_id);
  assert_ne!(picked.script_id, older.script_id);
}

#[tokio::test]
async fn inactive_scripts_are_never_selected() {
  let s = store().await;
  let mut inactive = lead_script();
  inactive.active = false;
  s.add_script(inactive).await.unwrap();

  assert!(
    s.active_script_for(TargetType::Lead)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn list_scripts_returns_all() {
  let s = store().await;
  s.add_script(lead_script()).await.unwrap();
  let mut inactive = lead_script();
  inactive.active = false;
  s.add_script(inactive).await.unwrap();

  assert_eq!(s.list_scripts().await.unwrap().len(), 2);
}

// ─── Call creation and ceilings ──────────────────────────────────────────────

#[tokio::test]
async fn create_call_assigns_attempt_number() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let input = new_call(script.script_id);

  let first = s
    .create_call(input.clone(), roomy_limits())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(first.status, CallStatus::Pending);
  assert_eq!(first.attempt_number, 1);

  // End the first attempt so the second is not blocked by concurrency.
  s.transition_status(first.call_id, CallStatus::NoAnswer)
    .await
    .unwrap();

  let second = s
    .create_call(input, roomy_limits())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(second.attempt_number, 2);
}

#[tokio::test]
async fn concurrency_ceiling_rejects_as_data() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let limits = CallLimits { max_active_calls: 2, max_attempts_per_target: 100 };

  for _ in 0..2 {
    s.create_call(new_call(script.script_id), limits)
      .await
      .unwrap()
      .unwrap();
  }

  let rejection = s
    .create_call(new_call(script.script_id), limits)
    .await
    .unwrap()
    .unwrap_err();
  assert_eq!(
    rejection,
    CallRejection::ConcurrencyLimit { active: 2, max: 2 }
  );
}

#[tokio::test]
async fn terminal_calls_free_concurrency_slots() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let limits = CallLimits { max_active_calls: 1, max_attempts_per_target: 100 };

  let call = s
    .create_call(new_call(script.script_id), limits)
    .await
    .unwrap()
    .unwrap();
  s.transition_status(call.call_id, CallStatus::Failed)
    .await
    .unwrap();

  // Slot released; a fresh target may dial.
  assert!(
    s.create_call(new_call(script.script_id), limits)
      .await
      .unwrap()
      .is_ok()
  );
}

#[tokio::test]
async fn attempt_ceiling_rejects_as_data() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let limits = CallLimits { max_active_calls: 100, max_attempts_per_target: 2 };
  let input = new_call(script.script_id);

  for _ in 0..2 {
    let call = s
      .create_call(input.clone(), limits)
      .await
      .unwrap()
      .unwrap();
    s.transition_status(call.call_id, CallStatus::NoAnswer)
      .await
      .unwrap();
  }

  let rejection = s
    .create_call(input, limits)
    .await
    .unwrap()
    .unwrap_err();
  assert_eq!(rejection, CallRejection::MaxAttempts { attempts: 2, max: 2 });
}

#[tokio::test]
async fn concurrent_creates_never_oversubscribe() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let limits = CallLimits { max_active_calls: 3, max_attempts_per_target: 100 };

  let mut handles = Vec::new();
  for _ in 0..10 {
    let s = s.clone();
    let input = new_call(script.script_id);
    handles.push(tokio::spawn(async move {
      s.create_call(input, limits).await.unwrap()
    }));
  }

  let mut accepted = 0;
  for h in handles {
    if h.await.unwrap().is_ok() {
      accepted += 1;
    }
  }
  assert_eq!(accepted, 3);
}

// ─── Status transitions ──────────────────────────────────────────────────────

#[tokio::test]
async fn transition_stamps_started_and_ended() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let call = s
    .create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();

  let ringing = s
    .transition_status(call.call_id, CallStatus::Ringing)
    .await
    .unwrap();
  assert!(ringing.started_at.is_none());

  let answered = s
    .transition_status(call.call_id, CallStatus::InProgress)
    .await
    .unwrap();
  assert!(answered.started_at.is_some());
  assert!(answered.ended_at.is_none());

  let done = s
    .transition_status(call.call_id, CallStatus::Completed)
    .await
    .unwrap();
  assert!(done.ended_at.is_some());
  assert!(done.duration_seconds().is_some());
}

#[tokio::test]
async fn transition_to_same_status_is_a_noop() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let call = s
    .create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();

  s.transition_status(call.call_id, CallStatus::Ringing)
    .await
    .unwrap();
  // Redelivered webhook.
  let again = s
    .transition_status(call.call_id, CallStatus::Ringing)
    .await
    .unwrap();
  assert_eq!(again.status, CallStatus::Ringing);
}

#[tokio::test]
async fn illegal_transition_is_rejected() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let call = s
    .create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();

  assert!(matches!(
    s.transition_status(call.call_id, CallStatus::Completed).await,
    Err(Error::Core(coldcall_core::Error::IllegalTransition { .. }))
  ));
}

#[tokio::test]
async fn terminal_status_is_sealed() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  let call = s
    .create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();
  s.transition_status(call.call_id, CallStatus::Failed)
    .await
    .unwrap();

  assert!(matches!(
    s.transition_status(call.call_id, CallStatus::InProgress).await,
    Err(Error::Core(coldcall_core::Error::IllegalTransition { .. }))
  ));
}

#[tokio::test]
async fn transition_unknown_call_is_not_found() {
  let s = store().await;
  assert!(matches!(
    s.transition_status(Uuid::new_v4(), CallStatus::Ringing).await,
    Err(Error::CallNotFound(_))
  ));
}

// ─── Transcript ──────────────────────────────────────────────────────────────

async fn in_progress_call(s: &SqliteStore) -> Uuid {
  let script = s.add_script(lead_script()).await.unwrap();
  let call = s
    .create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();
  s.transition_status(call.call_id, CallStatus::InProgress)
    .await
    .unwrap();
  call.call_id
}

#[tokio::test]
async fn messages_preserve_insertion_order() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;

  for (i, content) in ["Hello.", "Hi!", "What is your budget?"]
    .into_iter()
    .enumerate()
  {
    s.append_message(NewMessage {
      call_id,
      role: if i == 1 { MessageRole::Client } else { MessageRole::Ai },
      content: content.into(),
      question_key: None,
      timestamp_in_call: i as i64,
    })
    .await
    .unwrap();
  }

  let messages = s.get_messages(call_id).await.unwrap();
  assert_eq!(messages.len(), 3);
  assert_eq!(messages[0].content, "Hello.");
  assert_eq!(messages[1].role, MessageRole::Client);
  assert_eq!(messages[2].content, "What is your budget?");
}

#[tokio::test]
async fn append_to_terminal_call_is_rejected() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;
  s.transition_status(call_id, CallStatus::Completed)
    .await
    .unwrap();

  assert!(matches!(
    s.append_message(NewMessage {
      call_id,
      role: MessageRole::Ai,
      content: "too late".into(),
      question_key: None,
      timestamp_in_call: 99,
    })
    .await,
    Err(Error::Core(coldcall_core::Error::TerminalCall(_)))
  ));
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_advances_and_persists() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;

  let updated = s
    .update_progress(call_id, CallProgress {
      current_question_index:   1,
      current_question_retries: 0,
      total_questions_asked:    2,
      total_questions_answered: 1,
    })
    .await
    .unwrap();
  assert_eq!(updated.current_question_index, 1);
  assert_eq!(updated.total_questions_asked, 2);
  assert_eq!(updated.total_questions_answered, 1);
}

#[tokio::test]
async fn progress_may_not_regress() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;

  s.update_progress(call_id, CallProgress {
    current_question_index:   2,
    current_question_retries: 0,
    total_questions_asked:    3,
    total_questions_answered: 2,
  })
  .await
  .unwrap();

  assert!(matches!(
    s.update_progress(call_id, CallProgress {
      current_question_index:   1,
      current_question_retries: 0,
      total_questions_asked:    3,
      total_questions_answered: 2,
    })
    .await,
    Err(Error::NonMonotonicProgress(_))
  ));
}

#[tokio::test]
async fn progress_on_terminal_call_is_rejected() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;
  s.transition_status(call_id, CallStatus::Completed)
    .await
    .unwrap();

  assert!(matches!(
    s.update_progress(call_id, CallProgress {
      current_question_index:   1,
      current_question_retries: 0,
      total_questions_asked:    1,
      total_questions_answered: 1,
    })
    .await,
    Err(Error::Core(coldcall_core::Error::TerminalCall(_)))
  ));
}

// ─── Enrichment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrichment_requires_terminal_status() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;

  assert!(matches!(
    s.set_summary(call_id, "premature".into()).await,
    Err(Error::Core(coldcall_core::Error::CallNotTerminal(_)))
  ));

  s.transition_status(call_id, CallStatus::Completed)
    .await
    .unwrap();

  let call = s
    .set_summary(call_id, "Asked about budget; client engaged.".into())
    .await
    .unwrap();
  assert!(call.call_summary.is_some());

  let call = s
    .set_qualification(
      call_id,
      QualificationResult::from_score(80, "strong interest".into()),
    )
    .await
    .unwrap();
  let q = call.qualification.unwrap();
  assert_eq!(q.score, Some(80));
  assert_eq!(q.bucket, Qualification::Hot);
}

#[tokio::test]
async fn degraded_qualification_round_trips() {
  let s = store().await;
  let call_id = in_progress_call(&s).await;
  s.transition_status(call_id, CallStatus::Completed)
    .await
    .unwrap();

  let call = s
    .set_qualification(
      call_id,
      QualificationResult::degraded("generation service unavailable"),
    )
    .await
    .unwrap();
  let q = call.qualification.unwrap();
  assert!(q.is_degraded());
  assert_eq!(q.score, None);
}

// ─── Analytics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn analytics_counts_and_rates() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();

  for terminal in [CallStatus::Completed, CallStatus::Completed, CallStatus::NoAnswer] {
    let call = s
      .create_call(new_call(script.script_id), roomy_limits())
      .await
      .unwrap()
      .unwrap();
    if terminal == CallStatus::Completed {
      s.transition_status(call.call_id, CallStatus::InProgress)
        .await
        .unwrap();
    }
    s.transition_status(call.call_id, terminal).await.unwrap();
  }
  // One call still pending.
  s.create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();

  let analytics = s.analytics(&CallFilter::default()).await.unwrap();
  assert_eq!(analytics.total_calls, 4);
  assert!((analytics.success_rate - 0.5).abs() < f64::EPSILON);
  assert_eq!(analytics.daily_counts.len(), 1);
  assert_eq!(analytics.daily_counts[0].count, 4);

  let completed = analytics
    .by_status
    .iter()
    .find(|sc| sc.status == CallStatus::Completed)
    .unwrap();
  assert_eq!(completed.count, 2);
}

#[tokio::test]
async fn analytics_filter_excludes_other_target_types() {
  let s = store().await;
  let script = s.add_script(lead_script()).await.unwrap();
  s.create_call(new_call(script.script_id), roomy_limits())
    .await
    .unwrap()
    .unwrap();

  let filter = CallFilter {
    target_type: Some(TargetType::Customer),
    ..Default::default()
  };
  let analytics = s.analytics(&filter).await.unwrap();
  assert_eq!(analytics.total_calls, 0);
  assert!((analytics.success_rate - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn analytics_on_empty_store() {
  let s = store().await;
  let analytics = s.analytics(&CallFilter::default()).await.unwrap();
  assert_eq!(analytics.total_calls, 0);
  assert_eq!(analytics.by_status.len(), 0);
  assert_eq!(analytics.avg_duration_seconds, 0.0);
}

// ─── Column decoding ─────────────────────────────────────────────────────────

#[test]
fn unknown_enum_tokens_are_decode_errors() {
  use crate::encode;

  assert!(matches!(
    encode::decode_status("paused"),
    Err(Error::Decode(m)) if m.contains("call status")
  ));
  assert!(matches!(
    encode::decode_target_type("vendor"),
    Err(Error::Decode(_))
  ));
  assert!(matches!(
    encode::decode_direction("sideways"),
    Err(Error::Decode(_))
  ));
  assert!(matches!(
    encode::decode_role("operator"),
    Err(Error::Decode(_))
  ));
}
