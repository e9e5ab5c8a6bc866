//! The conversation engine — one turn of the scripted dialogue at a time.
//!
//! Each entry point takes the current `Call` snapshot (fetched by the caller
//! under the per-call lock), records the transcript lines for the turn,
//! advances the cursor through [`CallStore::update_progress`], and returns
//! the text to speak next.

use chrono::Utc;
use coldcall_core::{
  call::{Call, CallStatus},
  message::{MessageRole, NewMessage, NO_RESPONSE_PLACEHOLDER},
  outcome::QualificationResult,
  script::{Question, Script},
  store::{CallProgress, CallStore, ScriptStore},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
  Error, Result,
  textgen::{TRANSITION_CONSTRAINTS, TextGenerator},
};

/// Spoken when transcript summarisation is unavailable.
pub const DEGRADED_SUMMARY: &str = "[summary unavailable]";

const SUMMARY_CONSTRAINTS: &str = "Summarise the following call transcript \
   in two or three factual sentences. Mention what was asked and what the \
   client answered. Do not speculate beyond the transcript.";

const QUALIFICATION_CONSTRAINTS: &str = "Score the lead in the following \
   call transcript from 0 to 100 for purchase readiness. Respond with a \
   single JSON object: {\"score\": <0-100>, \"notes\": \"<one sentence>\"}.";

/// What the engine wants spoken next, and whether the conversation is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
  pub text: String,
  /// Key of the question now awaiting an answer; `None` for the closing
  /// line and for a zero-question greeting.
  pub question_key: Option<String>,
  pub is_complete:  bool,
}

pub struct ConversationEngine<S, T> {
  store:   S,
  textgen: T,
}

impl<S, T> ConversationEngine<S, T>
where
  S: ScriptStore + CallStore,
  T: TextGenerator,
{
  pub fn new(store: S, textgen: T) -> Self { Self { store, textgen } }

  /// First turn: templated greeting plus the first question.
  ///
  /// A zero-question script greets and completes in the same turn.
  pub async fn build_greeting(&self, call: &Call) -> Result<EngineReply> {
    let script = self.script_for(call).await?;
    let greeting = script.render_greeting(&call.customer_name);

    match script.question_at(0) {
      Some(first) => {
        let text = format!("{greeting} {}", first.text_primary);
        self
          .record(call, MessageRole::Ai, text.clone(), Some(first.key.clone()))
          .await?;
        self
          .advance(call, CallProgress {
            current_question_index:   1,
            current_question_retries: 0,
            total_questions_asked:    call.total_questions_asked + 1,
            total_questions_answered: call.total_questions_answered,
          })
          .await?;
        Ok(EngineReply {
          text,
          question_key: Some(first.key.clone()),
          is_complete: false,
        })
      }
      None => {
        self
          .record(call, MessageRole::Ai, greeting.clone(), None)
          .await?;
        self
          .store
          .transition_status(call.call_id, CallStatus::Completed)
          .await
          .map_err(Error::store)?;
        Ok(EngineReply { text: greeting, question_key: None, is_complete: true })
      }
    }
  }

  /// The client answered the pending question.
  pub async fn process_client_response(
    &self,
    call: &Call,
    question_key: Option<&str>,
    speech: &str,
  ) -> Result<EngineReply> {
    let script = self.script_for(call).await?;
    if let Some(reply) = stale_redelivery(&script, call, question_key) {
      warn!(call_id = %call.call_id, delivered = ?question_key,
        "gather for an already-answered question; re-issuing the pending one");
      return Ok(reply);
    }
    let answered_key = question_key
      .map(str::to_owned)
      .or_else(|| pending_question(&script, call).map(|q| q.key.clone()));
    self
      .record(call, MessageRole::Client, speech.to_owned(), answered_key)
      .await?;

    let answered = call.total_questions_answered + 1;
    match script.question_at(call.current_question_index) {
      None => self.close_out(call, &script, answered).await,
      Some(next) => {
        let text = match self
          .textgen
          .generate(TRANSITION_CONSTRAINTS, &transition_prompt(speech, next))
          .await
        {
          Ok(text) => text,
          Err(e) => {
            warn!(call_id = %call.call_id, error = %e,
              "text generation failed; using scripted fallback");
            format!("Thank you. {}", next.text_fallback)
          }
        };
        self
          .record(call, MessageRole::Ai, text.clone(), Some(next.key.clone()))
          .await?;
        self
          .advance(call, CallProgress {
            current_question_index:   call.current_question_index + 1,
            current_question_retries: 0,
            total_questions_asked:    call.total_questions_asked + 1,
            total_questions_answered: answered,
          })
          .await?;
        Ok(EngineReply {
          text,
          question_key: Some(next.key.clone()),
          is_complete: false,
        })
      }
    }
  }

  /// The gather timed out or captured nothing.
  ///
  /// Re-asks the pending question until its retry budget is spent, then
  /// records the no-response placeholder and moves on. A question is
  /// therefore asked at most `max_retries_per_question + 1` times.
  pub async fn handle_no_response(
    &self,
    call: &Call,
    question_key: Option<&str>,
  ) -> Result<EngineReply> {
    let script = self.script_for(call).await?;
    if let Some(reply) = stale_redelivery(&script, call, question_key) {
      warn!(call_id = %call.call_id, delivered = ?question_key,
        "no-response for a question no longer pending; re-issuing the pending one");
      return Ok(reply);
    }

    if let Some(q) = pending_question(&script, call) {
      if call.current_question_retries < script.max_retries_per_question {
        let text = format!("Sorry, I didn't catch that. {}", q.text_primary);
        self
          .record(call, MessageRole::Ai, text.clone(), Some(q.key.clone()))
          .await?;
        self
          .advance(call, CallProgress {
            current_question_index:   call.current_question_index,
            current_question_retries: call.current_question_retries + 1,
            total_questions_asked:    call.total_questions_asked + 1,
            total_questions_answered: call.total_questions_answered,
          })
          .await?;
        return Ok(EngineReply {
          text,
          question_key: Some(q.key.clone()),
          is_complete: false,
        });
      }

      // Retries spent: the transcript shows the question went unanswered.
      // The answered counter is untouched.
      self
        .record(
          call,
          MessageRole::Client,
          NO_RESPONSE_PLACEHOLDER.to_owned(),
          Some(q.key.clone()),
        )
        .await?;
    }

    match script.question_at(call.current_question_index) {
      None => {
        self
          .close_out(call, &script, call.total_questions_answered)
          .await
      }
      Some(next) => {
        // No answer to acknowledge, so the generation service is skipped.
        let text = format!("Okay. {}", next.text_fallback);
        self
          .record(call, MessageRole::Ai, text.clone(), Some(next.key.clone()))
          .await?;
        self
          .advance(call, CallProgress {
            current_question_index:   call.current_question_index + 1,
            current_question_retries: 0,
            total_questions_asked:    call.total_questions_asked + 1,
            total_questions_answered: call.total_questions_answered,
          })
          .await?;
        Ok(EngineReply {
          text,
          question_key: Some(next.key.clone()),
          is_complete: false,
        })
      }
    }
  }

  /// Summarise the finished call's transcript onto the call row. Generation
  /// failure degrades to [`DEGRADED_SUMMARY`], never an error.
  pub async fn generate_call_summary(&self, call_id: Uuid) -> Result<Call> {
    let transcript = self.transcript(call_id).await?;
    let summary = match self
      .textgen
      .generate(SUMMARY_CONSTRAINTS, &transcript)
      .await
    {
      Ok(summary) => summary,
      Err(e) => {
        warn!(call_id = %call_id, error = %e, "summary generation failed");
        DEGRADED_SUMMARY.to_owned()
      }
    };
    self
      .store
      .set_summary(call_id, summary)
      .await
      .map_err(Error::store)
  }

  /// Qualify the finished call's transcript onto the call row. Any service
  /// or payload failure yields the degraded sentinel; the bucket is always
  /// recomputed from the numeric score.
  pub async fn qualify_lead(&self, call_id: Uuid) -> Result<Call> {
    let transcript = self.transcript(call_id).await?;
    let result = match self
      .textgen
      .generate_json(QUALIFICATION_CONSTRAINTS, &transcript)
      .await
    {
      Ok(value) => parse_qualification(&value),
      Err(e) => {
        warn!(call_id = %call_id, error = %e, "qualification generation failed");
        QualificationResult::degraded("text generation unavailable")
      }
    };
    self
      .store
      .set_qualification(call_id, result)
      .await
      .map_err(Error::store)
  }

  // ─── Internals ─────────────────────────────────────────────────────────────

  async fn script_for(&self, call: &Call) -> Result<Script> {
    self
      .store
      .get_script(call.script_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ScriptUnavailable(call.script_id))
  }

  async fn record(
    &self,
    call: &Call,
    role: MessageRole,
    content: String,
    question_key: Option<String>,
  ) -> Result<()> {
    self
      .store
      .append_message(NewMessage {
        call_id: call.call_id,
        role,
        content,
        question_key,
        timestamp_in_call: call.seconds_since_start(Utc::now()),
      })
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  async fn advance(&self, call: &Call, progress: CallProgress) -> Result<()> {
    self
      .store
      .update_progress(call.call_id, progress)
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  /// Closing line, final counter update, and the `Completed` transition.
  async fn close_out(
    &self,
    call: &Call,
    script: &Script,
    answered: u32,
  ) -> Result<EngineReply> {
    let text = script.render_closing(&call.customer_name);
    self.record(call, MessageRole::Ai, text.clone(), None).await?;
    self
      .advance(call, CallProgress {
        current_question_index:   call.current_question_index,
        current_question_retries: call.current_question_retries,
        total_questions_asked:    call.total_questions_asked,
        total_questions_answered: answered,
      })
      .await?;
    self
      .store
      .transition_status(call.call_id, CallStatus::Completed)
      .await
      .map_err(Error::store)?;
    Ok(EngineReply { text, question_key: None, is_complete: true })
  }

  async fn transcript(&self, call_id: Uuid) -> Result<String> {
    self
      .store
      .get_call(call_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CallNotFound(call_id))?;
    let messages = self
      .store
      .get_messages(call_id)
      .await
      .map_err(Error::store)?;
    Ok(
      messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n"),
    )
  }
}

/// The question currently awaiting an answer: the one *before* the cursor,
/// since the cursor points at the next question to ask.
fn pending_question<'a>(script: &'a Script, call: &Call) -> Option<&'a Question> {
  call
    .current_question_index
    .checked_sub(1)
    .and_then(|i| script.question_at(i))
}

/// Webhooks can be redelivered; a `question_key` that does not match the
/// question awaiting an answer is a stale duplicate, not a fresh event.
/// The pending gather is re-issued verbatim and nothing is recorded.
fn stale_redelivery(
  script: &Script,
  call: &Call,
  question_key: Option<&str>,
) -> Option<EngineReply> {
  let delivered = question_key?;
  let pending = pending_question(script, call)?;
  if delivered == pending.key {
    return None;
  }
  Some(EngineReply {
    text:         pending.text_primary.clone(),
    question_key: Some(pending.key.clone()),
    is_complete:  false,
  })
}

fn transition_prompt(speech: &str, next: &Question) -> String {
  format!("Client's answer: {speech:?}\nNext question: {}", next.text_primary)
}

fn parse_qualification(value: &serde_json::Value) -> QualificationResult {
  let notes = value
    .get("notes")
    .and_then(|v| v.as_str())
    .unwrap_or_default()
    .to_owned();
  match value.get("score").and_then(|v| v.as_u64()) {
    Some(score) => QualificationResult::from_score(score.min(100) as u8, notes),
    None => QualificationResult::degraded("qualification payload had no score"),
  }
}
