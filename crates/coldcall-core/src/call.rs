//! Call types and the call status state machine.
//!
//! A `Call` is one dialing attempt. A retry is always a brand-new row with
//! `attempt_number = previous + 1`; terminal calls are never mutated except
//! for the summary/qualification enrichment fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result, outcome::QualificationResult, script::TargetType,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Call lifecycle status.
///
/// `Pending -> Ringing -> InProgress -> Completed`, with failure exits to
/// `Failed`/`NoAnswer`/`Busy` from any non-terminal state. Transitions are
/// driven only by gateway webhook events and by the conversation engine's
/// own completion determination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
  Pending,
  Ringing,
  InProgress,
  Completed,
  Failed,
  NoAnswer,
  Busy,
}

impl CallStatus {
  /// Terminal statuses admit no further transition and no further messages.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed | Self::NoAnswer | Self::Busy)
  }

  /// Statuses that count against the concurrency ceiling.
  pub fn is_active(self) -> bool {
    matches!(self, Self::Pending | Self::Ringing | Self::InProgress)
  }

  /// Whether `self -> next` is a legal transition.
  ///
  /// `Pending -> InProgress` is permitted so an answered event arriving
  /// before its ringing event (webhook reordering) is not rejected.
  pub fn can_transition_to(self, next: CallStatus) -> bool {
    use CallStatus::*;
    match self {
      Pending => matches!(next, Ringing | InProgress | Failed | NoAnswer | Busy),
      Ringing => matches!(next, InProgress | Failed | NoAnswer | Busy),
      InProgress => matches!(next, Completed | Failed | NoAnswer | Busy),
      Completed | Failed | NoAnswer | Busy => false,
    }
  }

  /// Validate and perform a transition.
  pub fn transition_to(self, next: CallStatus) -> Result<CallStatus> {
    if self.can_transition_to(next) {
      Ok(next)
    } else {
      Err(Error::IllegalTransition { from: self, to: next })
    }
  }
}

impl std::fmt::Display for CallStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Pending => "pending",
      Self::Ringing => "ringing",
      Self::InProgress => "in_progress",
      Self::Completed => "completed",
      Self::Failed => "failed",
      Self::NoAnswer => "no_answer",
      Self::Busy => "busy",
    };
    f.write_str(s)
  }
}

/// Call direction. This subsystem only produces outbound calls; inbound is
/// carried for calls ingested from the gateway's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Outbound,
  Inbound,
}

// ─── Call ────────────────────────────────────────────────────────────────────

/// One dialing attempt and its conversation cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
  pub call_id:       Uuid,
  pub target_id:     Uuid,
  pub target_type:   TargetType,
  pub customer_name: String,
  pub phone_number:  String,
  /// Immutable once dialing begins.
  pub script_id:     Uuid,
  pub status:        CallStatus,
  pub direction:     Direction,
  /// Attempt count for this `(target_id, target_type)` pair; starts at 1.
  pub attempt_number: u32,
  /// Index of the next question to ask; monotonically non-decreasing and
  /// never exceeds the script's question count.
  pub current_question_index:   u32,
  /// Times the question awaiting an answer has been re-asked.
  pub current_question_retries: u32,
  /// Identity of the human or service that triggered the call.
  pub initiated_by: String,
  pub created_at:   DateTime<Utc>,
  pub started_at:   Option<DateTime<Utc>>,
  pub ended_at:     Option<DateTime<Utc>>,
  pub total_questions_asked:    u32,
  pub total_questions_answered: u32,
  /// Populated only after the call reaches a terminal status.
  pub call_summary:  Option<String>,
  /// Populated only after the call reaches a terminal status.
  pub qualification: Option<QualificationResult>,
}

impl Call {
  /// Seconds between answer and hang-up, once both are known.
  pub fn duration_seconds(&self) -> Option<i64> {
    match (self.started_at, self.ended_at) {
      (Some(start), Some(end)) => Some((end - start).num_seconds()),
      _ => None,
    }
  }

  /// Seconds elapsed since the call was answered (or created, before the
  /// answer event lands). Used to stamp transcript messages.
  pub fn seconds_since_start(&self, now: DateTime<Utc>) -> i64 {
    (now - self.started_at.unwrap_or(self.created_at)).num_seconds()
  }
}

// ─── NewCall ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CallStore::create_call`]. The store assigns
/// `call_id`, `created_at`, `attempt_number`, and the initial cursor.
#[derive(Debug, Clone)]
pub struct NewCall {
  pub target_id:     Uuid,
  pub target_type:   TargetType,
  pub customer_name: String,
  pub phone_number:  String,
  pub script_id:     Uuid,
  pub initiated_by:  String,
}

// ─── Phone validation ────────────────────────────────────────────────────────

/// Validate an E.164-ish phone number: an optional leading `+` followed by
/// 8 to 15 digits, nothing else.
pub fn validate_phone_number(number: &str) -> Result<()> {
  let digits = number.strip_prefix('+').unwrap_or(number);
  let ok = (8..=15).contains(&digits.len())
    && digits.chars().all(|c| c.is_ascii_digit());
  if ok {
    Ok(())
  } else {
    Err(Error::InvalidPhoneNumber(number.to_string()))
  }
}
