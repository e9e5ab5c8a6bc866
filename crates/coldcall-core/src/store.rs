//! The `ScriptStore` and `CallStore` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `coldcall-store-sqlite`). Higher layers (`coldcall-engine`,
//! `coldcall-server`, `coldcall-api`) depend on these abstractions, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  call::{Call, CallStatus, NewCall},
  message::{CallMessage, NewMessage},
  outcome::QualificationResult,
  script::{NewScript, Script, TargetType},
};

// ─── Limits and rejections ───────────────────────────────────────────────────

/// Ceilings enforced atomically by [`CallStore::create_call`].
#[derive(Debug, Clone, Copy)]
pub struct CallLimits {
  /// Maximum calls simultaneously in `pending|ringing|in_progress`.
  pub max_active_calls: u32,
  /// Maximum dialing attempts per `(target_id, target_type)` pair.
  pub max_attempts_per_target: u32,
}

/// A create-call rejection. Rejections are data, not store failures: the
/// check-and-reserve is a single atomic operation and a ceiling hit is an
/// expected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRejection {
  ConcurrencyLimit { active: u32, max: u32 },
  MaxAttempts { attempts: u32, max: u32 },
}

/// Conversation cursor update applied by the engine after each turn.
/// The index and both counters are monotonically non-decreasing.
#[derive(Debug, Clone, Copy)]
pub struct CallProgress {
  pub current_question_index:   u32,
  pub current_question_retries: u32,
  pub total_questions_asked:    u32,
  pub total_questions_answered: u32,
}

// ─── Analytics ───────────────────────────────────────────────────────────────

/// Parameters for [`CallStore::analytics`].
#[derive(Debug, Clone, Default)]
pub struct CallFilter {
  pub target_type: Option<TargetType>,
  pub since:       Option<DateTime<Utc>>,
  pub until:       Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
  pub status: CallStatus,
  pub count:  u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
  pub date:  NaiveDate,
  pub count: u64,
}

/// Read-only aggregate over the calls table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnalytics {
  pub total_calls: u64,
  pub by_status:   Vec<StatusCount>,
  /// Completed calls over all calls in the filter window; 0 when empty.
  pub success_rate: f64,
  /// Mean duration over calls with both `started_at` and `ended_at`.
  pub avg_duration_seconds:   f64,
  pub avg_questions_asked:    f64,
  pub avg_questions_answered: f64,
  pub daily_counts: Vec<DailyCount>,
}

// ─── ScriptStore ─────────────────────────────────────────────────────────────

/// Abstraction over script persistence. Scripts are read-only at call time.
pub trait ScriptStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Validate and persist a new script version.
  fn add_script(
    &self,
    input: NewScript,
  ) -> impl Future<Output = Result<Script, Self::Error>> + Send + '_;

  /// Retrieve a script by id. Returns `None` if not found.
  fn get_script(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Script>, Self::Error>> + Send + '_;

  /// The active script for a target type. When more than one is active the
  /// tie-break is deterministic: most recently activated, then highest id.
  fn active_script_for(
    &self,
    target_type: TargetType,
  ) -> impl Future<Output = Result<Option<Script>, Self::Error>> + Send + '_;

  fn list_scripts(
    &self,
  ) -> impl Future<Output = Result<Vec<Script>, Self::Error>> + Send + '_;
}

// ─── CallStore ───────────────────────────────────────────────────────────────

/// Abstraction over call and transcript persistence.
///
/// Writes follow the state-machine rules in [`crate::call::CallStatus`]:
/// terminal calls admit no message appends, no cursor updates, and no
/// status transitions; only summary/qualification enrichment remains legal.
pub trait CallStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Atomically check both ceilings and insert the call with
  /// `attempt_number = prior attempts + 1`. The count-and-insert runs in a
  /// single transaction so concurrent initiations cannot oversubscribe the
  /// ceiling.
  fn create_call(
    &self,
    input: NewCall,
    limits: CallLimits,
  ) -> impl Future<Output = Result<Result<Call, CallRejection>, Self::Error>>
  + Send
  + '_;

  fn get_call(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Call>, Self::Error>> + Send + '_;

  /// Perform a status transition. A transition to the current status is an
  /// idempotent no-op (webhook redelivery). Entering `InProgress` stamps
  /// `started_at`; entering a terminal status stamps `ended_at`.
  fn transition_status(
    &self,
    id: Uuid,
    next: CallStatus,
  ) -> impl Future<Output = Result<Call, Self::Error>> + Send + '_;

  /// Append a transcript message. Rejected for terminal calls.
  fn append_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<CallMessage, Self::Error>> + Send + '_;

  /// All messages for a call in insertion (= conversational) order.
  fn get_messages(
    &self,
    call_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CallMessage>, Self::Error>> + Send + '_;

  /// Apply a conversation cursor update. Rejected for terminal calls and
  /// for regressions of the question index.
  fn update_progress(
    &self,
    id: Uuid,
    progress: CallProgress,
  ) -> impl Future<Output = Result<Call, Self::Error>> + Send + '_;

  /// Post-call enrichment; only legal on terminal calls.
  fn set_summary(
    &self,
    id: Uuid,
    summary: String,
  ) -> impl Future<Output = Result<Call, Self::Error>> + Send + '_;

  /// Post-call enrichment; only legal on terminal calls.
  fn set_qualification(
    &self,
    id: Uuid,
    qualification: QualificationResult,
  ) -> impl Future<Output = Result<Call, Self::Error>> + Send + '_;

  /// Prior dialing attempts for a `(target_id, target_type)` pair.
  fn count_attempts(
    &self,
    target_id: Uuid,
    target_type: TargetType,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Pure read aggregation over the calls table.
  fn analytics<'a>(
    &'a self,
    filter: &'a CallFilter,
  ) -> impl Future<Output = Result<CallAnalytics, Self::Error>> + Send + 'a;
}
