//! Transcript messages — the append-only conversation record of a call.
//!
//! Message order is insertion order is conversational order. No message is
//! ever edited or deleted, and no message may be appended to a terminal call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder content recorded for a question whose retries are exhausted.
pub const NO_RESPONSE_PLACEHOLDER: &str = "[no response]";

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
  Ai,
  Client,
}

impl MessageRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ai => "ai",
      Self::Client => "client",
    }
  }
}

/// One transcript line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMessage {
  pub message_id: Uuid,
  pub call_id:    Uuid,
  pub role:       MessageRole,
  pub content:    String,
  /// The script question this line belongs to, if any. The closing line and
  /// a zero-question greeting carry no key.
  pub question_key: Option<String>,
  /// Seconds from call start.
  pub timestamp_in_call: i64,
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::CallStore::append_message`].
/// `message_id` and `recorded_at` are set by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub call_id:           Uuid,
  pub role:              MessageRole,
  pub content:           String,
  pub question_key:      Option<String>,
  pub timestamp_in_call: i64,
}
