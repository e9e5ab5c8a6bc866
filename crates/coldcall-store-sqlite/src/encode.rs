//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields
//! (questions, target types, qualification) are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use coldcall_core::{
  call::{Call, CallStatus, Direction},
  message::{CallMessage, MessageRole},
  outcome::QualificationResult,
  script::{Question, Script, TargetType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── CallStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(s: CallStatus) -> &'static str {
  match s {
    CallStatus::Pending => "pending",
    CallStatus::Ringing => "ringing",
    CallStatus::InProgress => "in_progress",
    CallStatus::Completed => "completed",
    CallStatus::Failed => "failed",
    CallStatus::NoAnswer => "no_answer",
    CallStatus::Busy => "busy",
  }
}

pub fn decode_status(s: &str) -> Result<CallStatus> {
  match s {
    "pending" => Ok(CallStatus::Pending),
    "ringing" => Ok(CallStatus::Ringing),
    "in_progress" => Ok(CallStatus::InProgress),
    "completed" => Ok(CallStatus::Completed),
    "failed" => Ok(CallStatus::Failed),
    "no_answer" => Ok(CallStatus::NoAnswer),
    "busy" => Ok(CallStatus::Busy),
    other => Err(Error::Decode(format!("unknown call status: {other:?}"))),
  }
}

// ─── TargetType ──────────────────────────────────────────────────────────────

pub fn encode_target_type(t: TargetType) -> &'static str {
  match t {
    TargetType::Lead => "lead",
    TargetType::Customer => "customer",
  }
}

pub fn decode_target_type(s: &str) -> Result<TargetType> {
  match s {
    "lead" => Ok(TargetType::Lead),
    "customer" => Ok(TargetType::Customer),
    other => Err(Error::Decode(format!("unknown target type: {other:?}"))),
  }
}

// ─── Direction ───────────────────────────────────────────────────────────────

pub fn encode_direction(d: Direction) -> &'static str {
  match d {
    Direction::Outbound => "outbound",
    Direction::Inbound => "inbound",
  }
}

pub fn decode_direction(s: &str) -> Result<Direction> {
  match s {
    "outbound" => Ok(Direction::Outbound),
    "inbound" => Ok(Direction::Inbound),
    other => Err(Error::Decode(format!("unknown direction: {other:?}"))),
  }
}

// ─── MessageRole ─────────────────────────────────────────────────────────────

pub fn encode_role(r: MessageRole) -> &'static str { r.as_str() }

pub fn decode_role(s: &str) -> Result<MessageRole> {
  match s {
    "ai" => Ok(MessageRole::Ai),
    "client" => Ok(MessageRole::Client),
    other => Err(Error::Decode(format!("unknown message role: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_questions(questions: &[Question]) -> Result<String> {
  Ok(serde_json::to_string(questions)?)
}

pub fn decode_questions(s: &str) -> Result<Vec<Question>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_target_types(types: &[TargetType]) -> Result<String> {
  Ok(serde_json::to_string(types)?)
}

pub fn decode_target_types(s: &str) -> Result<Vec<TargetType>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_qualification(q: &QualificationResult) -> Result<String> {
  Ok(serde_json::to_string(q)?)
}

pub fn decode_qualification(s: &str) -> Result<QualificationResult> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `scripts` row.
pub struct RawScript {
  pub script_id:                String,
  pub active:                   bool,
  pub target_types:             String,
  pub questions:                String,
  pub greeting_text:            String,
  pub closing_text:             String,
  pub max_retries_per_question: u32,
  pub activated_at:             Option<String>,
  pub created_at:               String,
}

impl RawScript {
  pub fn into_script(self) -> Result<Script> {
    Ok(Script {
      script_id:                decode_uuid(&self.script_id)?,
      active:                   self.active,
      target_types:             decode_target_types(&self.target_types)?,
      questions:                decode_questions(&self.questions)?,
      greeting_text:            self.greeting_text,
      closing_text:             self.closing_text,
      max_retries_per_question: self.max_retries_per_question,
      activated_at:             self.activated_at.as_deref().map(decode_dt).transpose()?,
      created_at:               decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `calls` row.
pub struct RawCall {
  pub call_id:        String,
  pub target_id:      String,
  pub target_type:    String,
  pub customer_name:  String,
  pub phone_number:   String,
  pub script_id:      String,
  pub status:         String,
  pub direction:      String,
  pub attempt_number: u32,
  pub current_question_index:   u32,
  pub current_question_retries: u32,
  pub initiated_by: String,
  pub created_at:   String,
  pub started_at:   Option<String>,
  pub ended_at:     Option<String>,
  pub total_questions_asked:    u32,
  pub total_questions_answered: u32,
  pub call_summary:  Option<String>,
  pub qualification: Option<String>,
}

impl RawCall {
  pub fn into_call(self) -> Result<Call> {
    Ok(Call {
      call_id:        decode_uuid(&self.call_id)?,
      target_id:      decode_uuid(&self.target_id)?,
      target_type:    decode_target_type(&self.target_type)?,
      customer_name:  self.customer_name,
      phone_number:   self.phone_number,
      script_id:      decode_uuid(&self.script_id)?,
      status:         decode_status(&self.status)?,
      direction:      decode_direction(&self.direction)?,
      attempt_number: self.attempt_number,
      current_question_index:   self.current_question_index,
      current_question_retries: self.current_question_retries,
      initiated_by: self.initiated_by,
      created_at:   decode_dt(&self.created_at)?,
      started_at:   self.started_at.as_deref().map(decode_dt).transpose()?,
      ended_at:     self.ended_at.as_deref().map(decode_dt).transpose()?,
      total_questions_asked:    self.total_questions_asked,
      total_questions_answered: self.total_questions_answered,
      call_summary:  self.call_summary,
      qualification: self
        .qualification
        .as_deref()
        .map(decode_qualification)
        .transpose()?,
    })
  }
}

/// Raw strings read directly from a `call_messages` row.
pub struct RawMessage {
  pub message_id:        String,
  pub call_id:           String,
  pub role:              String,
  pub content:           String,
  pub question_key:      Option<String>,
  pub timestamp_in_call: i64,
  pub recorded_at:       String,
}

impl RawMessage {
  pub fn into_message(self) -> Result<CallMessage> {
    Ok(CallMessage {
      message_id:        decode_uuid(&self.message_id)?,
      call_id:           decode_uuid(&self.call_id)?,
      role:              decode_role(&self.role)?,
      content:           self.content,
      question_key:      self.question_key,
      timestamp_in_call: self.timestamp_in_call,
      recorded_at:       decode_dt(&self.recorded_at)?,
    })
  }
}
