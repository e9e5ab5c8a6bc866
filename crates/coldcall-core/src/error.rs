//! Error types for `coldcall-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::call::CallStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("illegal status transition: {from} -> {to}")]
  IllegalTransition { from: CallStatus, to: CallStatus },

  #[error("call {0} is terminal and may no longer be mutated")]
  TerminalCall(Uuid),

  #[error("call {0} is not terminal; enrichment is only legal after the call ends")]
  CallNotTerminal(Uuid),

  #[error("invalid phone number: {0:?}")]
  InvalidPhoneNumber(String),

  #[error("script has no questions")]
  EmptyScript,

  #[error("duplicate question key in script: {0:?}")]
  DuplicateQuestionKey(String),

  #[error("question index {index} exceeds script length {len}")]
  QuestionIndexOutOfBounds { index: u32, len: u32 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
