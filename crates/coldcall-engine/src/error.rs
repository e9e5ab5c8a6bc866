//! Error type for `coldcall-engine`.

use coldcall_core::script::TargetType;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("outbound calling is disabled")]
  Disabled,

  #[error("active call ceiling reached ({active}/{max})")]
  ConcurrencyLimitExceeded { active: u32, max: u32 },

  #[error("dialing attempt ceiling reached for target ({attempts}/{max})")]
  MaxAttemptsExceeded { attempts: u32, max: u32 },

  #[error("no active script for target type {0:?}")]
  NoActiveScript(TargetType),

  #[error("script {0} does not exist, is inactive, or does not apply")]
  ScriptUnavailable(Uuid),

  #[error("invalid phone number: {0:?}")]
  InvalidPhoneNumber(String),

  #[error("batch of {got} targets exceeds the limit of {max}")]
  BatchTooLarge { got: usize, max: usize },

  #[error("call {0} is not in a retryable status")]
  NotRetryable(Uuid),

  #[error("call not found: {0}")]
  CallNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend store error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
