//! Error type for `coldcall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] coldcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("progress update would move call {0} backwards")]
  NonMonotonicProgress(uuid::Uuid),

  #[error("call not found: {0}")]
  CallNotFound(uuid::Uuid),

  #[error("script not found: {0}")]
  ScriptNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
