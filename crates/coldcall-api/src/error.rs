//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("too many requests: {0}")]
  TooManyRequests(String),

  #[error("service unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<coldcall_engine::Error> for ApiError {
  fn from(e: coldcall_engine::Error) -> Self {
    use coldcall_engine::Error as E;
    match e {
      E::Disabled => ApiError::Unavailable(e.to_string()),
      E::ConcurrencyLimitExceeded { .. } => {
        ApiError::TooManyRequests(e.to_string())
      }
      E::MaxAttemptsExceeded { .. }
      | E::NotRetryable(_)
      | E::NoActiveScript(_)
      | E::ScriptUnavailable(_) => ApiError::Conflict(e.to_string()),
      E::InvalidPhoneNumber(_) | E::BatchTooLarge { .. } => {
        ApiError::BadRequest(e.to_string())
      }
      E::CallNotFound(id) => ApiError::NotFound(format!("call {id} not found")),
      E::Store(inner) => ApiError::Store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::TooManyRequests(m) => (StatusCode::TOO_MANY_REQUESTS, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
