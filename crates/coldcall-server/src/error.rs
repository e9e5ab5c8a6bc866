//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid webhook signature")]
  InvalidSignature,

  #[error("unknown call: {0}")]
  UnknownCall(Uuid),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("xml error: {0}")]
  Xml(String),

  #[error("engine error: {0}")]
  Engine(#[from] coldcall_engine::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend store error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::InvalidSignature => {
        (StatusCode::FORBIDDEN, "invalid signature").into_response()
      }
      Error::UnknownCall(_) => {
        (StatusCode::NOT_FOUND, "unknown call").into_response()
      }
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Xml(msg) => {
        (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
      }
      Error::Engine(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
      Error::Store(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
    }
  }
}
