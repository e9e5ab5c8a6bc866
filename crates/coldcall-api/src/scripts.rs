//! Handlers for `/scripts` endpoints.
//!
//! Scripts are versioned and immutable: an "edit" is a new script row with
//! the `active` flag flipped, so live calls keep the exact question
//! sequence they started with.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use coldcall_core::{
  script::{NewScript, Question, Script, TargetType},
  store::{CallStore, ScriptStore},
};
use coldcall_engine::gateway::TelephonyGateway;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub active:                   bool,
  pub target_types:             Vec<TargetType>,
  pub questions:                Vec<Question>,
  pub greeting_text:            String,
  pub closing_text:             String,
  pub max_retries_per_question: u32,
}

impl From<CreateBody> for NewScript {
  fn from(body: CreateBody) -> Self {
    Self {
      active:                   body.active,
      target_types:             body.target_types,
      questions:                body.questions,
      greeting_text:            body.greeting_text,
      closing_text:             body.closing_text,
      max_retries_per_question: body.max_retries_per_question,
    }
  }
}

/// `POST /scripts`
pub async fn create<S, G>(
  State(state): State<ApiState<S, G>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let input: NewScript = body.into();
  // Surface validation problems as 400s rather than store errors.
  input
    .validate()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let script = state.store.add_script(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(script)))
}

/// `GET /scripts`
pub async fn list<S, G>(
  State(state): State<ApiState<S, G>>,
) -> Result<Json<Vec<Script>>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let scripts = state.store.list_scripts().await.map_err(ApiError::store)?;
  Ok(Json(scripts))
}

/// `GET /scripts/:id`
pub async fn get_one<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Script>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let script = state
    .store
    .get_script(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("script {id} not found")))?;
  Ok(Json(script))
}
