//! Handler for `GET /analytics`.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use coldcall_core::{
  script::TargetType,
  store::{CallAnalytics, CallFilter, CallStore, ScriptStore},
};
use coldcall_engine::gateway::TelephonyGateway;
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
  pub target_type: Option<TargetType>,
  pub since:       Option<DateTime<Utc>>,
  pub until:       Option<DateTime<Utc>>,
}

/// `GET /analytics[?target_type=&since=&until=]`
pub async fn handler<S, G>(
  State(state): State<ApiState<S, G>>,
  Query(params): Query<AnalyticsParams>,
) -> Result<Json<CallAnalytics>, ApiError>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  let filter = CallFilter {
    target_type: params.target_type,
    since:       params.since,
    until:       params.until,
  };
  let analytics = state
    .orchestrator
    .call_analytics(&filter)
    .await
    .map_err(ApiError::from)?;
  Ok(Json(analytics))
}
