//! Webhook protocol layer for Coldcall.
//!
//! Exposes an axum [`Router`] with the telephony-gateway webhook endpoints
//! and the JSON API (nested under `/api`), backed by any store implementing
//! the core traits and any gateway/text-generation seams.

pub mod auth;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod textgen;
pub mod twiml;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::post};
use coldcall_core::store::{CallStore, ScriptStore};
use coldcall_engine::{
  conversation::ConversationEngine, gateway::TelephonyGateway,
  locks::CallLocks, orchestrator::Orchestrator, textgen::TextGenerator,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::SignatureConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `COLDCALL_*` environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// Externally reachable base URL; the gateway posts webhooks here and
  /// signs against it.
  pub public_base_url: String,
  pub store_path: PathBuf,
  /// Shared secret for webhook signature verification.
  pub webhook_auth_token: String,

  // Orchestrator knobs.
  pub calling_enabled:             bool,
  pub max_active_calls:            u32,
  pub max_attempts_per_target:     u32,
  pub max_batch_size:              usize,
  pub bulk_dispatch_interval_secs: u64,

  // Telephony gateway account.
  pub gateway_base_url:   String,
  pub gateway_account_id: String,
  pub gateway_auth_token: String,
  pub caller_id:          String,
  pub ring_timeout_secs:  u32,

  // Text-generation service.
  pub textgen_base_url: String,
  pub textgen_api_key:  String,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, G, T> {
  pub store:        S,
  pub engine:       Arc<ConversationEngine<S, T>>,
  pub orchestrator: Arc<Orchestrator<S, G>>,
  pub locks:        CallLocks,
  pub auth:         Arc<SignatureConfig>,
}

impl<S: Clone, G, T> Clone for AppState<S, G, T> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      engine:       self.engine.clone(),
      orchestrator: self.orchestrator.clone(),
      locks:        self.locks.clone(),
      auth:         self.auth.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full axum [`Router`]: webhook endpoints plus the `/api` JSON
/// surface.
pub fn router<S, G, T>(state: AppState<S, G, T>) -> Router
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
  T: TextGenerator + Send + Sync + 'static,
{
  let api = coldcall_api::router(coldcall_api::ApiState {
    store:        state.store.clone(),
    orchestrator: state.orchestrator.clone(),
  });

  Router::new()
    .route("/webhooks/voice/{call_id}",    post(handlers::voice::voice::<S, G, T>))
    .route("/webhooks/gather/{call_id}",   post(handlers::gather::gather::<S, G, T>))
    .route("/webhooks/fallback/{call_id}", post(handlers::fallback::fallback::<S, G, T>))
    .route("/webhooks/status/{call_id}",   post(handlers::status::status::<S, G, T>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
