//! JSON REST API for Coldcall.
//!
//! Exposes an axum [`Router`] over the orchestrator's entry points and the
//! read surfaces of the stores. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", coldcall_api::router(api_state))
//! ```

pub mod analytics;
pub mod calls;
pub mod error;
pub mod scripts;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use coldcall_core::store::{CallStore, ScriptStore};
use coldcall_engine::{gateway::TelephonyGateway, orchestrator::Orchestrator};

pub use error::ApiError;

/// State threaded through all API handlers.
pub struct ApiState<S, G> {
  pub store:        S,
  pub orchestrator: Arc<Orchestrator<S, G>>,
}

impl<S: Clone, G> Clone for ApiState<S, G> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      orchestrator: self.orchestrator.clone(),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S, G>(state: ApiState<S, G>) -> Router<()>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  Router::new()
    // Calls
    .route("/calls", post(calls::initiate::<S, G>))
    .route("/calls/bulk", post(calls::initiate_bulk::<S, G>))
    .route("/calls/{id}", get(calls::get_one::<S, G>))
    .route("/calls/{id}/retry", post(calls::retry::<S, G>))
    .route("/calls/{id}/messages", get(calls::messages::<S, G>))
    // Analytics
    .route("/analytics", get(analytics::handler::<S, G>))
    // Scripts
    .route("/scripts", get(scripts::list::<S, G>).post(scripts::create::<S, G>))
    .route("/scripts/{id}", get(scripts::get_one::<S, G>))
    .with_state(state)
}
