//! The call orchestrator — the single entry point for initiating calls.
//!
//! All preconditions (enabled flag, phone validation, script resolution)
//! run before the store's atomic check-and-reserve; dialing itself happens
//! on a spawned task so initiation returns immediately.

use std::time::Duration;

use coldcall_core::{
  call::{Call, CallStatus, NewCall, validate_phone_number},
  script::{Script, TargetType},
  store::{CallAnalytics, CallFilter, CallLimits, CallRejection, CallStore, ScriptStore},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{Error, Result, gateway::TelephonyGateway};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Kill switch; when off every initiation is rejected.
  pub enabled: bool,
  pub max_active_calls: u32,
  pub max_attempts_per_target: u32,
  /// Hard ceiling on one bulk request; larger batches are rejected whole.
  pub max_batch_size: usize,
  /// Stagger between consecutive dials of a bulk batch.
  pub bulk_dispatch_interval: Duration,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_active_calls: 10,
      max_attempts_per_target: 3,
      max_batch_size: 50,
      bulk_dispatch_interval: Duration::from_secs(2),
    }
  }
}

// ─── Requests and outcomes ───────────────────────────────────────────────────

/// One target to dial. `script_id: None` selects the active script for the
/// target type.
#[derive(Debug, Clone)]
pub struct DialRequest {
  pub target_id:     Uuid,
  pub target_type:   TargetType,
  pub customer_name: String,
  pub phone_number:  String,
  pub script_id:     Option<Uuid>,
  pub initiated_by:  String,
}

/// Per-target failure inside an otherwise accepted batch.
#[derive(Debug, Clone)]
pub struct BulkError {
  pub target_id: Uuid,
  pub reason:    String,
}

/// Result of a bulk initiation. `skipped == errors.len()`; the batch never
/// aborts on a per-target rejection.
#[derive(Debug)]
pub struct BulkOutcome {
  pub queued:  Vec<Call>,
  pub skipped: usize,
  pub errors:  Vec<BulkError>,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator<S, G> {
  store:   S,
  gateway: G,
  config:  OrchestratorConfig,
}

impl<S, G> Orchestrator<S, G>
where
  S: ScriptStore + CallStore + Clone + Send + Sync + 'static,
  G: TelephonyGateway + Clone + Send + Sync + 'static,
{
  pub fn new(store: S, gateway: G, config: OrchestratorConfig) -> Self {
    Self { store, gateway, config }
  }

  pub fn config(&self) -> &OrchestratorConfig { &self.config }

  fn limits(&self) -> CallLimits {
    CallLimits {
      max_active_calls:        self.config.max_active_calls,
      max_attempts_per_target: self.config.max_attempts_per_target,
    }
  }

  /// Initiate one outbound call and schedule its dial immediately.
  pub async fn initiate_call(&self, request: DialRequest) -> Result<Call> {
    if !self.config.enabled {
      return Err(Error::Disabled);
    }
    self.initiate_inner(request, None).await
  }

  /// Initiate a batch. An oversized batch is rejected before anything is
  /// queued; within a legal batch targets succeed or fail independently,
  /// and dials are staggered by `bulk_dispatch_interval`.
  pub async fn initiate_bulk_calls(
    &self,
    requests: Vec<DialRequest>,
  ) -> Result<BulkOutcome> {
    if !self.config.enabled {
      return Err(Error::Disabled);
    }
    if requests.len() > self.config.max_batch_size {
      return Err(Error::BatchTooLarge {
        got: requests.len(),
        max: self.config.max_batch_size,
      });
    }

    let mut queued = Vec::new();
    let mut errors = Vec::new();
    for (i, request) in requests.into_iter().enumerate() {
      let target_id = request.target_id;
      let delay = self.config.bulk_dispatch_interval * i as u32;
      match self.initiate_inner(request, Some(delay)).await {
        Ok(call) => queued.push(call),
        Err(e) => {
          warn!(%target_id, error = %e, "bulk target rejected");
          errors.push(BulkError { target_id, reason: e.to_string() });
        }
      }
    }

    info!(queued = queued.len(), skipped = errors.len(), "bulk batch queued");
    Ok(BulkOutcome { queued, skipped: errors.len(), errors })
  }

  /// Re-dial a finished-but-failed call as a brand-new attempt with the
  /// same script. Legal only from `failed|no_answer|busy`; the attempt
  /// ceiling is enforced by the same atomic path as a fresh initiation.
  pub async fn retry_call(&self, call_id: Uuid) -> Result<Call> {
    if !self.config.enabled {
      return Err(Error::Disabled);
    }

    let prior = self
      .store
      .get_call(call_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CallNotFound(call_id))?;
    if !matches!(
      prior.status,
      CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Busy
    ) {
      return Err(Error::NotRetryable(call_id));
    }

    let call = self
      .create(NewCall {
        target_id:     prior.target_id,
        target_type:   prior.target_type,
        customer_name: prior.customer_name,
        phone_number:  prior.phone_number,
        script_id:     prior.script_id,
        initiated_by:  prior.initiated_by,
      })
      .await?;
    info!(call_id = %call.call_id, attempt = call.attempt_number, "retry queued");
    self.spawn_dial(call.clone(), None);
    Ok(call)
  }

  /// Read-only aggregate over recorded calls.
  pub async fn call_analytics(&self, filter: &CallFilter) -> Result<CallAnalytics> {
    self.store.analytics(filter).await.map_err(Error::store)
  }

  // ─── Internals ─────────────────────────────────────────────────────────────

  async fn initiate_inner(
    &self,
    request: DialRequest,
    delay: Option<Duration>,
  ) -> Result<Call> {
    validate_phone_number(&request.phone_number)
      .map_err(|_| Error::InvalidPhoneNumber(request.phone_number.clone()))?;
    let script = self.resolve_script(&request).await?;

    let call = self
      .create(NewCall {
        target_id:     request.target_id,
        target_type:   request.target_type,
        customer_name: request.customer_name,
        phone_number:  request.phone_number,
        script_id:     script.script_id,
        initiated_by:  request.initiated_by,
      })
      .await?;
    info!(
      call_id = %call.call_id,
      target_id = %call.target_id,
      attempt = call.attempt_number,
      "call queued"
    );
    self.spawn_dial(call.clone(), delay);
    Ok(call)
  }

  /// An explicit script must exist, be active, and apply to the target
  /// type; otherwise the active script for the target type is selected.
  async fn resolve_script(&self, request: &DialRequest) -> Result<Script> {
    match request.script_id {
      Some(id) => {
        let script = self
          .store
          .get_script(id)
          .await
          .map_err(Error::store)?
          .ok_or(Error::ScriptUnavailable(id))?;
        if !script.active || !script.applies_to(request.target_type) {
          return Err(Error::ScriptUnavailable(id));
        }
        Ok(script)
      }
      None => self
        .store
        .active_script_for(request.target_type)
        .await
        .map_err(Error::store)?
        .ok_or(Error::NoActiveScript(request.target_type)),
    }
  }

  async fn create(&self, input: NewCall) -> Result<Call> {
    match self
      .store
      .create_call(input, self.limits())
      .await
      .map_err(Error::store)?
    {
      Ok(call) => Ok(call),
      Err(CallRejection::ConcurrencyLimit { active, max }) => {
        Err(Error::ConcurrencyLimitExceeded { active, max })
      }
      Err(CallRejection::MaxAttempts { attempts, max }) => {
        Err(Error::MaxAttemptsExceeded { attempts, max })
      }
    }
  }

  /// Dial on a detached task. A placement failure terminates the call as
  /// `Failed` so it stops holding a concurrency slot and becomes retryable.
  fn spawn_dial(&self, call: Call, delay: Option<Duration>) {
    let store = self.store.clone();
    let gateway = self.gateway.clone();
    tokio::spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      if let Err(e) = gateway.place_call(&call).await {
        warn!(call_id = %call.call_id, error = %e, "call placement failed");
        if let Err(e) = store
          .transition_status(call.call_id, CallStatus::Failed)
          .await
        {
          error!(call_id = %call.call_id, error = %e,
            "failed to mark unplaced call as failed");
        }
      }
    });
  }
}
