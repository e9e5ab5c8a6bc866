//! Per-call mutation locks.
//!
//! Webhook deliveries for one call may race (redelivery, reordering); every
//! handler serialises on the lock for its `call_id` so read-decide-write
//! sequences against the store never interleave. Different calls proceed
//! independently.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct CallLocks {
  inner: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl CallLocks {
  pub fn new() -> Self { Self::default() }

  /// The lock for `call_id`, created on first use. Callers hold the
  /// returned guard's mutex across their whole handler body.
  pub async fn lock_for(&self, call_id: Uuid) -> Arc<Mutex<()>> {
    let mut map = self.inner.lock().await;
    map.entry(call_id).or_default().clone()
  }

  /// Drop the entry once the call is terminal. A late webhook simply
  /// re-creates it; the terminal guard in the store makes that harmless.
  pub async fn release(&self, call_id: Uuid) {
    self.inner.lock().await.remove(&call_id);
  }

  #[cfg(test)]
  pub async fn len(&self) -> usize { self.inner.lock().await.len() }
}
