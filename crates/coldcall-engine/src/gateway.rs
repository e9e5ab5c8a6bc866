//! The telephony-gateway seam.

use std::future::Future;

use coldcall_core::call::Call;
use thiserror::Error;

/// The gateway refused or failed the create-call request.
#[derive(Debug, Error)]
#[error("call placement failed: {0}")]
pub struct PlacementError(pub String);

/// Seam to the telephony provider. Placement is fire-and-forget: once the
/// provider accepts the call, everything else arrives as webhook traffic.
pub trait TelephonyGateway: Send + Sync {
  fn place_call(
    &self,
    call: &Call,
  ) -> impl Future<Output = Result<(), PlacementError>> + Send;
}
