//! The text-generation seam.
//!
//! The engine never fails a live call on a generation error: every caller
//! of this trait has a deterministic fallback (scripted fallback phrasing,
//! degraded summary/qualification sentinels).

use std::future::Future;

use thiserror::Error;

/// A failed or unreachable text-generation service.
#[derive(Debug, Error)]
#[error("text generation failed: {0}")]
pub struct GenerationError(pub String);

/// System constraint applied to every conversational transition. The
/// assistant must stay on script: no empathy, no apologies, no improvised
/// questions.
pub const TRANSITION_CONSTRAINTS: &str = "You are a concise assistant making \
   a scripted real-estate call. Acknowledge the client's answer in one short \
   clause, then ask the provided next question exactly as written. Do not \
   express empathy or apologies. Do not ask anything that is not the \
   provided next question.";

pub trait TextGenerator: Send + Sync {
  /// Free-form generation under a system constraint.
  fn generate(
    &self,
    system: &str,
    prompt: &str,
  ) -> impl Future<Output = Result<String, GenerationError>> + Send;

  /// Generation of a single JSON object under a system constraint.
  fn generate_json(
    &self,
    system: &str,
    prompt: &str,
  ) -> impl Future<Output = Result<serde_json::Value, GenerationError>> + Send;
}
