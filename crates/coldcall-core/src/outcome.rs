//! Lead qualification buckets and the post-call enrichment result.

use serde::{Deserialize, Serialize};

/// Coarse qualification bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualification {
  Hot,
  Warm,
  Cold,
  Unqualified,
}

impl Qualification {
  /// Fixed score bands: hot 75-100, warm 50-74, cold 25-49, else unqualified.
  pub fn from_score(score: u8) -> Self {
    match score {
      75..=100 => Self::Hot,
      50..=74 => Self::Warm,
      25..=49 => Self::Cold,
      _ => Self::Unqualified,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Hot => "hot",
      Self::Warm => "warm",
      Self::Cold => "cold",
      Self::Unqualified => "unqualified",
    }
  }
}

/// Result of transcript qualification. `score: None` marks the degraded
/// sentinel produced when the text-generation service is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationResult {
  pub score:  Option<u8>,
  pub bucket: Qualification,
  pub notes:  String,
}

impl QualificationResult {
  /// The bucket is always recomputed from the score so the same transcript
  /// scores to the same bucket.
  pub fn from_score(score: u8, notes: String) -> Self {
    let score = score.min(100);
    Self { score: Some(score), bucket: Qualification::from_score(score), notes }
  }

  /// Degraded sentinel for text-generation failures; never an error.
  pub fn degraded(reason: &str) -> Self {
    Self {
      score:  None,
      bucket: Qualification::Unqualified,
      notes:  format!("qualification unavailable: {reason}"),
    }
  }

  pub fn is_degraded(&self) -> bool { self.score.is_none() }
}
