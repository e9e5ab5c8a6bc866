//! Script types — the versioned question list driving one conversation.
//!
//! A script is immutable once calls reference it. Edits are made by creating
//! a new script row and flipping the `active` flag, so a live call always
//! sees the exact question sequence it started with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// The kind of party a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
  Lead,
  Customer,
}

/// One scripted question. `text_fallback` is the degraded phrasing spoken
/// when the text-generation service cannot produce a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub key:           String,
  pub text_primary:  String,
  pub text_fallback: String,
}

/// A versioned call script. Read-only at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
  pub script_id:                Uuid,
  pub active:                   bool,
  pub target_types:             Vec<TargetType>,
  /// Order is significant and fixed for the lifetime of a call.
  pub questions:                Vec<Question>,
  /// Supports a `{customer_name}` placeholder.
  pub greeting_text:            String,
  /// Supports a `{customer_name}` placeholder.
  pub closing_text:             String,
  pub max_retries_per_question: u32,
  /// When the `active` flag was last set; drives selection tie-breaking.
  pub activated_at:             Option<DateTime<Utc>>,
  pub created_at:               DateTime<Utc>,
}

impl Script {
  pub fn applies_to(&self, target_type: TargetType) -> bool {
    self.target_types.contains(&target_type)
  }

  /// The question at `index`, or `None` once the script is exhausted.
  pub fn question_at(&self, index: u32) -> Option<&Question> {
    self.questions.get(index as usize)
  }

  pub fn question_count(&self) -> u32 { self.questions.len() as u32 }

  pub fn render_greeting(&self, customer_name: &str) -> String {
    render_template(&self.greeting_text, customer_name)
  }

  pub fn render_closing(&self, customer_name: &str) -> String {
    render_template(&self.closing_text, customer_name)
  }
}

/// Substitute the `{customer_name}` placeholder.
fn render_template(template: &str, customer_name: &str) -> String {
  template.replace("{customer_name}", customer_name)
}

/// Input to [`crate::store::ScriptStore::add_script`].
/// `script_id`, `created_at`, and `activated_at` are set by the store.
#[derive(Debug, Clone)]
pub struct NewScript {
  pub active:                   bool,
  pub target_types:             Vec<TargetType>,
  pub questions:                Vec<Question>,
  pub greeting_text:            String,
  pub closing_text:             String,
  pub max_retries_per_question: u32,
}

impl NewScript {
  /// A script usable in a live call has at least one question and unique
  /// question keys.
  pub fn validate(&self) -> Result<()> {
    if self.questions.is_empty() {
      return Err(Error::EmptyScript);
    }
    for (i, q) in self.questions.iter().enumerate() {
      if self.questions[..i].iter().any(|prev| prev.key == q.key) {
        return Err(Error::DuplicateQuestionKey(q.key.clone()));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn question(key: &str) -> Question {
    Question {
      key:           key.to_string(),
      text_primary:  format!("Primary text for {key}?"),
      text_fallback: format!("Fallback text for {key}?"),
    }
  }

  fn new_script(questions: Vec<Question>) -> NewScript {
    NewScript {
      active: true,
      target_types: vec![TargetType::Lead],
      questions,
      greeting_text: "Hello {customer_name}, thanks for your time.".into(),
      closing_text: "Goodbye {customer_name}.".into(),
      max_retries_per_question: 1,
    }
  }

  #[test]
  fn template_substitutes_customer_name() {
    assert_eq!(
      render_template("Hello {customer_name}!", "Alice"),
      "Hello Alice!"
    );
  }

  #[test]
  fn template_without_placeholder_is_untouched() {
    assert_eq!(render_template("Hello there!", "Alice"), "Hello there!");
  }

  #[test]
  fn validate_rejects_empty_question_list() {
    let script = new_script(vec![]);
    assert!(matches!(script.validate(), Err(Error::EmptyScript)));
  }

  #[test]
  fn validate_rejects_duplicate_keys() {
    let script = new_script(vec![question("budget"), question("budget")]);
    assert!(matches!(
      script.validate(),
      Err(Error::DuplicateQuestionKey(k)) if k == "budget"
    ));
  }

  #[test]
  fn validate_accepts_unique_keys() {
    let script = new_script(vec![question("budget"), question("timeline")]);
    assert!(script.validate().is_ok());
  }
}
