//! HTTP implementation of the text-generation seam.

use std::sync::Arc;

use coldcall_engine::textgen::{GenerationError, TextGenerator};
use serde::Deserialize;
use serde_json::json;

use crate::ServerConfig;

pub struct TextGenConfig {
  pub base_url: String,
  pub api_key:  String,
}

impl TextGenConfig {
  pub fn from_server_config(config: &ServerConfig) -> Self {
    Self {
      base_url: config.textgen_base_url.clone(),
      api_key:  config.textgen_api_key.clone(),
    }
  }
}

#[derive(Deserialize)]
struct GenerateResponse {
  text: String,
}

/// Narrow client for the text-generation service: one `generate` operation,
/// with `generate_json` parsing the returned text as a JSON object.
#[derive(Clone)]
pub struct HttpTextGenerator {
  client: reqwest::Client,
  config: Arc<TextGenConfig>,
}

impl HttpTextGenerator {
  pub fn new(config: TextGenConfig) -> Self {
    Self { client: reqwest::Client::new(), config: Arc::new(config) }
  }

  async fn call_service(
    &self,
    system: &str,
    prompt: &str,
  ) -> Result<String, GenerationError> {
    let url = format!(
      "{}/v1/generate",
      self.config.base_url.trim_end_matches('/')
    );
    let response = self
      .client
      .post(url)
      .bearer_auth(&self.config.api_key)
      .json(&json!({ "system": system, "prompt": prompt }))
      .send()
      .await
      .map_err(|e| GenerationError(e.to_string()))?;

    if !response.status().is_success() {
      return Err(GenerationError(format!(
        "generation service returned {}",
        response.status()
      )));
    }
    let body: GenerateResponse = response
      .json()
      .await
      .map_err(|e| GenerationError(e.to_string()))?;
    Ok(body.text)
  }
}

impl TextGenerator for HttpTextGenerator {
  async fn generate(
    &self,
    system: &str,
    prompt: &str,
  ) -> Result<String, GenerationError> {
    self.call_service(system, prompt).await
  }

  async fn generate_json(
    &self,
    system: &str,
    prompt: &str,
  ) -> Result<serde_json::Value, GenerationError> {
    let text = self.call_service(system, prompt).await?;
    serde_json::from_str(&text)
      .map_err(|e| GenerationError(format!("service returned invalid json: {e}")))
  }
}
