//! HTTP implementation of the telephony-gateway seam.

use std::sync::Arc;

use coldcall_core::call::Call;
use coldcall_engine::gateway::{PlacementError, TelephonyGateway};
use tracing::debug;

use crate::ServerConfig;

/// Gateway account and callback material for placing calls.
pub struct GatewayConfig {
  pub base_url:          String,
  pub account_id:        String,
  pub auth_token:        String,
  /// Caller-id number presented to the callee.
  pub caller_id:         String,
  pub public_base_url:   String,
  pub ring_timeout_secs: u32,
}

impl GatewayConfig {
  pub fn from_server_config(config: &ServerConfig) -> Self {
    Self {
      base_url:          config.gateway_base_url.clone(),
      account_id:        config.gateway_account_id.clone(),
      auth_token:        config.gateway_auth_token.clone(),
      caller_id:         config.caller_id.clone(),
      public_base_url:   config.public_base_url.clone(),
      ring_timeout_secs: config.ring_timeout_secs,
    }
  }
}

/// Places calls with one form-encoded POST against the provider's
/// create-call operation. The three callback URLs and the status callback
/// point back at this server's webhook endpoints.
#[derive(Clone)]
pub struct HttpTelephonyGateway {
  client: reqwest::Client,
  config: Arc<GatewayConfig>,
}

impl HttpTelephonyGateway {
  pub fn new(config: GatewayConfig) -> Self {
    Self { client: reqwest::Client::new(), config: Arc::new(config) }
  }

  fn webhook_url(&self, endpoint: &str, call: &Call) -> String {
    format!(
      "{}/webhooks/{endpoint}/{}",
      self.config.public_base_url.trim_end_matches('/'),
      call.call_id
    )
  }
}

impl TelephonyGateway for HttpTelephonyGateway {
  async fn place_call(&self, call: &Call) -> Result<(), PlacementError> {
    let url = format!(
      "{}/accounts/{}/calls",
      self.config.base_url.trim_end_matches('/'),
      self.config.account_id
    );
    let form = [
      ("To", call.phone_number.clone()),
      ("From", self.config.caller_id.clone()),
      ("Url", self.webhook_url("voice", call)),
      ("FallbackUrl", self.webhook_url("fallback", call)),
      ("StatusCallback", self.webhook_url("status", call)),
      ("Timeout", self.config.ring_timeout_secs.to_string()),
    ];

    debug!(call_id = %call.call_id, to = %call.phone_number, "placing call");
    let response = self
      .client
      .post(url)
      .basic_auth(&self.config.account_id, Some(&self.config.auth_token))
      .form(&form)
      .send()
      .await
      .map_err(|e| PlacementError(e.to_string()))?;

    if !response.status().is_success() {
      return Err(PlacementError(format!(
        "gateway returned {}",
        response.status()
      )));
    }
    Ok(())
  }
}
