//! Webhook signature verification.
//!
//! The gateway signs every webhook with HMAC-SHA1 over the full public URL
//! followed by the POST parameters sorted by key, each appended as
//! `keyvalue`, keyed by the shared auth token and base64-encoded into the
//! `x-telephony-signature` header. No state is touched before the check.

use axum::http::HeaderMap;
use base64::Engine as _;
use ring::hmac;

use crate::error::Error;

pub const SIGNATURE_HEADER: &str = "x-telephony-signature";

/// Shared-secret material for webhook verification.
pub struct SignatureConfig {
  pub auth_token: String,
  /// Externally reachable base URL the gateway signed against.
  pub public_base_url: String,
}

/// Compute the expected signature for a request. Public so tests (and the
/// gateway client) can sign requests the same way the gateway does.
pub fn compute_signature(
  auth_token: &str,
  url: &str,
  params: &[(String, String)],
) -> String {
  let mut sorted: Vec<&(String, String)> = params.iter().collect();
  sorted.sort_by(|a, b| a.0.cmp(&b.0));

  let mut payload = url.to_string();
  for (key, value) in sorted {
    payload.push_str(key);
    payload.push_str(value);
  }

  let key = hmac::Key::new(
    hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
    auth_token.as_bytes(),
  );
  let tag = hmac::sign(&key, payload.as_bytes());
  base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
}

/// Verify the signature header against the reconstructed public URL and the
/// decoded POST parameters. Comparison is constant-time.
pub fn verify_signature(
  config: &SignatureConfig,
  headers: &HeaderMap,
  path_and_query: &str,
  params: &[(String, String)],
) -> Result<(), Error> {
  let presented = headers
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::InvalidSignature)?;

  let url = format!(
    "{}{}",
    config.public_base_url.trim_end_matches('/'),
    path_and_query
  );
  let expected = compute_signature(&config.auth_token, &url, params);

  ring::constant_time::verify_slices_are_equal(
    presented.as_bytes(),
    expected.as_bytes(),
  )
  .map_err(|_| Error::InvalidSignature)
}

/// Decode an `application/x-www-form-urlencoded` body into key/value pairs.
pub fn parse_form(body: &[u8]) -> Result<Vec<(String, String)>, Error> {
  let s = std::str::from_utf8(body)
    .map_err(|_| Error::BadRequest("form body is not utf-8".into()))?;
  if s.is_empty() {
    return Ok(Vec::new());
  }
  s.split('&')
    .map(|pair| {
      let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
      Ok((decode_component(key)?, decode_component(value)?))
    })
    .collect()
}

fn decode_component(s: &str) -> Result<String, Error> {
  // Form encoding spells spaces as '+'.
  let s = s.replace('+', " ");
  urlencoding::decode(&s)
    .map(|c| c.into_owned())
    .map_err(|_| Error::BadRequest("malformed form encoding".into()))
}
