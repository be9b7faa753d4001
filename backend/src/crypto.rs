use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

fn mac_for(key: &str, value: &str) -> Result<HmacSha256> {
  let mut mac = HmacSha256::new_from_slice(key.as_bytes())
    .map_err(|e| anyhow::anyhow!("Failed to create HMAC: {}", e))?;
  mac.update(value.as_bytes());
  Ok(mac)
}

/// Append an HMAC-SHA256 signature: `<value>.<hex signature>`
pub fn sign_value(key: &str, value: &str) -> Result<String> {
  let signature = mac_for(key, value)?.finalize().into_bytes();
  Ok(format!("{}.{}", value, hex::encode(signature)))
}

/// Check a value produced by [`sign_value`] and return the original value.
/// Comparison is constant time.
pub fn verify_signed_value(key: &str, signed: &str) -> Option<String> {
  let (value, signature_hex) = signed.rsplit_once('.')?;
  let signature = hex::decode(signature_hex).ok()?;
  mac_for(key, value).ok()?.verify_slice(&signature).ok()?;
  Some(value.to_string())
}

/// Generate a URL-safe random token
pub fn generate_token(length: usize) -> String {
  use rand::distributions::Alphanumeric;
  use rand::Rng;

  let mut rng = rand::thread_rng();
  (0..length)
    .map(|_| rng.sample(Alphanumeric) as char)
    .collect()
}

/// PKCE S256 challenge for a code verifier (RFC 7636)
pub fn pkce_challenge(verifier: &str) -> String {
  let digest = Sha256::digest(verifier.as_bytes());
  URL_SAFE_NO_PAD.encode(digest)
}
