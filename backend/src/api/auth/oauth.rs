// OAuth 2.0 authorization-code flow against the configured provider
use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::OAuthConfig;

/// Identity extracted from the provider's userinfo response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
  pub external_id: String,
  pub email: Option<String>,
  pub display_name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: Option<String>,
  error: Option<String>,
  error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
  email: String,
  primary: bool,
  verified: bool,
}

pub fn build_authorize_url(
  config: &OAuthConfig,
  redirect_uri: &str,
  state: &str,
  code_challenge: &str,
) -> Result<String> {
  let mut url = url::Url::parse(&config.authorize_url)
    .with_context(|| format!("Invalid authorize URL: {}", config.authorize_url))?;
  {
    let mut query = url.query_pairs_mut();
    query
      .append_pair("client_id", &config.client_id)
      .append_pair("redirect_uri", redirect_uri)
      .append_pair("response_type", "code")
      .append_pair("state", state)
      .append_pair("code_challenge", code_challenge)
      .append_pair("code_challenge_method", "S256");
    if !config.scopes.is_empty() {
      query.append_pair("scope", &config.scopes);
    }
  }
  Ok(url.into())
}

fn parse_token_response(raw: &str) -> Result<String> {
  let parsed: TokenResponse =
    serde_json::from_str(raw).context("Token endpoint returned invalid JSON")?;

  if let Some(token) = parsed.access_token.filter(|t| !t.is_empty()) {
    return Ok(token);
  }

  match (parsed.error, parsed.error_description) {
    (Some(error), Some(description)) => bail!("Token exchange rejected: {error} ({description})"),
    (Some(error), None) => bail!("Token exchange rejected: {error}"),
    _ => bail!("Token endpoint response has no access_token"),
  }
}

/// Exchange an authorization code for a provider access token
pub async fn exchange_code(
  http: &reqwest::Client,
  config: &OAuthConfig,
  redirect_uri: &str,
  code: &str,
  code_verifier: &str,
) -> Result<String> {
  let resp = http
    .post(&config.token_url)
    .header(reqwest::header::ACCEPT, "application/json")
    .form(&[
      ("grant_type", "authorization_code"),
      ("code", code),
      ("redirect_uri", redirect_uri),
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
      ("code_verifier", code_verifier),
    ])
    .send()
    .await
    .context("Token exchange request failed")?;

  let status = resp.status();
  let body = resp.text().await.context("Failed to read token response")?;
  if !status.is_success() {
    bail!("Token endpoint returned {}: {}", status, body);
  }

  parse_token_response(&body)
}

/// Pull a stable id, email and name out of a userinfo document.
/// Handles both OIDC (`sub`, `name`) and GitHub (`id`, `login`) shapes.
pub fn extract_identity(userinfo: &serde_json::Value) -> Result<ProviderIdentity> {
  let external_id = match userinfo.get("sub").or_else(|| userinfo.get("id")) {
    Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
    Some(serde_json::Value::Number(n)) => n.to_string(),
    _ => bail!("Userinfo response has no 'sub' or 'id' field"),
  };

  let email = userinfo
    .get("email")
    .and_then(|v| v.as_str())
    .filter(|s| !s.is_empty())
    .map(str::to_lowercase);

  let display_name = ["name", "login", "preferred_username"]
    .iter()
    .find_map(|key| {
      userinfo
        .get(*key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    })
    .map(str::to_string)
    .or_else(|| {
      email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .map(str::to_string)
    })
    .unwrap_or_default();

  Ok(ProviderIdentity {
    external_id,
    email,
    display_name,
  })
}

/// Fetch the signed-in identity using the provider access token
pub async fn fetch_identity(
  http: &reqwest::Client,
  config: &OAuthConfig,
  access_token: &str,
) -> Result<ProviderIdentity> {
  let resp = http
    .get(&config.userinfo_url)
    .bearer_auth(access_token)
    .header(reqwest::header::ACCEPT, "application/json")
    .send()
    .await
    .context("Userinfo request failed")?;

  if !resp.status().is_success() {
    bail!("Userinfo endpoint returned {}", resp.status());
  }

  let userinfo: serde_json::Value = resp.json().await.context("Invalid userinfo JSON")?;
  let mut identity = extract_identity(&userinfo)?;

  // GitHub omits private emails from /user
  if identity.email.is_none() && config.provider == "github" {
    identity.email = fetch_github_primary_email(http, access_token).await?;
  }

  Ok(identity)
}

async fn fetch_github_primary_email(
  http: &reqwest::Client,
  access_token: &str,
) -> Result<Option<String>> {
  let emails: Vec<GitHubEmail> = http
    .get("https://api.github.com/user/emails")
    .bearer_auth(access_token)
    .header(reqwest::header::ACCEPT, "application/json")
    .send()
    .await
    .context("GitHub emails request failed")?
    .error_for_status()?
    .json()
    .await
    .context("Invalid GitHub emails JSON")?;

  Ok(pick_github_email(emails))
}

fn pick_github_email(emails: Vec<GitHubEmail>) -> Option<String> {
  let verified: Vec<GitHubEmail> = emails.into_iter().filter(|e| e.verified).collect();
  verified
    .iter()
    .find(|e| e.primary)
    .or_else(|| verified.first())
    .map(|e| e.email.to_lowercase())
}
