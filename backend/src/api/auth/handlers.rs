use axum::{
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Redirect, Response},
  Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::helpers::{
  create_session_token, current_session, delete_oauth_state_cookie, delete_session_cookie,
  get_current_user, read_oauth_state_cookie, set_oauth_state_cookie, set_session_cookie,
};
use super::oauth;
use crate::api::common::{internal_error, unauthorized, ApiError, ErrorResponse};
use crate::{crypto, db, AppState};

/// Where the callback sends the browser when the exchange fails
pub const AUTH_FAILED_REDIRECT: &str = "/?error=auth_failed";

#[derive(Debug, Serialize, ToSchema)]
pub struct UserOut {
  id: String,
  email: String,
  display_name: String,
  auth_provider: Option<String>,
}

impl From<db::User> for UserOut {
  fn from(user: db::User) -> Self {
    Self {
      id: user.id,
      email: user.email,
      display_name: user.display_name,
      auth_provider: user.auth_provider,
    }
  }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionOut {
  user: UserOut,
  /// RFC 3339 expiry of the session token
  expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
  session: Option<SessionOut>,
}

#[derive(Serialize, ToSchema)]
pub struct SignOutResponse {
  message: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
  code: Option<String>,
  error: Option<String>,
  state: Option<String>,
}

/// GET /auth/login: send the browser to the provider's consent page
pub async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
  let config = &state.config;
  let oauth_state = crypto::generate_token(32);
  let code_verifier = crypto::generate_token(64);
  let redirect_uri = config.oauth.redirect_uri(&config.public_url);

  let authorize_url = match oauth::build_authorize_url(
    &config.oauth,
    &redirect_uri,
    &oauth_state,
    &crypto::pkce_challenge(&code_verifier),
  ) {
    Ok(url) => url,
    Err(e) => {
      tracing::error!("Failed to build authorize URL: {}", e);
      return Redirect::to(AUTH_FAILED_REDIRECT).into_response();
    }
  };

  let jar = match set_oauth_state_cookie(jar, &config.session, &oauth_state, &code_verifier) {
    Ok(jar) => jar,
    Err(e) => {
      tracing::error!("Failed to sign OAuth state: {}", e);
      return Redirect::to(AUTH_FAILED_REDIRECT).into_response();
    }
  };

  tracing::info!(provider = %config.oauth.provider, "Starting OAuth sign-in");
  (jar, Redirect::to(&authorize_url)).into_response()
}

/// GET /auth/callback: exchange the authorization code for a session.
///
/// Any failure lands on `/?error=auth_failed`; a request without a code
/// (including a provider-reported error) lands on `/`.
pub async fn callback(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  Query(query): Query<CallbackQuery>,
) -> (CookieJar, Redirect) {
  tracing::info!(
    has_code = query.code.is_some(),
    has_error = query.error.is_some(),
    "OAuth callback"
  );

  let stored = read_oauth_state_cookie(&jar, &state.config.session);
  let jar = delete_oauth_state_cookie(jar, &state.config.session);

  let Some(code) = query.code else {
    return (jar, Redirect::to("/"));
  };

  let Some((expected_state, code_verifier)) = stored else {
    tracing::warn!("OAuth callback without a valid state cookie");
    return (jar, Redirect::to(AUTH_FAILED_REDIRECT));
  };
  if query.state.as_deref() != Some(expected_state.as_str()) {
    tracing::warn!("OAuth callback state mismatch");
    return (jar, Redirect::to(AUTH_FAILED_REDIRECT));
  }

  match exchange_code_for_session(&state, &code, &code_verifier).await {
    Ok((user, token)) => {
      tracing::info!(user_id = %user.id, "Signed in");
      let jar = set_session_cookie(jar, &state.config.session, &token);
      (jar, Redirect::to("/"))
    }
    Err(e) => {
      tracing::error!("Exchange error: {:#}", e);
      (jar, Redirect::to(AUTH_FAILED_REDIRECT))
    }
  }
}

async fn exchange_code_for_session(
  state: &AppState,
  code: &str,
  code_verifier: &str,
) -> anyhow::Result<(db::User, String)> {
  let config = &state.config;
  let redirect_uri = config.oauth.redirect_uri(&config.public_url);

  let access_token =
    oauth::exchange_code(&state.http, &config.oauth, &redirect_uri, code, code_verifier).await?;
  let identity = oauth::fetch_identity(&state.http, &config.oauth, &access_token).await?;
  let email = identity
    .email
    .ok_or_else(|| anyhow::anyhow!("Provider did not return an email address"))?;

  let user = state
    .db
    .upsert_oauth_user(
      &config.oauth.provider,
      &identity.external_id,
      &email,
      &identity.display_name,
    )
    .await?;

  let (token, _) = create_session_token(&config.session, &user)
    .map_err(|status| anyhow::anyhow!("Failed to create session token: {}", status))?;

  Ok((user, token))
}

/// POST /auth/signout: form sign-out from the HTML page
pub async fn signout_form(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
) -> (CookieJar, Redirect) {
  (delete_session_cookie(jar, &state.config.session), Redirect::to("/"))
}

/// Clear the session cookie
#[utoipa::path(
  post,
  path = "/api/v1/auth/signout",
  tag = "Auth",
  responses((status = 200, description = "Signed out", body = SignOutResponse))
)]
pub async fn signout(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
) -> (CookieJar, Json<SignOutResponse>) {
  let jar = delete_session_cookie(jar, &state.config.session);
  (
    jar,
    Json(SignOutResponse {
      message: "Signed out".to_string(),
    }),
  )
}

/// Current session, or `{"session": null}` when signed out
#[utoipa::path(
  get,
  path = "/api/v1/auth/session",
  tag = "Auth",
  responses(
    (status = 200, description = "Session state", body = SessionResponse),
    (status = 500, description = "Internal server error", body = ErrorResponse)
  )
)]
pub async fn session(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
  let session = current_session(&state, &jar, &headers).await.map_err(|e| {
    tracing::error!("Failed to load session: {}", e);
    internal_error("Failed to load session")
  })?;

  Ok(Json(SessionResponse {
    session: session.map(|(user, claims)| SessionOut {
      expires_at: claims.expires_at().to_rfc3339(),
      user: user.into(),
    }),
  }))
}

/// The signed-in user
#[utoipa::path(
  get,
  path = "/api/v1/auth/me",
  tag = "Auth",
  responses(
    (status = 200, description = "Current user", body = UserOut),
    (status = 401, description = "Not authenticated", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn me(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  headers: HeaderMap,
) -> Result<Json<UserOut>, ApiError> {
  let user = get_current_user(&state, &jar, &headers)
    .await
    .map_err(|status| match status {
      StatusCode::UNAUTHORIZED => unauthorized("Not authenticated"),
      _ => internal_error("Failed to load user"),
    })?;

  Ok(Json(user.into()))
}
