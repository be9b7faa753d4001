use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use super::helpers::current_session;
use crate::api::common::{internal_error, unauthorized, ApiError};
use crate::db;
use crate::AppState;

/// The authenticated user, inserted into request extensions by
/// [`require_session`]
#[derive(Debug, Clone)]
pub struct AuthUser(pub db::User);

/// Reject requests without a valid session; expose the user to handlers
pub async fn require_session(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  cookie_jar: CookieJar,
  mut request: Request,
  next: Next,
) -> Result<Response, ApiError> {
  match current_session(&state, &cookie_jar, &headers).await {
    Ok(Some((user, _claims))) => {
      request.extensions_mut().insert(AuthUser(user));
      Ok(next.run(request).await)
    }
    Ok(None) => Err(unauthorized(
      "Authentication required. Sign in or provide a session token (Bearer ...)",
    )),
    Err(e) => {
      tracing::error!("Failed to authenticate request: {}", e);
      Err(internal_error("Failed to authenticate"))
    }
  }
}
