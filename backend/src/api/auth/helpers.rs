use axum::http::{HeaderMap, StatusCode};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::Duration as TimeDuration;

use crate::config::SessionConfig;
use crate::crypto;
use crate::db;
use crate::AppState;

/// Cookie holding the signed `state:code_verifier` pair during an OAuth round trip
pub(crate) const OAUTH_STATE_COOKIE: &str = "linkshelf_oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

fn jwt_algorithm() -> Algorithm {
    Algorithm::HS256
}

pub fn create_session_token(
    config: &SessionConfig,
    user: &db::User,
) -> Result<(String, DateTime<Utc>), StatusCode> {
    let expires_at = Utc::now() + ChronoDuration::hours(config.ttl_hours);

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(jwt_algorithm()),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| {
        tracing::error!("Failed to encode session token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((token, expires_at))
}

pub(crate) fn decode_session_token(config: &SessionConfig, token: &str) -> Option<Claims> {
    let mut validation = Validation::new(jwt_algorithm());
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )
    .ok()
    .map(|data| data.claims)
}

fn same_site(raw: &str) -> SameSite {
    match raw.to_lowercase().as_str() {
        "none" => SameSite::None,
        "strict" => SameSite::Strict,
        _ => SameSite::Lax,
    }
}

fn base_cookie(config: &SessionConfig, name: String, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(same_site(&config.cookie_same_site));

    if let Some(domain) = config.cookie_domain.clone() {
        cookie.set_domain(domain);
    }
    if config.cookie_secure {
        cookie.set_secure(true);
    }

    cookie
}

pub(crate) fn set_session_cookie(jar: CookieJar, config: &SessionConfig, token: &str) -> CookieJar {
    let mut cookie = base_cookie(config, config.cookie_name.clone(), token.to_string());
    cookie.set_max_age(Some(TimeDuration::hours(config.ttl_hours)));
    jar.add(cookie)
}

pub(crate) fn delete_session_cookie(jar: CookieJar, config: &SessionConfig) -> CookieJar {
    let mut cookie = base_cookie(config, config.cookie_name.clone(), String::new());
    cookie.set_max_age(Some(TimeDuration::ZERO));
    jar.add(cookie)
}

/// Store the OAuth `state` and PKCE verifier, signed so the callback can trust them
pub(crate) fn set_oauth_state_cookie(
    jar: CookieJar,
    config: &SessionConfig,
    state: &str,
    code_verifier: &str,
) -> anyhow::Result<CookieJar> {
    let signed = crypto::sign_value(&config.jwt_secret, &format!("{state}:{code_verifier}"))?;
    let mut cookie = base_cookie(config, OAUTH_STATE_COOKIE.to_string(), signed);
    cookie.set_max_age(Some(TimeDuration::minutes(OAUTH_STATE_TTL_MINUTES)));
    // The provider redirects back cross-site, Strict would drop the cookie
    if cookie.same_site() == Some(SameSite::Strict) {
        cookie.set_same_site(SameSite::Lax);
    }
    Ok(jar.add(cookie))
}

/// Returns the stored `(state, code_verifier)` if the cookie is present and untampered
pub(crate) fn read_oauth_state_cookie(
    jar: &CookieJar,
    config: &SessionConfig,
) -> Option<(String, String)> {
    let signed = jar.get(OAUTH_STATE_COOKIE)?.value().to_string();
    let value = crypto::verify_signed_value(&config.jwt_secret, &signed)?;
    let (state, verifier) = value.split_once(':')?;
    Some((state.to_string(), verifier.to_string()))
}

pub(crate) fn delete_oauth_state_cookie(jar: CookieJar, config: &SessionConfig) -> CookieJar {
    let mut cookie = base_cookie(config, OAUTH_STATE_COOKIE.to_string(), String::new());
    cookie.set_max_age(Some(TimeDuration::ZERO));
    jar.add(cookie)
}

/// Session token from the cookie, falling back to `Authorization: Bearer`
pub fn session_token(config: &SessionConfig, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(&config.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|stripped| stripped.to_string())
        })
}

/// Resolve the session on this request, if any.
///
/// `Ok(None)` means "signed out": no token, an invalid or expired token, or a
/// token for a user that no longer exists. Only database failures are errors.
pub async fn current_session(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> anyhow::Result<Option<(db::User, Claims)>> {
    let Some(token) = session_token(&state.config.session, jar, headers) else {
        return Ok(None);
    };
    let Some(claims) = decode_session_token(&state.config.session, &token) else {
        tracing::debug!("Rejected invalid or expired session token");
        return Ok(None);
    };

    let user = state.db.get_user_by_id(&claims.sub).await?;
    Ok(user.map(|user| (user, claims)))
}

pub async fn get_current_user(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<db::User, StatusCode> {
    match current_session(state, jar, headers).await {
        Ok(Some((user, _))) => Ok(user),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(e) => {
            tracing::error!("Failed to load session user: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
