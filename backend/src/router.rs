use axum::{
  extract::DefaultBodyLimit,
  http::{header, HeaderValue, Method},
  middleware,
  routing::{get, post, put},
  Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::AppState;

/// Linkshelf API
#[derive(OpenApi)]
#[openapi(
  info(
    title = "Linkshelf API",
    version = "0.1.0",
    description = "Personal bookmarks with a live change stream"
  ),
  servers((url = "/", description = "Current server")),
  paths(
    api::health::health,
    api::auth::handlers::session,
    api::auth::handlers::me,
    api::auth::handlers::signout,
    api::bookmarks::handlers::list_bookmarks,
    api::bookmarks::handlers::create_bookmark,
    api::bookmarks::handlers::update_bookmark,
    api::bookmarks::handlers::delete_bookmark,
    api::bookmarks::handlers::stream_bookmarks,
  ),
  components(schemas(
    api::common::ErrorResponse,
    api::health::HealthResponse,
    api::auth::handlers::UserOut,
    api::auth::handlers::SessionOut,
    api::auth::handlers::SessionResponse,
    api::auth::handlers::SignOutResponse,
    api::bookmarks::handlers::CreateBookmarkRequest,
    api::bookmarks::handlers::UpdateBookmarkRequest,
    api::bookmarks::handlers::BookmarksResponse,
    crate::db::Bookmark,
    crate::realtime::BookmarkChange,
    crate::realtime::ChangeType,
  )),
  modifiers(&SecurityAddon),
  tags(
    (name = "Health", description = "Health check endpoints"),
    (name = "Auth", description = "Session inspection and sign-out"),
    (name = "Bookmarks", description = "Bookmark CRUD and change stream"),
  )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
  fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
    if let Some(components) = openapi.components.as_mut() {
      components.add_security_scheme(
        "bearer_auth",
        utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
          utoipa::openapi::security::HttpAuthScheme::Bearer,
        )),
      );
      components.add_security_scheme(
        "cookie_auth",
        utoipa::openapi::security::SecurityScheme::ApiKey(
          utoipa::openapi::security::ApiKey::Cookie(
            utoipa::openapi::security::ApiKeyValue::new("linkshelf_session"),
          ),
        ),
      );
    }
  }
}

fn cors_layer(origin: &str) -> CorsLayer {
  let layer = CorsLayer::new()
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::PUT,
      Method::DELETE,
      Method::OPTIONS,
    ])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    .allow_credentials(true)
    .expose_headers([header::CONTENT_TYPE]);

  match origin.parse::<HeaderValue>() {
    Ok(value) => layer.allow_origin(AllowOrigin::exact(value)),
    Err(_) => {
      tracing::warn!("Invalid CORS_ORIGIN {:?}, cross-origin requests disabled", origin);
      layer
    }
  }
}

pub fn build_router(state: Arc<AppState>) -> Router {
  let protected = Router::new()
    .route(
      "/api/v1/bookmarks",
      get(api::bookmarks::list_bookmarks).post(api::bookmarks::create_bookmark),
    )
    .route("/api/v1/bookmarks/stream", get(api::bookmarks::stream_bookmarks))
    .route(
      "/api/v1/bookmarks/:id",
      put(api::bookmarks::update_bookmark).delete(api::bookmarks::delete_bookmark),
    )
    .route_layer(middleware::from_fn_with_state(
      state.clone(),
      api::auth::middleware::require_session,
    ));

  Router::new()
    .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
    .route("/health", get(api::health))
    // Pages
    .route("/", get(api::views::home))
    .route("/bookmarks", post(api::views::add_bookmark_form))
    .route("/bookmarks/:id/delete", post(api::views::delete_bookmark_form))
    // OAuth redirect flow
    .route("/auth/login", get(api::auth::login))
    .route("/auth/callback", get(api::auth::callback))
    .route("/auth/signout", post(api::auth::signout_form))
    // JSON auth endpoints
    .route("/api/v1/auth/session", get(api::auth::session))
    .route("/api/v1/auth/me", get(api::auth::me))
    .route("/api/v1/auth/signout", post(api::auth::signout))
    .merge(protected)
    .layer(DefaultBodyLimit::max(64 * 1024))
    .layer(TraceLayer::new_for_http())
    .layer(cors_layer(&state.config.cors_origin))
    .with_state(state)
}
