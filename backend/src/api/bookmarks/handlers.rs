use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::sse::{Event as SseEvent, KeepAlive, Sse},
  Extension, Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::validate::{self, InputError};
use crate::api::auth::middleware::AuthUser;
use crate::api::common::{api_error, internal_error, ApiError, ErrorResponse};
use crate::db::Bookmark;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookmarkRequest {
  pub url: String,
  pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookmarkRequest {
  pub url: Option<String>,
  pub title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookmarksResponse {
  pub bookmarks: Vec<Bookmark>,
}

fn invalid_input(err: InputError) -> ApiError {
  api_error(StatusCode::UNPROCESSABLE_ENTITY, err.message(), err.error_type())
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(id)
    .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid bookmark ID", "BAD_REQUEST"))
}

fn not_found() -> ApiError {
  api_error(StatusCode::NOT_FOUND, "Bookmark not found", "NOT_FOUND")
}

/// List the caller's bookmarks, newest first
#[utoipa::path(
  get,
  path = "/api/v1/bookmarks",
  tag = "Bookmarks",
  responses(
    (status = 200, description = "Bookmarks owned by the caller", body = BookmarksResponse),
    (status = 401, description = "Not authenticated", body = ErrorResponse),
    (status = 500, description = "Internal server error", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn list_bookmarks(
  State(state): State<Arc<AppState>>,
  Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<BookmarksResponse>, ApiError> {
  let bookmarks = state.db.list_bookmarks(&user.id).await.map_err(|e| {
    tracing::error!("Error fetching bookmarks for user {}: {}", user.id, e);
    internal_error("Failed to fetch bookmarks")
  })?;

  Ok(Json(BookmarksResponse { bookmarks }))
}

/// Save a new bookmark
#[utoipa::path(
  post,
  path = "/api/v1/bookmarks",
  tag = "Bookmarks",
  request_body = CreateBookmarkRequest,
  responses(
    (status = 201, description = "Bookmark created", body = Bookmark),
    (status = 401, description = "Not authenticated", body = ErrorResponse),
    (status = 422, description = "Missing field or invalid URL", body = ErrorResponse),
    (status = 500, description = "Internal server error", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn create_bookmark(
  State(state): State<Arc<AppState>>,
  Extension(AuthUser(user)): Extension<AuthUser>,
  Json(req): Json<CreateBookmarkRequest>,
) -> Result<(StatusCode, Json<Bookmark>), ApiError> {
  let (url, title) = validate::validate_new(&req.url, &req.title).map_err(invalid_input)?;

  let bookmark = state
    .db
    .create_bookmark(&user.id, &url, &title)
    .await
    .map_err(|e| {
      tracing::error!("Error adding bookmark for user {}: {}", user.id, e);
      internal_error("Failed to add bookmark")
    })?;

  tracing::info!(bookmark_id = %bookmark.id, user_id = %user.id, "Bookmark added");
  Ok((StatusCode::CREATED, Json(bookmark)))
}

/// Change the URL and/or title of a bookmark
#[utoipa::path(
  put,
  path = "/api/v1/bookmarks/{id}",
  tag = "Bookmarks",
  params(("id" = String, Path, description = "Bookmark ID")),
  request_body = UpdateBookmarkRequest,
  responses(
    (status = 200, description = "Bookmark updated", body = Bookmark),
    (status = 404, description = "No such bookmark", body = ErrorResponse),
    (status = 422, description = "Blank field or invalid URL", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn update_bookmark(
  State(state): State<Arc<AppState>>,
  Extension(AuthUser(user)): Extension<AuthUser>,
  Path(id): Path<String>,
  Json(req): Json<UpdateBookmarkRequest>,
) -> Result<Json<Bookmark>, ApiError> {
  let id = parse_id(&id)?;
  let url = req
    .url
    .as_deref()
    .map(validate::normalize_url)
    .transpose()
    .map_err(invalid_input)?;
  let title = req
    .title
    .as_deref()
    .map(validate::normalize_title)
    .transpose()
    .map_err(invalid_input)?;

  let bookmark = state
    .db
    .update_bookmark(&user.id, &id, url.as_deref(), title.as_deref())
    .await
    .map_err(|e| {
      tracing::error!("Error updating bookmark {}: {}", id, e);
      internal_error("Failed to update bookmark")
    })?
    .ok_or_else(not_found)?;

  Ok(Json(bookmark))
}

/// Delete a bookmark
#[utoipa::path(
  delete,
  path = "/api/v1/bookmarks/{id}",
  tag = "Bookmarks",
  params(("id" = String, Path, description = "Bookmark ID")),
  responses(
    (status = 204, description = "Bookmark deleted"),
    (status = 404, description = "No such bookmark", body = ErrorResponse),
    (status = 500, description = "Internal server error", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn delete_bookmark(
  State(state): State<Arc<AppState>>,
  Extension(AuthUser(user)): Extension<AuthUser>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  let id = parse_id(&id)?;

  let deleted = state.db.delete_bookmark(&user.id, &id).await.map_err(|e| {
    tracing::error!("Error deleting bookmark {}: {}", id, e);
    internal_error("Failed to delete bookmark")
  })?;

  if !deleted {
    return Err(not_found());
  }

  tracing::info!(bookmark_id = %id, user_id = %user.id, "Bookmark deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// Server-sent stream of changes to the caller's bookmarks.
///
/// The first event is `ready`; every following `bookmark` event carries a
/// `{"eventType", "new", "old"}` change with the bus sequence as its id.
#[utoipa::path(
  get,
  path = "/api/v1/bookmarks/stream",
  tag = "Bookmarks",
  responses(
    (status = 200, description = "text/event-stream of BookmarkChange", body = crate::realtime::BookmarkChange),
    (status = 401, description = "Not authenticated", body = ErrorResponse)
  ),
  security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn stream_bookmarks(
  State(state): State<Arc<AppState>>,
  Extension(AuthUser(user)): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::Error>>> {
  let user_id = user.id;
  let receiver = state.changes.subscribe();
  tracing::debug!(
    user_id = %user_id,
    subscribers = state.changes.receiver_count(),
    "Bookmark stream opened"
  );

  let ready = tokio_stream::once(Ok(SseEvent::default().event("ready").data("subscribed")));

  let changes = BroadcastStream::new(receiver).filter_map(move |item| match item {
    Ok(frame) if frame.change.is_visible_to(&user_id) => Some(
      SseEvent::default()
        .event("bookmark")
        .id(frame.sequence.to_string())
        .json_data(&frame.change),
    ),
    Ok(_) => None,
    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
      tracing::warn!(user_id = %user_id, skipped, "Bookmark stream lagged, changes dropped");
      None
    }
  });

  Sse::new(ready.chain(changes)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
