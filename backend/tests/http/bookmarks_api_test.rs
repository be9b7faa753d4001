// Authenticated bookmark API tests against a real database
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use futures::StreamExt;
use tower::ServiceExt;
use uuid::Uuid;

use linkshelf_backend::realtime::{BookmarkChange, ChangeType};
use linkshelf_backend::{db::Bookmark, router::build_router, AppState};

use crate::common::{
  create_test_user, read_only_db, session_token_for, setup_test_db, test_state,
};

async fn call(
  state: &Arc<AppState>,
  method: &str,
  uri: &str,
  token: &str,
  json: Option<serde_json::Value>,
) -> Response<Body> {
  let mut builder = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::AUTHORIZATION, format!("Bearer {token}"));
  let body = match json {
    Some(value) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(value.to_string())
    }
    None => Body::empty(),
  };

  build_router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .expect("router response")
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
  let bytes = to_bytes(response.into_body(), usize::MAX)
    .await
    .expect("read body");
  serde_json::from_slice(&bytes).expect("JSON body")
}

#[tokio::test]
async fn test_bookmark_crud_over_http() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = call(
    &state,
    "POST",
    "/api/v1/bookmarks",
    &token,
    Some(serde_json::json!({"url": "  https://rust-lang.org  ", "title": " Rust "})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  let created: Bookmark = serde_json::from_value(json_body(response).await).unwrap();
  assert_eq!(created.url, "https://rust-lang.org");
  assert_eq!(created.title, "Rust");
  assert_eq!(created.user_id, user.id);

  let response = call(&state, "GET", "/api/v1/bookmarks", &token, None).await;
  assert_eq!(response.status(), StatusCode::OK);
  let listed = json_body(response).await;
  assert_eq!(listed["bookmarks"].as_array().map(Vec::len), Some(1));
  assert_eq!(listed["bookmarks"][0]["id"], created.id.to_string());

  let response = call(
    &state,
    "PUT",
    &format!("/api/v1/bookmarks/{}", created.id),
    &token,
    Some(serde_json::json!({"title": "The Rust Language"})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let updated = json_body(response).await;
  assert_eq!(updated["title"], "The Rust Language");
  assert_eq!(updated["url"], "https://rust-lang.org");

  let uri = format!("/api/v1/bookmarks/{}", created.id);
  let response = call(&state, "DELETE", &uri, &token, None).await;
  assert_eq!(response.status(), StatusCode::NO_CONTENT);
  let response = call(&state, "DELETE", &uri, &token, None).await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = call(
    &state,
    "POST",
    "/api/v1/bookmarks",
    &token,
    Some(serde_json::json!({"url": "https://example.com", "title": "   "})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let error = json_body(response).await;
  assert_eq!(error["error"], "Please fill in both URL and title");
  assert_eq!(error["error_type"], "VALIDATION_ERROR");

  let response = call(
    &state,
    "POST",
    "/api/v1/bookmarks",
    &token,
    Some(serde_json::json!({"url": "not a url", "title": "Broken"})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(json_body(response).await["error_type"], "INVALID_URL");

  // Rejected up front instead of failing inside the change trigger
  let long_url = format!("https://example.com/?q={}", "a".repeat(8000));
  let response = call(
    &state,
    "POST",
    "/api/v1/bookmarks",
    &token,
    Some(serde_json::json!({"url": long_url, "title": "Long"})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let error = json_body(response).await;
  assert_eq!(error["error_type"], "TOO_LONG");
  assert_eq!(error["error"], "URL or title is too long");

  let response = call(&state, "DELETE", "/api/v1/bookmarks/not-a-uuid", &token, None).await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let response = call(&state, "GET", "/api/v1/bookmarks", &token, None).await;
  assert_eq!(json_body(response).await["bookmarks"], serde_json::json!([]));
}

#[tokio::test]
async fn test_other_users_bookmarks_are_not_found() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let owner = create_test_user(&db).await;
  let stranger = create_test_user(&db).await;
  let bookmark = db
    .create_bookmark(&owner.id, "https://owner.example.com", "Owner")
    .await
    .expect("Failed to create bookmark");
  let state = test_state(db);
  let token = session_token_for(&state, &stranger);

  let uri = format!("/api/v1/bookmarks/{}", bookmark.id);
  let response = call(
    &state,
    "PUT",
    &uri,
    &token,
    Some(serde_json::json!({"title": "Mine now"})),
  )
  .await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let response = call(&state, "DELETE", &uri, &token, None).await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let response = call(&state, "GET", "/api/v1/bookmarks", &token, None).await;
  assert_eq!(json_body(response).await["bookmarks"], serde_json::json!([]));
}

#[tokio::test]
async fn test_session_endpoints_with_valid_token() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = call(&state, "GET", "/api/v1/auth/session", &token, None).await;
  assert_eq!(response.status(), StatusCode::OK);
  let session = json_body(response).await;
  assert_eq!(session["session"]["user"]["id"], user.id);
  assert_eq!(session["session"]["user"]["email"], user.email);
  assert!(session["session"]["expires_at"].is_string());

  let response = call(&state, "GET", "/api/v1/auth/me", &token, None).await;
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(json_body(response).await["display_name"], "Test User");
}

#[tokio::test]
async fn test_home_page_lists_bookmarks_for_session_cookie() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  db.create_bookmark(&user.id, "https://docs.rs", "Docs <rs>")
    .await
    .expect("Failed to create bookmark");
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = build_router(state.clone())
    .oneshot(
      Request::builder()
        .uri("/")
        .header(header::COOKIE, format!("linkshelf_session={token}"))
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let html = String::from_utf8(
    to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap()
      .to_vec(),
  )
  .unwrap();
  assert!(html.contains(&format!("Logged in as {}", user.email)));
  assert!(html.contains("Docs &lt;rs&gt;"));
  assert!(html.contains("1 bookmark saved"));
  assert!(!html.contains("Sign in with"));
}

/// Submit an HTML form the way a browser does, with the session cookie
async fn post_form(
  state: &Arc<AppState>,
  uri: &str,
  token: &str,
  fields: &[(&str, &str)],
) -> Response<Body> {
  let body = url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(fields)
    .finish();

  build_router(state.clone())
    .oneshot(
      Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, format!("linkshelf_session={token}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap(),
    )
    .await
    .expect("router response")
}

fn redirect_target(response: &Response<Body>) -> &str {
  assert_eq!(response.status(), StatusCode::SEE_OTHER);
  response
    .headers()
    .get(header::LOCATION)
    .and_then(|v| v.to_str().ok())
    .expect("Location header")
}

#[tokio::test]
async fn test_add_form_redirects_with_outcome() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = post_form(
    &state,
    "/bookmarks",
    &token,
    &[("title", " Tokio "), ("url", "https://tokio.rs/?a=1&b=2")],
  )
  .await;
  assert_eq!(redirect_target(&response), "/");

  let saved = state.db.list_bookmarks(&user.id).await.expect("Failed to list bookmarks");
  assert_eq!(saved.len(), 1);
  assert_eq!(saved[0].title, "Tokio");
  assert_eq!(saved[0].url, "https://tokio.rs/?a=1&b=2");

  let response = post_form(&state, "/bookmarks", &token, &[("title", "  "), ("url", "https://x.dev")]).await;
  assert_eq!(redirect_target(&response), "/?error=missing_fields");

  let response = post_form(&state, "/bookmarks", &token, &[("title", "Nope"), ("url", "not a url")]).await;
  assert_eq!(redirect_target(&response), "/?error=invalid_url");

  let long_title = "t".repeat(5000);
  let response = post_form(
    &state,
    "/bookmarks",
    &token,
    &[("title", long_title.as_str()), ("url", "https://x.dev")],
  )
  .await;
  assert_eq!(redirect_target(&response), "/?error=too_long");

  let saved = state.db.list_bookmarks(&user.id).await.expect("Failed to list bookmarks");
  assert_eq!(saved.len(), 1);
}

#[tokio::test]
async fn test_delete_form_only_removes_own_rows() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let owner = create_test_user(&db).await;
  let stranger = create_test_user(&db).await;
  let mine = db
    .create_bookmark(&owner.id, "https://mine.example.com", "Mine")
    .await
    .expect("Failed to create bookmark");
  let theirs = db
    .create_bookmark(&stranger.id, "https://theirs.example.com", "Theirs")
    .await
    .expect("Failed to create bookmark");
  let state = test_state(db);
  let token = session_token_for(&state, &owner);

  let response = post_form(&state, &format!("/bookmarks/{}/delete", mine.id), &token, &[]).await;
  assert_eq!(redirect_target(&response), "/");
  assert!(state
    .db
    .list_bookmarks(&owner.id)
    .await
    .expect("Failed to list bookmarks")
    .is_empty());

  let response = post_form(&state, &format!("/bookmarks/{}/delete", theirs.id), &token, &[]).await;
  assert_eq!(redirect_target(&response), "/");
  let kept = state
    .db
    .list_bookmarks(&stranger.id)
    .await
    .expect("Failed to list bookmarks");
  assert_eq!(kept.iter().map(|b| b.id).collect::<Vec<_>>(), vec![theirs.id]);

  let response = post_form(&state, "/bookmarks/not-a-uuid/delete", &token, &[]).await;
  assert_eq!(redirect_target(&response), "/");
}

#[tokio::test]
async fn test_form_storage_failures_redirect_with_notice() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let Some(read_only) = read_only_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let existing = db
    .create_bookmark(&user.id, "https://kept.example.com", "Kept")
    .await
    .expect("Failed to create bookmark");
  // Sessions still resolve, but every write is refused
  let state = test_state(read_only);
  let token = session_token_for(&state, &user);

  let response = post_form(
    &state,
    "/bookmarks",
    &token,
    &[("title", "Lost"), ("url", "https://lost.example.com")],
  )
  .await;
  assert_eq!(redirect_target(&response), "/?error=add_failed");

  let response = post_form(&state, &format!("/bookmarks/{}/delete", existing.id), &token, &[]).await;
  assert_eq!(redirect_target(&response), "/?error=delete_failed");

  let kept = db.list_bookmarks(&user.id).await.expect("Failed to list bookmarks");
  assert_eq!(kept.iter().map(|b| b.id).collect::<Vec<_>>(), vec![existing.id]);
}

#[tokio::test]
async fn test_home_page_renders_form_notices() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  for (code, message) in [
    ("missing_fields", "Please fill in both URL and title"),
    ("add_failed", "Failed to add bookmark"),
    ("delete_failed", "Failed to delete bookmark"),
  ] {
    let response = build_router(state.clone())
      .oneshot(
        Request::builder()
          .uri(format!("/?error={code}"))
          .header(header::COOKIE, format!("linkshelf_session={token}"))
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(
      to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec(),
    )
    .unwrap();
    assert!(
      html.contains(&format!(r#"<p class="error" role="alert">{message}</p>"#)),
      "missing notice for {code}"
    );
  }
}

/// Append stream chunks to `received` until it contains `needle`
async fn read_until<S, E>(body: &mut S, received: &mut String, needle: &str)
where
  S: futures::Stream<Item = Result<axum::body::Bytes, E>> + Unpin,
  E: std::fmt::Debug,
{
  tokio::time::timeout(Duration::from_secs(5), async {
    while !received.contains(needle) {
      let chunk = body.next().await.expect("stream ended").expect("chunk");
      received.push_str(&String::from_utf8_lossy(&chunk));
    }
  })
  .await
  .expect("timed out reading event stream");
}

#[tokio::test]
async fn test_stream_delivers_only_own_changes() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;
  let state = test_state(db);
  let token = session_token_for(&state, &user);

  let response = call(&state, "GET", "/api/v1/bookmarks/stream", &token, None).await;
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(
    response.headers().get(header::CONTENT_TYPE).unwrap(),
    "text/event-stream"
  );
  let mut body = response.into_body().into_data_stream();

  let mut received = String::new();
  read_until(&mut body, &mut received, "event: ready").await;

  let bookmark_for = |user_id: &str| Bookmark {
    id: Uuid::new_v4(),
    user_id: user_id.to_string(),
    url: "https://example.com".to_string(),
    title: "Example".to_string(),
    created_at: chrono::Utc::now(),
  };
  let foreign = bookmark_for("someone-else");
  let own = bookmark_for(&user.id);

  state.changes.publish(BookmarkChange {
    event_type: ChangeType::Insert,
    new: Some(foreign.clone()),
    old: None,
  });
  state.changes.publish(BookmarkChange {
    event_type: ChangeType::Insert,
    new: Some(own.clone()),
    old: None,
  });

  let own_id = own.id.to_string();
  read_until(&mut body, &mut received, &own_id).await;
  assert!(received.contains("event: bookmark"));
  assert!(!received.contains(&foreign.id.to_string()));
  assert!(received.contains(r#""eventType":"INSERT""#));
}
