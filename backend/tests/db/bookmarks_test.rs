// Integration tests for bookmark database operations
use crate::common::{create_test_user, setup_test_db};
use linkshelf_backend::api::bookmarks::validate::{MAX_TITLE_BYTES, MAX_URL_BYTES};
use uuid::Uuid;

#[tokio::test]
async fn test_bookmarks_listed_newest_first() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;

  let first = db
    .create_bookmark(&user.id, "https://first.example.com", "First")
    .await
    .expect("Failed to create bookmark");
  let second = db
    .create_bookmark(&user.id, "https://second.example.com", "Second")
    .await
    .expect("Failed to create bookmark");

  let bookmarks = db
    .list_bookmarks(&user.id)
    .await
    .expect("Failed to list bookmarks");

  assert_eq!(bookmarks.len(), 2);
  assert_eq!(bookmarks[0].id, second.id);
  assert_eq!(bookmarks[1].id, first.id);
  assert!(bookmarks.iter().all(|b| b.user_id == user.id));
}

#[tokio::test]
async fn test_bookmarks_are_private_to_their_owner() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let owner = create_test_user(&db).await;
  let stranger = create_test_user(&db).await;

  let bookmark = db
    .create_bookmark(&owner.id, "https://private.example.com", "Private")
    .await
    .expect("Failed to create bookmark");

  assert!(db
    .list_bookmarks(&stranger.id)
    .await
    .expect("list")
    .is_empty());
  assert!(db
    .get_bookmark(&stranger.id, &bookmark.id)
    .await
    .expect("get")
    .is_none());
  assert!(db
    .update_bookmark(&stranger.id, &bookmark.id, None, Some("Hijacked"))
    .await
    .expect("update")
    .is_none());
  assert!(!db
    .delete_bookmark(&stranger.id, &bookmark.id)
    .await
    .expect("delete"));

  let still_there = db
    .get_bookmark(&owner.id, &bookmark.id)
    .await
    .expect("get")
    .expect("owner still sees bookmark");
  assert_eq!(still_there.title, "Private");
}

#[tokio::test]
async fn test_bookmark_update_and_delete() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;

  let bookmark = db
    .create_bookmark(&user.id, "https://old.example.com", "Old")
    .await
    .expect("Failed to create bookmark");

  let updated = db
    .update_bookmark(&user.id, &bookmark.id, Some("https://new.example.com"), None)
    .await
    .expect("Failed to update bookmark")
    .expect("bookmark exists");
  assert_eq!(updated.url, "https://new.example.com");
  assert_eq!(updated.title, "Old");
  assert_eq!(updated.created_at, bookmark.created_at);

  let unchanged = db
    .update_bookmark(&user.id, &bookmark.id, None, None)
    .await
    .expect("noop update")
    .expect("bookmark exists");
  assert_eq!(unchanged, updated);

  assert!(db
    .delete_bookmark(&user.id, &bookmark.id)
    .await
    .expect("Failed to delete bookmark"));
  assert!(!db
    .delete_bookmark(&user.id, &bookmark.id)
    .await
    .expect("second delete"));
  assert!(!db
    .delete_bookmark(&user.id, &Uuid::new_v4())
    .await
    .expect("unknown delete"));
}

#[tokio::test]
async fn test_oversized_fields_are_rejected_by_the_database() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;

  let long_url = format!("https://example.com/{}", "a".repeat(MAX_URL_BYTES));
  assert!(db.create_bookmark(&user.id, &long_url, "Long").await.is_err());

  let long_title = "é".repeat(MAX_TITLE_BYTES / 2 + 1);
  assert!(db
    .create_bookmark(&user.id, "https://example.com", &long_title)
    .await
    .is_err());

  let bookmark = db
    .create_bookmark(&user.id, "https://example.com", "Short")
    .await
    .expect("Failed to create bookmark");
  assert!(db
    .update_bookmark(&user.id, &bookmark.id, None, Some("tab\there"))
    .await
    .is_err());

  let bookmarks = db.list_bookmarks(&user.id).await.expect("Failed to list bookmarks");
  assert_eq!(bookmarks.len(), 1);
  assert_eq!(bookmarks[0].title, "Short");
}
