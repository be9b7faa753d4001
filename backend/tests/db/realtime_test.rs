// Integration tests for the trigger -> LISTEN -> ChangeBus path
use std::sync::Arc;
use std::time::Duration;

use linkshelf_backend::api::bookmarks::validate::{MAX_TITLE_BYTES, MAX_URL_BYTES};
use linkshelf_backend::realtime::{run_change_listener, ChangeFrame, ChangeType};
use linkshelf_backend::ChangeBus;
use tokio::sync::broadcast;

use crate::common::{create_test_user, setup_test_db};

/// Next frame for `user_id`, skipping changes made by concurrently running tests
async fn next_for_user(rx: &mut broadcast::Receiver<ChangeFrame>, user_id: &str) -> ChangeFrame {
  tokio::time::timeout(Duration::from_secs(10), async {
    loop {
      let frame = rx.recv().await.expect("change bus closed");
      if frame.change.is_visible_to(user_id) {
        return frame;
      }
    }
  })
  .await
  .expect("timed out waiting for bookmark change")
}

#[tokio::test]
async fn test_row_changes_reach_the_bus() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;

  let bus = Arc::new(ChangeBus::new(256));
  let mut rx = bus.subscribe();
  let listener = tokio::spawn(run_change_listener(db.pool.clone(), bus.clone()));

  // Give the listener time to issue LISTEN before the first write
  tokio::time::sleep(Duration::from_millis(500)).await;

  let bookmark = db
    .create_bookmark(&user.id, "https://live.example.com", "Live")
    .await
    .expect("Failed to create bookmark");
  let inserted = next_for_user(&mut rx, &user.id).await;
  assert_eq!(inserted.change.event_type, ChangeType::Insert);
  assert_eq!(inserted.change.new.as_ref(), Some(&bookmark));
  assert!(inserted.change.old.is_none());

  db.update_bookmark(&user.id, &bookmark.id, None, Some("Renamed"))
    .await
    .expect("Failed to update bookmark");
  let updated = next_for_user(&mut rx, &user.id).await;
  assert_eq!(updated.change.event_type, ChangeType::Update);
  assert_eq!(updated.change.new.as_ref().map(|b| b.title.as_str()), Some("Renamed"));
  assert!(updated.sequence > inserted.sequence);

  db.delete_bookmark(&user.id, &bookmark.id)
    .await
    .expect("Failed to delete bookmark");
  let deleted = next_for_user(&mut rx, &user.id).await;
  assert_eq!(deleted.change.event_type, ChangeType::Delete);
  assert_eq!(deleted.change.old.as_ref().map(|b| b.id), Some(bookmark.id));
  assert!(deleted.change.new.is_none());

  listener.abort();
}

#[tokio::test]
async fn test_largest_allowed_bookmark_can_be_renamed_and_deleted() {
  let Some(db) = setup_test_db().await else {
    return;
  };
  let user = create_test_user(&db).await;

  let bus = Arc::new(ChangeBus::new(256));
  let mut rx = bus.subscribe();
  let listener = tokio::spawn(run_change_listener(db.pool.clone(), bus.clone()));
  tokio::time::sleep(Duration::from_millis(500)).await;

  // Quotes and backslashes double in size once escaped into the payload
  let prefix = "https://example.com/?q=";
  let url = format!("{prefix}{}", "\"".repeat(MAX_URL_BYTES - prefix.len()));
  let title = "\"".repeat(MAX_TITLE_BYTES);
  let bookmark = db
    .create_bookmark(&user.id, &url, &title)
    .await
    .expect("Failed to create largest bookmark");
  let inserted = next_for_user(&mut rx, &user.id).await;
  assert_eq!(inserted.change.new.as_ref().map(|b| b.url.len()), Some(MAX_URL_BYTES));

  let renamed = "\\".repeat(MAX_TITLE_BYTES);
  db.update_bookmark(&user.id, &bookmark.id, None, Some(&renamed))
    .await
    .expect("Failed to rename largest bookmark");
  let updated = next_for_user(&mut rx, &user.id).await;
  assert_eq!(updated.change.event_type, ChangeType::Update);
  assert_eq!(updated.change.new.as_ref().map(|b| b.title.as_str()), Some(renamed.as_str()));
  assert!(updated.change.old.is_none());

  assert!(db
    .delete_bookmark(&user.id, &bookmark.id)
    .await
    .expect("Failed to delete largest bookmark"));
  let deleted = next_for_user(&mut rx, &user.id).await;
  assert_eq!(deleted.change.event_type, ChangeType::Delete);
  assert_eq!(deleted.change.old.map(|b| b.title), Some(renamed));

  listener.abort();
}
