//! Row change feed for the `bookmarks` table.
//!
//! A database trigger publishes every insert, update and delete on the
//! `bookmark_changes` channel. [`run_change_listener`] relays those
//! notifications onto a [`ChangeBus`], and each SSE subscriber filters the bus
//! down to its own user's rows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::db::Bookmark;

pub const CHANGE_CHANNEL: &str = "bookmark_changes";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
  Insert,
  Update,
  Delete,
}

/// One row change, shaped like `{"eventType": "INSERT", "new": {..}, "old": null}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookmarkChange {
  #[serde(rename = "eventType", alias = "type")]
  pub event_type: ChangeType,
  #[serde(default)]
  pub new: Option<Bookmark>,
  #[serde(default)]
  pub old: Option<Bookmark>,
}

impl BookmarkChange {
  /// Decode a trigger payload
  pub fn from_notification(payload: &str) -> anyhow::Result<Self> {
    let change: Self = serde_json::from_str(payload)?;
    match change.event_type {
      ChangeType::Insert | ChangeType::Update if change.new.is_none() => {
        anyhow::bail!("{:?} notification without a new row", change.event_type)
      }
      ChangeType::Delete if change.old.is_none() => {
        anyhow::bail!("DELETE notification without an old row")
      }
      _ => Ok(change),
    }
  }

  /// Owner of the affected row
  pub fn user_id(&self) -> Option<&str> {
    self
      .new
      .as_ref()
      .or(self.old.as_ref())
      .map(|b| b.user_id.as_str())
  }

  pub fn is_visible_to(&self, user_id: &str) -> bool {
    self.user_id() == Some(user_id)
  }
}

#[derive(Debug, Clone)]
pub struct ChangeFrame {
  pub sequence: u64,
  pub change: BookmarkChange,
}

pub struct ChangeBus {
  tx: broadcast::Sender<ChangeFrame>,
  sequence: AtomicU64,
}

impl ChangeBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    Self {
      tx,
      sequence: AtomicU64::new(0),
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ChangeFrame> {
    self.tx.subscribe()
  }

  pub fn receiver_count(&self) -> usize {
    self.tx.receiver_count()
  }

  pub fn publish(&self, change: BookmarkChange) -> ChangeFrame {
    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
    let frame = ChangeFrame { sequence, change };
    // No subscribers is not an error
    let _ = self.tx.send(frame.clone());
    frame
  }
}

impl Default for ChangeBus {
  fn default() -> Self {
    Self::new(1024)
  }
}

/// Reconnect delay for the change listener: 1s doubling up to 30s, back to
/// 1s whenever a LISTEN succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  current: Duration,
}

impl Backoff {
  const INITIAL: Duration = Duration::from_secs(1);

  pub fn new() -> Self {
    Self {
      current: Self::INITIAL,
    }
  }

  /// Delay to wait now; the following call returns twice as much
  pub fn next_delay(&mut self) -> Duration {
    let delay = self.current;
    self.current = (self.current * 2).min(MAX_BACKOFF);
    delay
  }

  pub fn reset(&mut self) {
    self.current = Self::INITIAL;
  }
}

impl Default for Backoff {
  fn default() -> Self {
    Self::new()
  }
}

/// Relay database notifications onto the bus until the process exits.
/// The listener reconnects with exponential backoff when the connection drops.
pub async fn run_change_listener(pool: PgPool, bus: std::sync::Arc<ChangeBus>) {
  let mut backoff = Backoff::new();

  loop {
    let result = listen_once(&pool, &bus, &mut backoff).await;
    let delay = backoff.next_delay();
    match result {
      Ok(()) => {
        tracing::warn!(
          retry_in_secs = delay.as_secs(),
          "Change listener stream ended, reconnecting"
        );
      }
      Err(e) => {
        tracing::error!(
          error = %e,
          retry_in_secs = delay.as_secs(),
          "Change listener failed"
        );
      }
    }

    tokio::time::sleep(delay).await;
  }
}

async fn listen_once(pool: &PgPool, bus: &ChangeBus, backoff: &mut Backoff) -> anyhow::Result<()> {
  let mut listener = PgListener::connect_with(pool).await?;
  listener.listen(CHANGE_CHANNEL).await?;
  backoff.reset();
  tracing::info!(channel = CHANGE_CHANNEL, "Listening for bookmark changes");

  while let Some(notification) = listener.try_recv().await? {
    match BookmarkChange::from_notification(notification.payload()) {
      Ok(change) => {
        let frame = bus.publish(change);
        tracing::debug!(
          sequence = frame.sequence,
          event_type = ?frame.change.event_type,
          subscribers = bus.receiver_count(),
          "Published bookmark change"
        );
      }
      Err(e) => {
        tracing::warn!(error = %e, "Ignoring malformed change notification");
      }
    }
  }

  Ok(())
}
