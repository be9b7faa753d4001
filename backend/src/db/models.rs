use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
  pub id: String,
  pub email: String,
  pub display_name: String,
  pub auth_provider: Option<String>,
  pub external_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A single saved link. This is also the row shape carried by change
/// notifications, so it must stay in sync with the `bookmarks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Bookmark {
  pub id: Uuid,
  pub user_id: String,
  pub url: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
}
