// Bookmark database operations
//
// Every statement is filtered by user_id: a caller can only ever see or touch
// rows it owns.
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::db::{models::Bookmark, Database};

impl Database {
    pub async fn list_bookmarks(&self, user_id: &str) -> anyhow::Result<Vec<Bookmark>> {
        let bookmarks = sqlx::query_as::<_, Bookmark>(
            "SELECT id, user_id, url, title, created_at
       FROM bookmarks
       WHERE user_id = $1
       ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookmarks)
    }

    pub async fn get_bookmark(
        &self,
        user_id: &str,
        id: &Uuid,
    ) -> anyhow::Result<Option<Bookmark>> {
        let bookmark = sqlx::query_as::<_, Bookmark>(
            "SELECT id, user_id, url, title, created_at
       FROM bookmarks
       WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bookmark)
    }

    pub async fn create_bookmark(
        &self,
        user_id: &str,
        url: &str,
        title: &str,
    ) -> anyhow::Result<Bookmark> {
        let bookmark = sqlx::query_as::<_, Bookmark>(
            "INSERT INTO bookmarks (id, user_id, url, title, created_at)
       VALUES (gen_random_uuid(), $1, $2, $3, NOW())
       RETURNING id, user_id, url, title, created_at",
        )
        .bind(user_id)
        .bind(url)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(bookmark)
    }

    /// Returns `None` when the bookmark does not exist or belongs to another user.
    pub async fn update_bookmark(
        &self,
        user_id: &str,
        id: &Uuid,
        url: Option<&str>,
        title: Option<&str>,
    ) -> anyhow::Result<Option<Bookmark>> {
        if url.is_none() && title.is_none() {
            return self.get_bookmark(user_id, id).await;
        }

        let mut query = QueryBuilder::new("UPDATE bookmarks SET ");
        let mut fields = query.separated(", ");
        if let Some(url_val) = url {
            fields.push("url = ").push_bind_unseparated(url_val);
        }
        if let Some(title_val) = title {
            fields.push("title = ").push_bind_unseparated(title_val);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(" AND user_id = ").push_bind(user_id);
        query.push(" RETURNING id, user_id, url, title, created_at");

        let bookmark = query
            .build_query_as::<Bookmark>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(bookmark)
    }

    /// Returns `false` when nothing owned by `user_id` matched.
    pub async fn delete_bookmark(&self, user_id: &str, id: &Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
