// User database operations
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::db::{models::User, Database};

const USER_COLUMNS: &str =
    "id, email, display_name, auth_provider, external_id, created_at, updated_at";

impl Database {
    pub async fn create_user(
        &self,
        id: &str,
        email: &str,
        display_name: &str,
        auth_provider: Option<&str>,
        external_id: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, display_name, auth_provider, external_id, updated_at)
       VALUES ($1, $2, $3, $4, $5, NOW())
       RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email.to_lowercase())
        .bind(display_name)
        .bind(auth_provider)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_external_id(
        &self,
        auth_provider: &str,
        external_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE auth_provider = $1 AND external_id = $2"
        ))
        .bind(auth_provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        id: &str,
        display_name: Option<&str>,
        auth_provider: Option<&str>,
        external_id: Option<&str>,
    ) -> anyhow::Result<User> {
        let mut query = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(dn_val) = display_name {
            query.push(", display_name = ").push_bind(dn_val);
        }
        if let Some(ap_val) = auth_provider {
            query.push(", auth_provider = ").push_bind(ap_val);
        }
        if let Some(ei_val) = external_id {
            query.push(", external_id = ").push_bind(ei_val);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {USER_COLUMNS}"));

        let user = query.build_query_as::<User>().fetch_one(&self.pool).await?;
        Ok(user)
    }

    /// Resolve the account for an identity returned by the OAuth provider.
    ///
    /// Lookup order is provider identity, then email. An account found by
    /// email adopts the provider identity if it has none yet. Otherwise a new
    /// account is created.
    pub async fn upsert_oauth_user(
        &self,
        auth_provider: &str,
        external_id: &str,
        email: &str,
        display_name: &str,
    ) -> anyhow::Result<User> {
        if let Some(user) = self
            .get_user_by_external_id(auth_provider, external_id)
            .await?
        {
            if user.display_name.is_empty() && !display_name.is_empty() {
                return self
                    .update_user(&user.id, Some(display_name), None, None)
                    .await;
            }
            return Ok(user);
        }

        if let Some(existing) = self.get_user_by_email(email).await? {
            let update_display_name = (existing.display_name.is_empty()
                && !display_name.is_empty())
            .then_some(display_name);
            let (update_provider, update_external_id) = if existing.auth_provider.is_none() {
                (Some(auth_provider), Some(external_id))
            } else {
                (None, None)
            };

            if update_display_name.is_none() && update_provider.is_none() {
                return Ok(existing);
            }

            return self
                .update_user(
                    &existing.id,
                    update_display_name,
                    update_provider,
                    update_external_id,
                )
                .await;
        }

        let user_id = Uuid::new_v4().to_string();
        self.create_user(
            &user_id,
            email,
            display_name,
            Some(auth_provider),
            Some(external_id),
        )
        .await
    }
}
