use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::CliConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BookmarksClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

// --- Response types ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// One row change from the live stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookmarkChange {
    #[serde(rename = "eventType")]
    pub event_type: ChangeType,
    #[serde(default)]
    pub new: Option<Bookmark>,
    #[serde(default)]
    pub old: Option<Bookmark>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub auth_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookmarksResponse {
    bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Serialize)]
struct CreateBookmarkRequest<'a> {
    url: &'a str,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Turn a non-success response into an error carrying the server's message
async fn check(resp: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    if status == reqwest::StatusCode::UNAUTHORIZED {
        anyhow::bail!(
            "{}: {} (session expired? run 'linkshelf login --token <token>')",
            action,
            message
        );
    }
    anyhow::bail!("{}: {} {}", action, status, message)
}

impl BookmarksClient {
    pub fn new(server_url: &str, token: &str) -> Result<Self> {
        // No overall timeout here, the change stream stays open indefinitely
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    // --- Auth ---

    pub async fn me(&self) -> Result<UserInfo> {
        let resp = self
            .get("/api/v1/auth/me")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to server")?;

        check(resp, "Failed to load user")
            .await?
            .json()
            .await
            .context("Failed to parse user response")
    }

    pub async fn signout(&self) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/api/v1/auth/signout", self.base_url))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to server")?;

        check(resp, "Failed to sign out").await?;
        Ok(())
    }

    // --- Bookmarks ---

    pub async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let resp = self
            .get("/api/v1/bookmarks")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to server")?;

        let body: BookmarksResponse = check(resp, "Failed to list bookmarks")
            .await?
            .json()
            .await
            .context("Failed to parse bookmarks response")?;
        Ok(body.bookmarks)
    }

    pub async fn add_bookmark(&self, url: &str, title: &str) -> Result<Bookmark> {
        let resp = self
            .client
            .post(format!("{}/api/v1/bookmarks", self.base_url))
            .bearer_auth(&self.token)
            .json(&CreateBookmarkRequest { url, title })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to server")?;

        check(resp, "Failed to add bookmark")
            .await?
            .json()
            .await
            .context("Failed to parse bookmark response")
    }

    pub async fn delete_bookmark(&self, id: &Uuid) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}/api/v1/bookmarks/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to connect to server")?;

        check(resp, &format!("Failed to delete bookmark '{}'", id)).await?;
        Ok(())
    }

    /// Open the server-sent change stream
    pub async fn stream_changes(
        &self,
    ) -> Result<impl Stream<Item = Result<bytes::Bytes, reqwest::Error>>> {
        let resp = self
            .get("/api/v1/bookmarks/stream")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .context("Failed to connect to server for change stream")?;

        Ok(check(resp, "Failed to open change stream")
            .await?
            .bytes_stream())
    }
}

/// Load config and create client, with user-friendly error message
pub fn create_client() -> Result<BookmarksClient> {
    let config = CliConfig::load()?
        .context("Not signed in. Run 'linkshelf login --token <token>' first.")?;
    let token = config
        .session_token
        .as_deref()
        .context("Not signed in. Run 'linkshelf login --token <token>' first.")?;
    BookmarksClient::new(&config.server_url, token)
}
