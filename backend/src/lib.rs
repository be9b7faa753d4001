pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod realtime;
pub mod router;

use std::sync::Arc;

pub use config::AppConfig;
pub use db::Database;
pub use realtime::ChangeBus;

pub struct AppState {
  pub db: Database,
  pub config: AppConfig,
  pub changes: Arc<ChangeBus>,
  /// Shared client for calls to the OAuth provider
  pub http: reqwest::Client,
}

impl AppState {
  pub fn new(db: Database, config: AppConfig, changes: Arc<ChangeBus>) -> anyhow::Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("linkshelf/", env!("CARGO_PKG_VERSION")))
      .timeout(std::time::Duration::from_secs(15))
      .connect_timeout(std::time::Duration::from_secs(5))
      .build()?;

    Ok(Self {
      db,
      config,
      changes,
      http,
    })
  }
}
