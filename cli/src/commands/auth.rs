use anyhow::Result;
use colored::Colorize;

use crate::client::{self, BookmarksClient};
use crate::config::CliConfig;

/// Verify a session token against the server and remember it
pub async fn login(token: &str, server: Option<&str>) -> Result<()> {
    let mut config = CliConfig::load()?.unwrap_or_default();
    if let Some(server) = server {
        config.server_url = CliConfig::parse_server_url(server)?;
    }

    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Token must not be empty");
    }

    let client = BookmarksClient::new(&config.server_url, token)?;
    let user = client.me().await?;

    config.session_token = Some(token.to_string());
    config.save()?;

    println!(
        "{} Signed in to {} as {}",
        "✓".green(),
        client.base_url(),
        user.email.bold()
    );
    Ok(())
}

pub async fn logout() -> Result<()> {
    let Some(mut config) = CliConfig::load()? else {
        println!("Not signed in.");
        return Ok(());
    };
    let Some(token) = config.session_token.take() else {
        println!("Not signed in.");
        return Ok(());
    };

    // The token is forgotten locally even if the server is unreachable
    match BookmarksClient::new(&config.server_url, &token) {
        Ok(client) => {
            if let Err(e) = client.signout().await {
                tracing::warn!("Server sign-out failed: {:#}", e);
            }
        }
        Err(e) => tracing::warn!("Server sign-out skipped: {:#}", e),
    }

    config.save()?;
    println!("{} Signed out", "✓".green());
    Ok(())
}

pub async fn whoami() -> Result<()> {
    let client = client::create_client()?;
    let user = client.me().await?;

    println!("{}", user.email.bold());
    if !user.display_name.is_empty() {
        println!("  Name:     {}", user.display_name);
    }
    if let Some(provider) = user.auth_provider.as_deref() {
        println!("  Provider: {}", provider);
    }
    println!("  User ID:  {}", user.id.dimmed());
    println!("  Server:   {}", client.base_url());
    Ok(())
}
