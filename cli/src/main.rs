mod client;
mod commands;
mod config;
mod list;
mod sse;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "linkshelf")]
#[command(about = "Linkshelf - your bookmarks from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a session token (copy it from the web app's session cookie)
    Login {
        /// Session token issued by the server after OAuth sign-in
        #[arg(long)]
        token: String,
        /// Server URL, e.g. http://127.0.0.1:8080
        #[arg(long)]
        server: Option<String>,
    },
    /// Forget the saved session token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List bookmarks, newest first
    List,
    /// Add a bookmark
    Add {
        url: String,
        title: String,
    },
    /// Delete a bookmark by ID
    Rm {
        id: String,
    },
    /// Print bookmarks and follow live changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { token, server } => commands::auth::login(&token, server.as_deref()).await,
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami => commands::auth::whoami().await,
        Commands::List => commands::bookmarks::list().await,
        Commands::Add { url, title } => commands::bookmarks::add(&url, &title).await,
        Commands::Rm { id } => commands::bookmarks::remove(&id).await,
        Commands::Watch => commands::watch::run().await,
    }
}
