use anyhow::Result;
use colored::Colorize;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;

use crate::client::{self, BookmarkChange, BookmarksClient};
use crate::commands::bookmarks::print_list;
use crate::list::{Applied, BookmarkList};
use crate::sse::{SseEvent, SseParser};

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Print the list, then follow live changes until Ctrl-C
pub async fn run() -> Result<()> {
    let client = client::create_client()?;
    let mut list = BookmarkList::new(client.list_bookmarks().await?);
    print_list(&list);

    watch_until(&client, &mut list, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;
    println!();
    Ok(())
}

/// Follow the change stream, reconnecting with backoff, until `shutdown`
/// completes. Shutdown also interrupts the reconnect delay and refetch.
async fn watch_until<F>(client: &BookmarksClient, list: &mut BookmarkList, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = follow_with_reconnect(client, list) => {}
        _ = shutdown => {}
    }
}

async fn follow_with_reconnect(client: &BookmarksClient, list: &mut BookmarkList) {
    let mut delay = Duration::from_secs(1);
    loop {
        match follow(client, list).await {
            Ok(()) => tracing::warn!("Change stream closed by server"),
            Err(e) => tracing::warn!("Change stream failed: {:#}", e),
        }

        println!(
            "{}",
            format!("Reconnecting in {}s...", delay.as_secs()).dimmed()
        );
        tokio::time::sleep(delay).await;
        delay = next_delay(delay);

        // Changes made while disconnected are picked up by a fresh fetch
        match client.list_bookmarks().await {
            Ok(items) => {
                list.replace_all(items);
                delay = Duration::from_secs(1);
                print_list(list);
            }
            Err(e) => tracing::warn!("Failed to refresh bookmarks: {:#}", e),
        }
    }
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RECONNECT_DELAY)
}

async fn follow(client: &BookmarksClient, list: &mut BookmarkList) -> Result<()> {
    let stream = client.stream_changes().await?;
    tokio::pin!(stream);

    let mut parser = SseParser::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for event in parser.push(&chunk) {
            handle_event(&event, list);
        }
    }

    Ok(())
}

fn handle_event(event: &SseEvent, list: &mut BookmarkList) {
    match event.event.as_str() {
        "ready" => println!("{}", "Watching for changes (Ctrl-C to stop)".dimmed()),
        "bookmark" => {
            let change: BookmarkChange = match serde_json::from_str(&event.data) {
                Ok(change) => change,
                Err(e) => {
                    tracing::debug!(id = ?event.id, "Ignoring malformed change: {}", e);
                    return;
                }
            };
            if let Some(line) = describe(list.apply(&change), &change) {
                let timestamp = chrono::Local::now().format("%H:%M:%S");
                println!(
                    "{} {}  {}",
                    format!("[{}]", timestamp).dimmed(),
                    line,
                    list.summary().dimmed()
                );
            }
        }
        other => tracing::debug!("Ignoring stream event '{}'", other),
    }
}

fn describe(applied: Applied, change: &BookmarkChange) -> Option<String> {
    let line = match applied {
        Applied::Added => {
            let new = change.new.as_ref()?;
            format!("{} {} {}", "+".green(), new.title.bold(), new.url.blue())
        }
        Applied::Replaced => {
            let new = change.new.as_ref()?;
            format!("{} {} {}", "~".yellow(), new.title.bold(), new.url.blue())
        }
        Applied::Removed => {
            let old = change.old.as_ref()?;
            format!("{} {}", "-".red(), old.title.strikethrough())
        }
        Applied::Ignored => return None,
    };
    Some(line)
}
