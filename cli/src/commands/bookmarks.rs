use anyhow::{Context, Result};
use colored::Colorize;
use uuid::Uuid;

use crate::client::{self, Bookmark};
use crate::list::BookmarkList;

/// "Added 2025-01-31 at 09:15:00 UTC"
pub fn added_label(bookmark: &Bookmark) -> String {
    format!(
        "Added {} at {}",
        bookmark.created_at.format("%Y-%m-%d"),
        bookmark.created_at.format("%H:%M:%S UTC")
    )
}

pub fn print_bookmark(bookmark: &Bookmark) {
    println!("{}", bookmark.title.bold());
    println!("  {}", bookmark.url.blue().underline());
    println!(
        "  {}  {}",
        added_label(bookmark).dimmed(),
        bookmark.id.to_string().dimmed()
    );
}

pub fn print_list(list: &BookmarkList) {
    if list.is_empty() {
        println!("No bookmarks yet!");
        println!("{}", "Add your first bookmark with 'linkshelf add <url> <title>'".dimmed());
        return;
    }

    println!("{}", list.summary().cyan());
    for bookmark in list.iter() {
        print_bookmark(bookmark);
    }
}

pub async fn list() -> Result<()> {
    let client = client::create_client()?;
    let list = BookmarkList::new(client.list_bookmarks().await?);
    print_list(&list);
    Ok(())
}

pub async fn add(url: &str, title: &str) -> Result<()> {
    if url.trim().is_empty() || title.trim().is_empty() {
        anyhow::bail!("Please fill in both URL and title");
    }

    let client = client::create_client()?;
    let bookmark = client.add_bookmark(url, title).await?;

    println!("{} Bookmark added", "✓".green());
    print_bookmark(&bookmark);
    Ok(())
}

pub async fn remove(id: &str) -> Result<()> {
    let id = Uuid::parse_str(id.trim()).with_context(|| format!("Invalid bookmark ID: {}", id))?;

    let client = client::create_client()?;
    client.delete_bookmark(&id).await?;

    println!("{} Deleted bookmark {}", "✓".green(), id);
    Ok(())
}
