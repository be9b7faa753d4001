//! Local copy of the bookmark list, kept current by applying stream changes.

use uuid::Uuid;

use crate::client::{Bookmark, BookmarkChange, ChangeType};

/// Newest-first list of the signed-in user's bookmarks
#[derive(Debug, Default)]
pub struct BookmarkList {
    items: Vec<Bookmark>,
}

/// What [`BookmarkList::apply`] did with a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Added,
    Replaced,
    Removed,
    /// Malformed change, or nothing matched
    Ignored,
}

impl BookmarkList {
    pub fn new(items: Vec<Bookmark>) -> Self {
        Self { items }
    }

    /// Swap in a freshly fetched list
    pub fn replace_all(&mut self, items: Vec<Bookmark>) {
        self.items = items;
    }

    pub fn apply(&mut self, change: &BookmarkChange) -> Applied {
        match change.event_type {
            ChangeType::Insert => {
                let Some(new) = &change.new else {
                    return Applied::Ignored;
                };
                // A replayed insert must not duplicate the entry
                if let Some(existing) = self.position(&new.id) {
                    self.items[existing] = new.clone();
                    Applied::Replaced
                } else {
                    self.items.insert(0, new.clone());
                    Applied::Added
                }
            }
            ChangeType::Update => {
                let Some(new) = &change.new else {
                    return Applied::Ignored;
                };
                match self.position(&new.id) {
                    Some(existing) => {
                        self.items[existing] = new.clone();
                        Applied::Replaced
                    }
                    None => Applied::Ignored,
                }
            }
            ChangeType::Delete => {
                let Some(old) = &change.old else {
                    return Applied::Ignored;
                };
                let before = self.items.len();
                self.items.retain(|b| b.id != old.id);
                if self.items.len() < before {
                    Applied::Removed
                } else {
                    Applied::Ignored
                }
            }
        }
    }

    fn position(&self, id: &Uuid) -> Option<usize> {
        self.items.iter().position(|b| &b.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.items.iter()
    }

    /// "1 bookmark saved" / "3 bookmarks saved"
    pub fn summary(&self) -> String {
        format!(
            "{} bookmark{} saved",
            self.len(),
            if self.len() == 1 { "" } else { "s" }
        )
    }
}
