pub mod auth;
pub mod bookmarks;
pub mod watch;
