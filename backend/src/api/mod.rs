pub mod auth;
pub mod bookmarks;
pub mod common;
pub mod health;
pub mod views;

pub use health::health;
