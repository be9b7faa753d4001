pub mod handlers;
pub mod helpers;
pub mod middleware;
pub mod oauth;

pub use handlers::*;
