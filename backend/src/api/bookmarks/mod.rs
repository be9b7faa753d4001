pub mod handlers;
pub mod validate;

pub use handlers::*;
