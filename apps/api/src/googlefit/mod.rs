pub mod client;
pub mod handlers;
pub mod summary;
pub mod tokens;
