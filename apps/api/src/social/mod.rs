pub mod friends;
pub mod handlers;
