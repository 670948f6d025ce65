pub mod activity;
pub mod challenge;
pub mod googlefit;
pub mod social;
pub mod user;
