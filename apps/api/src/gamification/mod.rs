pub mod badges;
pub mod handlers;
pub mod levels;
pub mod rewards;
pub mod service;
