pub mod handlers;
pub mod hydration;
pub mod streak;
pub mod vitals;
