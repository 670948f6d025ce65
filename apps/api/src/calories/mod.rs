pub mod calc;
pub mod handlers;
