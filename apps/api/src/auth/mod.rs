pub mod handlers;
pub mod session;

pub use session::{AuthUser, SessionManager};
