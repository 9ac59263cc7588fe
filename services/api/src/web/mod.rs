pub mod auth;
pub mod cookies;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers and middleware that the binary wires into the router.
pub use auth::{login_callback_handler, logout_handler};
pub use middleware::attach_session;
pub use rest::current_user_handler;
