//! # unistay-server
//!
//! Browser-facing gateway. Keeps the session in a signed cookie, runs the
//! role guard on every navigation and serves the sign-in, OAuth, role
//! selection and registration pages.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;
pub mod templates;
pub mod wizard_sessions;

pub use config::AppConfig;
pub use server::{ServerBuilder, UniStayServer, build_app, build_router};
pub use state::AppState;
