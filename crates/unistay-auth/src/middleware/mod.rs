//! HTTP integration for axum.
//!
//! - [`cookie`]: reading and writing the signed session cookie
//! - [`error`]: `IntoResponse` for [`AuthError`](crate::error::AuthError)

pub mod cookie;
pub mod error;

pub use cookie::SessionCookies;
pub use error::error_body;
