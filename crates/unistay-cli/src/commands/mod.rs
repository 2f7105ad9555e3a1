pub mod auth;
pub mod guard;
