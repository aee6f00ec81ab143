//! Request handlers.

pub mod auth;
pub mod items;
pub mod reflection;
