//! Domain models shared by server and client.

pub mod auth;
pub mod item;
