//! Domain models shared by the account services and the API layer.

pub mod account;
pub mod auth;
