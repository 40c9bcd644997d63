//! Request middleware and extractors.

pub mod auth;
pub mod remote_addr;
