//! Authentication primitives.
//!
//! Password hashing (current and legacy), signed claim tokens for pending
//! registrations, password resets and Steam links, and access-token
//! verification for the API layer.

pub mod jwt;
pub mod password;
pub mod tokens;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token is invalid or expired")]
    TokenInvalid,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
