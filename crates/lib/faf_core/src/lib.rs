//! # faf_core
//!
//! Account lifecycle domain logic: registration, activation, credential
//! changes, password reset and Steam linking, plus the adapters for the
//! database, mail delivery, the legacy chat credential mirror and Steam.

pub mod accounts;
pub mod auth;
pub mod email;
pub mod migrate;
pub mod models;
pub mod settings;
pub mod steam;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
