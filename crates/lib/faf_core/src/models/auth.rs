//! Authentication domain models.

use serde::{Deserialize, Serialize};

/// Role held by every activated account.
pub const ROLE_USER: &str = "ROLE_USER";
/// Moderators may force login changes on other accounts.
pub const ROLE_MODERATOR: &str = "ROLE_MODERATOR";
pub const ROLE_ADMINISTRATOR: &str = "ROLE_ADMINISTRATOR";

/// Scope required by clients allowed to register new accounts.
pub const SCOPE_CREATE_USER: &str = "create_user";
/// Scope required to modify account data.
pub const SCOPE_WRITE_ACCOUNT_DATA: &str = "write_account_data";

/// JWT claims carried by bearer access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: account id, absent for client-only tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Granted roles (e.g. `["ROLE_USER"]`).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Granted OAuth scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}
