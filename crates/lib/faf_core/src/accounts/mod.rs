//! Account lifecycle: registration, activation, credential and login
//! changes, password reset and Steam linking.
//!
//! [`service::AccountService`] enforces the business rules and drives the
//! collaborators declared in [`store`], [`crate::email`] and [`crate::steam`].

pub mod events;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod metrics;
pub mod naming;
pub mod queries;
pub mod service;
pub mod store;


use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// User-facing rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyRegistered,
    UsernameInvalid,
    UsernameTaken,
    UsernameReserved,
    UsernameChangeTooEarly,
    EmailRegistered,
    EmailInvalid,
    EmailBlacklisted,
    PasswordChangeFailedWrongPassword,
    EmailChangeFailedWrongPassword,
    UnknownIdentifier,
    TokenInvalid,
    SteamIdUnchangeable,
    SteamIdAlreadyLinked,
    SteamLinkNoFaGame,
    SteamLoginInvalid,
}

impl ErrorCode {
    /// Stable numeric code exposed to clients.
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::AlreadyRegistered => 100,
            ErrorCode::UsernameInvalid => 101,
            ErrorCode::UsernameTaken => 102,
            ErrorCode::UsernameReserved => 103,
            ErrorCode::UsernameChangeTooEarly => 104,
            ErrorCode::EmailRegistered => 105,
            ErrorCode::EmailInvalid => 106,
            ErrorCode::EmailBlacklisted => 107,
            ErrorCode::PasswordChangeFailedWrongPassword => 108,
            ErrorCode::EmailChangeFailedWrongPassword => 109,
            ErrorCode::UnknownIdentifier => 110,
            ErrorCode::TokenInvalid => 111,
            ErrorCode::SteamIdUnchangeable => 112,
            ErrorCode::SteamIdAlreadyLinked => 113,
            ErrorCode::SteamLinkNoFaGame => 114,
            ErrorCode::SteamLoginInvalid => 115,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorCode::AlreadyRegistered => "Registration failed",
            ErrorCode::UsernameInvalid => "Invalid username",
            ErrorCode::UsernameTaken => "Username taken",
            ErrorCode::UsernameReserved => "Username reserved",
            ErrorCode::UsernameChangeTooEarly => "Username change not allowed",
            ErrorCode::EmailRegistered => "Email already registered",
            ErrorCode::EmailInvalid => "Invalid email address",
            ErrorCode::EmailBlacklisted => "Email address not allowed",
            ErrorCode::PasswordChangeFailedWrongPassword => "Password change failed",
            ErrorCode::EmailChangeFailedWrongPassword => "Email change failed",
            ErrorCode::UnknownIdentifier => "Unknown identifier",
            ErrorCode::TokenInvalid => "Invalid token",
            ErrorCode::SteamIdUnchangeable => "Steam link failed",
            ErrorCode::SteamIdAlreadyLinked => "Steam account already linked",
            ErrorCode::SteamLinkNoFaGame => "Game not owned",
            ErrorCode::SteamLoginInvalid => "Steam login failed",
        }
    }
}

/// Serialisable description of a rejection, as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub title: String,
    pub detail: String,
}

/// Account lifecycle errors.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("You are already registered")]
    AlreadyRegistered,

    #[error("The username '{0}' is invalid")]
    UsernameInvalid(String),

    #[error("The username '{0}' is already in use")]
    UsernameTaken(String),

    #[error("The username '{name}' is reserved for {months} months after its last use")]
    UsernameReserved { name: String, months: u32 },

    #[error("You can change your username again in {days} days")]
    UsernameChangeTooEarly { days: i64 },

    #[error("The email address '{0}' is already registered")]
    EmailRegistered(String),

    #[error("The email address '{0}' is invalid")]
    EmailInvalid(String),

    #[error("The domain of '{0}' is not allowed")]
    EmailBlacklisted(String),

    #[error("The current password is wrong")]
    PasswordChangeWrongPassword,

    #[error("The current password is wrong")]
    EmailChangeWrongPassword,

    #[error("No account matches '{0}'")]
    UnknownIdentifier(String),

    #[error("The token is invalid or expired")]
    TokenInvalid,

    #[error("The account is already linked to a Steam account")]
    SteamIdUnchangeable,

    #[error("The Steam account is already linked to '{0}'")]
    SteamIdAlreadyLinked(String),

    #[error("The Steam account does not own Forged Alliance")]
    SteamLinkNoGame,

    #[error("The Steam login could not be verified")]
    SteamLoginInvalid,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Mail delivery failed: {0}")]
    MailError(String),

    #[error("Steam gateway error: {0}")]
    SteamError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccountError {
    /// Rejection code for business-rule failures, `None` for infrastructure errors.
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            AccountError::AlreadyRegistered => ErrorCode::AlreadyRegistered,
            AccountError::UsernameInvalid(_) => ErrorCode::UsernameInvalid,
            AccountError::UsernameTaken(_) => ErrorCode::UsernameTaken,
            AccountError::UsernameReserved { .. } => ErrorCode::UsernameReserved,
            AccountError::UsernameChangeTooEarly { .. } => ErrorCode::UsernameChangeTooEarly,
            AccountError::EmailRegistered(_) => ErrorCode::EmailRegistered,
            AccountError::EmailInvalid(_) => ErrorCode::EmailInvalid,
            AccountError::EmailBlacklisted(_) => ErrorCode::EmailBlacklisted,
            AccountError::PasswordChangeWrongPassword => {
                ErrorCode::PasswordChangeFailedWrongPassword
            }
            AccountError::EmailChangeWrongPassword => ErrorCode::EmailChangeFailedWrongPassword,
            AccountError::UnknownIdentifier(_) => ErrorCode::UnknownIdentifier,
            AccountError::TokenInvalid => ErrorCode::TokenInvalid,
            AccountError::SteamIdUnchangeable => ErrorCode::SteamIdUnchangeable,
            AccountError::SteamIdAlreadyLinked(_) => ErrorCode::SteamIdAlreadyLinked,
            AccountError::SteamLinkNoGame => ErrorCode::SteamLinkNoFaGame,
            AccountError::SteamLoginInvalid => ErrorCode::SteamLoginInvalid,
            AccountError::DbError(_)
            | AccountError::MailError(_)
            | AccountError::SteamError(_)
            | AccountError::Internal(_) => return None,
        };
        Some(code)
    }

    /// Client-facing description, `None` for infrastructure errors.
    pub fn detail(&self) -> Option<ErrorDetail> {
        self.code().map(|code| ErrorDetail {
            code: code.code().to_string(),
            title: code.title().to_string(),
            detail: self.to_string(),
        })
    }
}

impl From<AuthError> for AccountError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TokenInvalid => AccountError::TokenInvalid,
            AuthError::TokenError(msg) | AuthError::Internal(msg) => AccountError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn business_errors_carry_detail() {
        let detail = AccountError::UsernameReserved {
            name: "Player1".into(),
            months: 6,
        }
        .detail()
        .unwrap();
        assert_eq!(detail.code, "103");
        assert_eq!(detail.title, "Username reserved");
        assert!(detail.detail.contains("Player1"));
        assert!(detail.detail.contains('6'));
    }

    #[test]
    fn infrastructure_errors_have_no_code() {
        assert!(AccountError::MailError("smtp down".into()).code().is_none());
        assert!(AccountError::DbError(sqlx::Error::RowNotFound).detail().is_none());
    }

    #[test]
    fn invalid_token_maps_from_auth_error() {
        assert!(matches!(
            AccountError::from(AuthError::TokenInvalid),
            AccountError::TokenInvalid
        ));
        assert!(matches!(
            AccountError::from(AuthError::Internal("x".into())),
            AccountError::Internal(_)
        ));
    }
}
