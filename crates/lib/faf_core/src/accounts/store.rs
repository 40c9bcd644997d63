//! Persistence ports for accounts and the legacy credential mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AccountError;
use crate::models::account::{Account, AccountId, NewAccount, RatingDefaults};

/// Account, name history and rating persistence.
///
/// Login and email lookups are case-insensitive.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError>;

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AccountError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError>;

    async fn find_by_steam_id(&self, steam_id: &str) -> Result<Option<Account>, AccountError>;

    async fn login_exists(&self, login: &str) -> Result<bool, AccountError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AccountError>;

    /// Account that most recently gave up `name` at or after `since`.
    async fn last_name_owner_since(
        &self,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AccountId>, AccountError>;

    /// Time of the account's most recent login change.
    async fn last_name_change(
        &self,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, AccountError>;

    /// Insert the account and its global and 1v1 rating rows atomically.
    async fn create_account(
        &self,
        account: &NewAccount,
        ratings: RatingDefaults,
    ) -> Result<Account, AccountError>;

    /// Record the current login in the name history and switch to
    /// `new_login` atomically.
    async fn change_login(
        &self,
        account: &Account,
        new_login: &str,
        recent_ip: &str,
    ) -> Result<Account, AccountError>;

    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AccountError>;

    async fn change_email(
        &self,
        account_id: AccountId,
        email: &str,
        recent_ip: &str,
    ) -> Result<(), AccountError>;

    /// Set the Steam id of an account that has none yet.
    ///
    /// Fails with [`AccountError::SteamIdUnchangeable`] when the account is
    /// already linked, including by a concurrent request.
    async fn link_steam(&self, account_id: AccountId, steam_id: &str) -> Result<(), AccountError>;
}

/// Password mirror of the chat services (NickServ) database.
#[async_trait]
pub trait LegacyCredentialStore: Send + Sync {
    /// Returns `false` when no chat services nick exists for `login`.
    async fn update_password(&self, login: &str, legacy_hash: &str) -> Result<bool, AccountError>;
}
