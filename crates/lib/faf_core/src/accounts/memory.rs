//! In-memory [`AccountStore`] and [`LegacyCredentialStore`] for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AccountError;
use super::store::{AccountStore, LegacyCredentialStore};
use crate::models::account::{
    Account, AccountId, NameRecord, NewAccount, RatingDefaults, RatingLadder, RatingRecord,
};

#[derive(Default)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    name_history: Vec<NameRecord>,
    ratings: Vec<RatingRecord>,
    next_id: AccountId,
}

impl MemoryState {
    fn find(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts.values().find(|a| pred(a)).cloned()
    }

    fn stored(&mut self, id: AccountId) -> Result<&mut Account, AccountError> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| AccountError::Internal(format!("account {id} not found")))
    }

    fn insert(&mut self, account: &NewAccount) -> Result<Account, AccountError> {
        if self
            .accounts
            .values()
            .any(|a| a.login.eq_ignore_ascii_case(&account.login))
        {
            return Err(AccountError::UsernameTaken(account.login.clone()));
        }
        if self
            .accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(AccountError::EmailRegistered(account.email.clone()));
        }
        self.next_id += 1;
        let created = Account {
            id: self.next_id,
            login: account.login.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            steam_id: None,
            recent_ip: Some(account.recent_ip.clone()),
        };
        self.accounts.insert(created.id, created.clone());
        Ok(created)
    }
}

/// Account store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryAccountStore {
    state: Mutex<MemoryState>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an account without ratings.
    pub fn insert_account(&self, account: NewAccount) -> Result<Account, AccountError> {
        self.state().insert(&account)
    }

    /// Seed a name history entry with an arbitrary timestamp.
    pub fn record_name_change(
        &self,
        account_id: AccountId,
        previous_name: &str,
        changed_at: DateTime<Utc>,
    ) {
        self.state().name_history.push(NameRecord {
            account_id,
            previous_name: previous_name.to_string(),
            changed_at,
        });
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.state().accounts.get(&id).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.state().accounts.len()
    }

    pub fn name_history(&self) -> Vec<NameRecord> {
        self.state().name_history.clone()
    }

    pub fn ratings(&self, account_id: AccountId) -> Vec<RatingRecord> {
        self.state()
            .ratings
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        Ok(self.account(id))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.state().find(|a| a.login.eq_ignore_ascii_case(login)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.state().find(|a| a.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_steam_id(&self, steam_id: &str) -> Result<Option<Account>, AccountError> {
        Ok(self
            .state()
            .find(|a| a.steam_id.as_deref() == Some(steam_id)))
    }

    async fn login_exists(&self, login: &str) -> Result<bool, AccountError> {
        Ok(self.find_by_login(login).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AccountError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn last_name_owner_since(
        &self,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AccountId>, AccountError> {
        Ok(self
            .state()
            .name_history
            .iter()
            .filter(|r| r.previous_name.eq_ignore_ascii_case(name) && r.changed_at >= since)
            .max_by_key(|r| r.changed_at)
            .map(|r| r.account_id))
    }

    async fn last_name_change(
        &self,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, AccountError> {
        Ok(self
            .state()
            .name_history
            .iter()
            .filter(|r| r.account_id == account_id)
            .map(|r| r.changed_at)
            .max())
    }

    async fn create_account(
        &self,
        account: &NewAccount,
        ratings: RatingDefaults,
    ) -> Result<Account, AccountError> {
        let mut state = self.state();
        let created = state.insert(account)?;
        for ladder in [RatingLadder::Global, RatingLadder::Ladder1v1] {
            state.ratings.push(RatingRecord {
                account_id: created.id,
                ladder,
                mean: ratings.mean,
                deviation: ratings.deviation,
            });
        }
        Ok(created)
    }

    async fn change_login(
        &self,
        account: &Account,
        new_login: &str,
        recent_ip: &str,
    ) -> Result<Account, AccountError> {
        let mut state = self.state();
        if state
            .accounts
            .values()
            .any(|a| a.id != account.id && a.login.eq_ignore_ascii_case(new_login))
        {
            return Err(AccountError::UsernameTaken(new_login.to_string()));
        }
        let stored = state.stored(account.id)?;
        let previous_name = std::mem::replace(&mut stored.login, new_login.to_string());
        stored.recent_ip = Some(recent_ip.to_string());
        let updated = stored.clone();
        state.name_history.push(NameRecord {
            account_id: account.id,
            previous_name,
            changed_at: Utc::now(),
        });
        Ok(updated)
    }

    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        self.state().stored(account_id)?.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn change_email(
        &self,
        account_id: AccountId,
        email: &str,
        recent_ip: &str,
    ) -> Result<(), AccountError> {
        let mut state = self.state();
        if state
            .accounts
            .values()
            .any(|a| a.id != account_id && a.email.eq_ignore_ascii_case(email))
        {
            return Err(AccountError::EmailRegistered(email.to_string()));
        }
        let stored = state.stored(account_id)?;
        stored.email = email.to_string();
        stored.recent_ip = Some(recent_ip.to_string());
        Ok(())
    }

    async fn link_steam(
        &self,
        account_id: AccountId,
        steam_id: &str,
    ) -> Result<(), AccountError> {
        let mut state = self.state();
        if state
            .accounts
            .values()
            .any(|a| a.id != account_id && a.steam_id.as_deref() == Some(steam_id))
        {
            return Err(AccountError::SteamIdUnchangeable);
        }
        let stored = state.stored(account_id)?;
        if stored.has_steam_link() {
            return Err(AccountError::SteamIdUnchangeable);
        }
        stored.steam_id = Some(steam_id.to_string());
        Ok(())
    }
}

/// Legacy credential mirror holding the last digest per registered nick.
#[derive(Default)]
pub struct MemoryCredentialStore {
    passwords: Mutex<HashMap<String, Option<String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn nicks(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.passwords.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a chat services nick without a password.
    pub fn register_nick(&self, login: &str) {
        self.nicks().entry(login.to_string()).or_default();
    }

    pub fn password_for(&self, login: &str) -> Option<String> {
        self.nicks().get(login).cloned().flatten()
    }
}

#[async_trait]
impl LegacyCredentialStore for MemoryCredentialStore {
    async fn update_password(&self, login: &str, legacy_hash: &str) -> Result<bool, AccountError> {
        match self.nicks().get_mut(login) {
            Some(pass) => {
                *pass = Some(legacy_hash.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
