//! PostgreSQL adapters for [`AccountStore`] and [`LegacyCredentialStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AccountError;
use super::store::{AccountStore, LegacyCredentialStore};
use crate::models::account::{Account, AccountId, NewAccount, RatingDefaults};

const LOGIN_UNIQUE_INDEX: &str = "login_login_lower_idx";
const EMAIL_UNIQUE_INDEX: &str = "login_email_lower_idx";
const STEAM_ID_UNIQUE_INDEX: &str = "login_steamid_idx";

const SELECT_ACCOUNT: &str = "SELECT id, login, email, password, steamid, ip FROM login";

/// (id, login, email, password, steamid, ip)
type AccountRow = (i64, String, String, String, Option<String>, Option<String>);

fn into_account((id, login, email, password_hash, steam_id, recent_ip): AccountRow) -> Account {
    Account {
        id,
        login,
        email,
        password_hash,
        steam_id,
        recent_ip,
    }
}

/// Translate unique-index violations raised at commit time into the
/// matching rejection; the uniqueness pre-checks leave this window open.
fn map_write_error(e: sqlx::Error, login: &str, email: &str) -> AccountError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        match db.constraint() {
            Some(LOGIN_UNIQUE_INDEX) => return AccountError::UsernameTaken(login.to_string()),
            Some(EMAIL_UNIQUE_INDEX) => return AccountError::EmailRegistered(email.to_string()),
            Some(STEAM_ID_UNIQUE_INDEX) => return AccountError::SteamIdUnchangeable,
            _ => {}
        }
    }
    AccountError::from(e)
}

/// [`AccountStore`] over the `login`, `name_history` and rating tables.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        filter: &str,
        value: &str,
    ) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE {filter}"))
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_account))
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_account))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>, AccountError> {
        self.find_one("lower(login) = lower($1)", login).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
        self.find_one("lower(email) = lower($1)", email).await
    }

    async fn find_by_steam_id(&self, steam_id: &str) -> Result<Option<Account>, AccountError> {
        self.find_one("steamid = $1", steam_id).await
    }

    async fn login_exists(&self, login: &str) -> Result<bool, AccountError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM login WHERE lower(login) = lower($1))",
        )
        .bind(login)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AccountError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM login WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn last_name_owner_since(
        &self,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AccountId>, AccountError> {
        let owner = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM name_history \
             WHERE lower(previous_name) = lower($1) AND change_time >= $2 \
             ORDER BY change_time DESC LIMIT 1",
        )
        .bind(name)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn last_name_change(
        &self,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, AccountError> {
        let changed_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT max(change_time) FROM name_history WHERE user_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(changed_at)
    }

    async fn create_account(
        &self,
        account: &NewAccount,
        ratings: RatingDefaults,
    ) -> Result<Account, AccountError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO login (login, email, password, ip) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&account.login)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.recent_ip)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &account.login, &account.email))?;

        sqlx::query("INSERT INTO global_rating (id, mean, deviation) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(ratings.mean)
            .bind(ratings.deviation)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO ladder1v1_rating (id, mean, deviation) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(ratings.mean)
            .bind(ratings.deviation)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Account {
            id,
            login: account.login.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            steam_id: None,
            recent_ip: Some(account.recent_ip.clone()),
        })
    }

    async fn change_login(
        &self,
        account: &Account,
        new_login: &str,
        recent_ip: &str,
    ) -> Result<Account, AccountError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO name_history (user_id, previous_name, change_time) VALUES ($1, $2, now())",
        )
        .bind(account.id)
        .bind(&account.login)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE login SET login = $2, ip = $3, update_time = now() WHERE id = $1")
            .bind(account.id)
            .bind(new_login)
            .bind(recent_ip)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, new_login, &account.email))?;

        tx.commit().await?;

        Ok(Account {
            login: new_login.to_string(),
            recent_ip: Some(recent_ip.to_string()),
            ..account.clone()
        })
    }

    async fn set_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        sqlx::query("UPDATE login SET password = $2, update_time = now() WHERE id = $1")
            .bind(account_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn change_email(
        &self,
        account_id: AccountId,
        email: &str,
        recent_ip: &str,
    ) -> Result<(), AccountError> {
        sqlx::query("UPDATE login SET email = $2, ip = $3, update_time = now() WHERE id = $1")
            .bind(account_id)
            .bind(email)
            .bind(recent_ip)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "", email))?;
        Ok(())
    }

    async fn link_steam(
        &self,
        account_id: AccountId,
        steam_id: &str,
    ) -> Result<(), AccountError> {
        let result = sqlx::query(
            "UPDATE login SET steamid = $2, update_time = now() \
             WHERE id = $1 AND (steamid IS NULL OR steamid = '')",
        )
        .bind(account_id)
        .bind(steam_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "", ""))?;
        if result.rows_affected() == 0 {
            return Err(AccountError::SteamIdUnchangeable);
        }
        Ok(())
    }
}

/// [`LegacyCredentialStore`] writing to the chat services nick table.
#[derive(Clone)]
pub struct PgLegacyCredentialStore {
    pool: PgPool,
}

impl PgLegacyCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LegacyCredentialStore for PgLegacyCredentialStore {
    async fn update_password(&self, login: &str, legacy_hash: &str) -> Result<bool, AccountError> {
        let result = sqlx::query("UPDATE anope_nick_core SET pass = $1 WHERE display = $2")
            .bind(legacy_hash)
            .bind(login)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
