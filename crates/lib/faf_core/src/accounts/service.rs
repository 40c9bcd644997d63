//! Account lifecycle manager.
//!
//! Every operation validates its business rules first, then writes through
//! the [`AccountStore`], publishes an [`AccountUpdated`](super::events::AccountUpdated)
//! event after the commit and finally talks to the outbound collaborators
//! (mail, credential mirror, Steam).

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::AccountError;
use super::events::AccountEvents;
use super::metrics::{LifecycleMetrics, PasswordResetStep, RegistrationStep};
use super::naming;
use super::store::{AccountStore, LegacyCredentialStore};
use crate::auth::password::{hash_password, legacy_hash, verify_password};
use crate::auth::tokens::{
    ClaimKind, ClaimTokenService, KEY_CALLBACK_URL, KEY_EMAIL, KEY_USER_ID, KEY_USERNAME,
};
use crate::email::EmailService;
use crate::models::account::{Account, AccountId, NewAccount};
use crate::settings::{AccountSettings, render_template};
use crate::steam::SteamGateway;

/// Lifetime of Steam link tokens, in seconds.
const STEAM_LINK_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Everything the lifecycle manager talks to, composed at process start.
pub struct Collaborators {
    pub store: Arc<dyn AccountStore>,
    pub credentials: Arc<dyn LegacyCredentialStore>,
    pub email: EmailService,
    pub steam: Arc<dyn SteamGateway>,
    pub tokens: ClaimTokenService,
    pub events: AccountEvents,
    pub metrics: LifecycleMetrics,
    pub settings: AccountSettings,
}

/// Outcome of a Steam link completion.
///
/// Validation failures are collected rather than returned as `Err`, so the
/// caller can still redirect to `callback_url` and report all of them.
#[derive(Debug)]
pub struct SteamLinkResult {
    pub callback_url: String,
    pub errors: Vec<AccountError>,
}

impl SteamLinkResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Account and callback resolved from a link token.
struct PendingLink {
    account: Account,
    callback_url: String,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    credentials: Arc<dyn LegacyCredentialStore>,
    email: EmailService,
    steam: Arc<dyn SteamGateway>,
    tokens: ClaimTokenService,
    events: AccountEvents,
    metrics: LifecycleMetrics,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            credentials,
            email,
            steam,
            tokens,
            events,
            metrics,
            settings,
        } = collaborators;
        Self {
            store,
            credentials,
            email,
            steam,
            tokens,
            events,
            metrics,
            settings,
        }
    }

    pub fn events(&self) -> &AccountEvents {
        &self.events
    }

    pub fn metrics(&self) -> &LifecycleMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &AccountSettings {
        &self.settings
    }

    /// Request a registration: validate, issue a registration token and
    /// mail the activation link. No account is created yet.
    pub async fn register(&self, username: &str, email: &str) -> Result<(), AccountError> {
        if self.store.email_exists(email).await? {
            return Err(AccountError::EmailRegistered(email.to_string()));
        }
        self.validate_new_username(username).await?;

        let cutoff = naming::reservation_cutoff(Utc::now(), self.settings.username_reservation_months);
        if self
            .store
            .last_name_owner_since(username, cutoff)
            .await?
            .is_some()
        {
            return Err(AccountError::UsernameReserved {
                name: username.to_string(),
                months: self.settings.username_reservation_months,
            });
        }

        self.email.validate_address(email)?;

        let token = self.tokens.create(
            ClaimKind::Registration,
            self.settings.registration_link_lifetime,
            &[(KEY_USERNAME, username), (KEY_EMAIL, email)],
        )?;
        let activation_url = render_template(
            &self.settings.activation_url_format,
            &[("username", username), ("token", token.as_str())],
        );

        self.email
            .send_activation_mail(username, email, &activation_url)
            .await?;
        self.metrics.registration_step(RegistrationStep::Registration);
        info!(username, "registration requested");
        Ok(())
    }

    /// Turn a registration token into an account with both rating rows.
    pub async fn activate(
        &self,
        token: &str,
        password: &str,
        remote_addr: &str,
    ) -> Result<Account, AccountError> {
        let claims = self.tokens.resolve(ClaimKind::Registration, token)?;
        let username = claims.require(KEY_USERNAME)?;
        let email = claims.require(KEY_EMAIL)?;

        // Re-checked here since the name or address may have been taken
        // while the token was pending.
        self.validate_new_username(username).await?;
        if self.store.email_exists(email).await? {
            return Err(AccountError::EmailRegistered(email.to_string()));
        }

        let new_account = NewAccount {
            login: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            recent_ip: remote_addr.to_string(),
        };
        let account = self
            .store
            .create_account(&new_account, self.settings.rating)
            .await?;

        self.events.publish(&account);
        self.metrics.registration_step(RegistrationStep::Activation);
        info!(account_id = account.id, login = %account.login, "account activated");
        Ok(account)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        account: &Account,
    ) -> Result<(), AccountError> {
        if !verify_password(current_password, &account.password_hash)? {
            return Err(AccountError::PasswordChangeWrongPassword);
        }
        self.set_password(account, new_password).await?;
        info!(account_id = account.id, "password changed");
        Ok(())
    }

    /// Change the login of `account`.
    ///
    /// A forced change (moderator action) skips the cooldown and the
    /// reservation window, but the pattern and uniqueness still apply.
    pub async fn change_login(
        &self,
        new_login: &str,
        account: &Account,
        remote_addr: &str,
        forced: bool,
    ) -> Result<Account, AccountError> {
        self.validate_new_username(new_login).await?;

        if !forced {
            let now = Utc::now();
            if let Some(last_change) = self.store.last_name_change(account.id).await?
                && let Some(days) = naming::days_until_change_allowed(
                    last_change,
                    now,
                    self.settings.min_days_between_username_change,
                )
            {
                return Err(AccountError::UsernameChangeTooEarly { days });
            }

            let cutoff = naming::reservation_cutoff(now, self.settings.username_reservation_months);
            if let Some(owner) = self.store.last_name_owner_since(new_login, cutoff).await?
                && owner != account.id
            {
                return Err(AccountError::UsernameReserved {
                    name: new_login.to_string(),
                    months: self.settings.username_reservation_months,
                });
            }
        }

        let updated = self
            .store
            .change_login(account, new_login, remote_addr)
            .await?;

        self.events.publish(&updated);
        self.metrics.name_changed();
        info!(
            account_id = account.id,
            from = %account.login,
            to = %updated.login,
            forced,
            "login changed"
        );
        Ok(updated)
    }

    pub async fn change_email(
        &self,
        current_password: &str,
        new_email: &str,
        account: &Account,
        remote_addr: &str,
    ) -> Result<Account, AccountError> {
        if !verify_password(current_password, &account.password_hash)? {
            return Err(AccountError::EmailChangeWrongPassword);
        }
        self.email.validate_address(new_email)?;
        if let Some(holder) = self.store.find_by_email(new_email).await?
            && holder.id != account.id
        {
            return Err(AccountError::EmailRegistered(new_email.to_string()));
        }

        self.store
            .change_email(account.id, new_email, remote_addr)
            .await?;
        let updated = self.reload(account.id).await?;

        self.events.publish(&updated);
        info!(account_id = account.id, "email changed");
        Ok(updated)
    }

    /// Mail a password reset link to the account matching `identifier`
    /// (login first, then email).
    pub async fn request_password_reset(&self, identifier: &str) -> Result<(), AccountError> {
        let account = match self.store.find_by_login(identifier).await? {
            Some(account) => account,
            None => self
                .store
                .find_by_email(identifier)
                .await?
                .ok_or_else(|| AccountError::UnknownIdentifier(identifier.to_string()))?,
        };

        let id = account.id.to_string();
        let token = self.tokens.create(
            ClaimKind::PasswordReset,
            self.settings.password_reset_link_lifetime,
            &[(KEY_USER_ID, id.as_str())],
        )?;
        let reset_url = render_template(
            &self.settings.password_reset_url_format,
            &[("username", account.login.as_str()), ("token", token.as_str())],
        );

        self.email
            .send_password_reset_mail(&account.login, &account.email, &reset_url)
            .await?;
        self.metrics.password_reset_step(PasswordResetStep::Request);
        info!(account_id = account.id, "password reset requested");
        Ok(())
    }

    pub async fn perform_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let claims = self.tokens.resolve(ClaimKind::PasswordReset, token)?;
        let account = self.account_from_claim(claims.require(KEY_USER_ID)?).await?;

        self.set_password(&account, new_password).await?;
        self.metrics.password_reset_step(PasswordResetStep::Done);
        info!(account_id = account.id, "password reset");
        Ok(())
    }

    /// Steam login URL that returns to the link completion endpoint with a
    /// token binding the flow to `account` and `callback_url`.
    pub fn build_steam_link_url(
        &self,
        account: &Account,
        callback_url: &str,
    ) -> Result<String, AccountError> {
        if account.has_steam_link() {
            return Err(AccountError::SteamIdUnchangeable);
        }

        let id = account.id.to_string();
        let token = self.tokens.create(
            ClaimKind::LinkToSteam,
            Duration::seconds(STEAM_LINK_TOKEN_LIFETIME_SECS),
            &[(KEY_USER_ID, id.as_str()), (KEY_CALLBACK_URL, callback_url)],
        )?;
        let return_to = render_template(&self.settings.steam_redirect_url_format, &[("token", token.as_str())]);

        let url = self.steam.login_url(&return_to)?;
        self.metrics
            .registration_step(RegistrationStep::SteamLinkRequested);
        debug!(account_id = account.id, "built Steam link URL");
        Ok(url)
    }

    /// Finish a Steam link from the raw OpenID callback parameters.
    ///
    /// A token problem is an `Err` since there is no callback to return to;
    /// a failed Steam assertion is reported in the result.
    pub async fn link_to_steam(
        &self,
        token: &str,
        openid_params: &[(String, String)],
    ) -> Result<SteamLinkResult, AccountError> {
        let pending = self.resolve_link_token(token).await?;
        let steam_id = match self.steam.verify_login_redirect(openid_params).await {
            Ok(steam_id) => steam_id,
            Err(e) if e.code().is_some() => {
                return Ok(SteamLinkResult {
                    callback_url: pending.callback_url,
                    errors: vec![e],
                });
            }
            Err(e) => return Err(e),
        };
        self.apply_steam_link(pending, &steam_id).await
    }

    /// Bind an already verified `steam_id` to the account in the token.
    pub async fn complete_steam_link(
        &self,
        token: &str,
        steam_id: &str,
    ) -> Result<SteamLinkResult, AccountError> {
        let pending = self.resolve_link_token(token).await?;
        self.apply_steam_link(pending, steam_id).await
    }

    /// Load the acting account, failing with `TokenInvalid` if it is gone.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AccountError::TokenInvalid)
    }

    async fn validate_new_username(&self, username: &str) -> Result<(), AccountError> {
        if !naming::is_valid_username(username) {
            return Err(AccountError::UsernameInvalid(username.to_string()));
        }
        if self.store.login_exists(username).await? {
            return Err(AccountError::UsernameTaken(username.to_string()));
        }
        Ok(())
    }

    async fn set_password(&self, account: &Account, password: &str) -> Result<(), AccountError> {
        self.store
            .set_password_hash(account.id, &hash_password(password)?)
            .await?;
        let mirrored = self
            .credentials
            .update_password(&account.login, &legacy_hash(password))
            .await?;
        if !mirrored {
            debug!(
                account_id = account.id,
                login = %account.login,
                "no chat services nick, legacy password not mirrored"
            );
        }
        Ok(())
    }

    async fn reload(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AccountError::Internal(format!("account {id} vanished")))
    }

    async fn account_from_claim(&self, raw_id: &str) -> Result<Account, AccountError> {
        let id: AccountId = raw_id.parse().map_err(|_| AccountError::TokenInvalid)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AccountError::TokenInvalid)
    }

    async fn resolve_link_token(&self, token: &str) -> Result<PendingLink, AccountError> {
        let claims = self.tokens.resolve(ClaimKind::LinkToSteam, token)?;
        let account = self.account_from_claim(claims.require(KEY_USER_ID)?).await?;
        let callback_url = claims.require(KEY_CALLBACK_URL)?.to_string();
        Ok(PendingLink {
            account,
            callback_url,
        })
    }

    async fn apply_steam_link(
        &self,
        pending: PendingLink,
        steam_id: &str,
    ) -> Result<SteamLinkResult, AccountError> {
        let PendingLink {
            account,
            callback_url,
        } = pending;
        let mut errors = Vec::new();
        self.metrics.registration_step(RegistrationStep::SteamLinkDone);

        if account.has_steam_link() {
            errors.push(AccountError::SteamIdUnchangeable);
        }
        if !self.steam.owns_game(steam_id).await? {
            errors.push(AccountError::SteamLinkNoGame);
        }
        if let Some(other) = self.store.find_by_steam_id(steam_id).await?
            && other.id != account.id
        {
            errors.push(AccountError::SteamIdAlreadyLinked(other.login));
        }

        if errors.is_empty() {
            match self.store.link_steam(account.id, steam_id).await {
                Ok(()) => info!(account_id = account.id, steam_id, "Steam account linked"),
                Err(e) if e.code().is_some() => errors.push(e),
                Err(e) => return Err(e),
            }
        }
        if !errors.is_empty() {
            warn!(
                account_id = account.id,
                steam_id,
                errors = errors.len(),
                "Steam link rejected"
            );
        }
        Ok(SteamLinkResult {
            callback_url,
            errors,
        })
    }
}
