//! Signed claim tokens standing in for pending server-side state.
//!
//! A token carries a kind discriminator (`action`), an expiry and a flat map
//! of string attributes. Nothing in a token is trusted before the signature,
//! the expiry and the kind have all been checked.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AuthError;

/// Attribute keys used across token kinds.
pub const KEY_USERNAME: &str = "username";
pub const KEY_EMAIL: &str = "email";
pub const KEY_USER_ID: &str = "id";
pub const KEY_CALLBACK_URL: &str = "callbackUrl";

/// Purpose a claim token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    Registration,
    PasswordReset,
    LinkToSteam,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaimSet {
    action: ClaimKind,
    iat: i64,
    exp: i64,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

/// Verified attributes of a resolved token.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(BTreeMap<String, String>);

impl Claims {
    /// Look up a required attribute; a missing one makes the token invalid.
    pub fn require(&self, key: &str) -> Result<&str, AuthError> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or(AuthError::TokenInvalid)
    }
}

/// Issues and resolves HS256 claim tokens.
#[derive(Clone)]
pub struct ClaimTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ClaimTokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token of `kind` valid for `lifetime`.
    pub fn create(
        &self,
        kind: ClaimKind,
        lifetime: Duration,
        attrs: &[(&str, &str)],
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = ClaimSet {
            action: kind,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }

    /// Verify signature, expiry and kind, returning the attributes.
    ///
    /// Malformed, tampered, expired and wrong-kind tokens all yield
    /// [`AuthError::TokenInvalid`].
    pub fn resolve(&self, kind: ClaimKind, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<ClaimSet>(token, &self.decoding, &validation).map_err(|e| {
            debug!(?kind, error = %e, "rejected claim token");
            AuthError::TokenInvalid
        })?;

        if data.claims.action != kind {
            debug!(expected = ?kind, actual = ?data.claims.action, "claim token kind mismatch");
            return Err(AuthError::TokenInvalid);
        }
        Ok(Claims(data.claims.attrs))
    }
}

/// Resolve the claim-token secret: env var `CLAIM_TOKEN_SECRET` → persisted file.
pub fn resolve_claim_secret() -> String {
    if let Ok(secret) = std::env::var("CLAIM_TOKEN_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = claim_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new claim token secret");
    secret
}

/// Path to the persisted claim-token secret file.
fn claim_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("faf-accounts")
        .join("claim-secret")
}
