//! Bearer access-token verification.
//!
//! Access tokens are issued by the OAuth server; this service only verifies
//! them with the shared secret. Generation exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::AuthError;
use crate::models::account::AccountId;
use crate::models::auth::AccessClaims;

/// Generate a signed access token (HS256).
pub fn generate_access_token(
    account_id: Option<AccountId>,
    roles: &[&str],
    scopes: &[&str],
    lifetime: Duration,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: account_id.map(|id| id.to_string()),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify an access token, returning the claims on success.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Option<AccessClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<AccessClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{ROLE_USER, SCOPE_WRITE_ACCOUNT_DATA};

    #[test]
    fn generated_token_verifies() {
        let token = generate_access_token(
            Some(7),
            &[ROLE_USER],
            &[SCOPE_WRITE_ACCOUNT_DATA],
            Duration::minutes(5),
            b"secret",
        )
        .unwrap();
        let claims = verify_access_token(&token, b"secret").unwrap();
        assert_eq!(claims.sub.as_deref(), Some("7"));
        assert_eq!(claims.roles, vec![ROLE_USER]);
        assert_eq!(claims.scopes, vec![SCOPE_WRITE_ACCOUNT_DATA]);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            generate_access_token(None, &[], &[], Duration::minutes(5), b"secret").unwrap();
        assert!(verify_access_token(&token, b"other").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token =
            generate_access_token(Some(1), &[], &[], Duration::hours(-1), b"secret").unwrap();
        assert!(verify_access_token(&token, b"secret").is_none());
    }
}
