//! Authentication middleware: Bearer token extraction and access token
//! verification, plus the scope and role checks handlers apply.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use faf_core::auth::jwt::verify_access_token;
use faf_core::models::account::AccountId;
use faf_core::models::auth::AccessClaims;

use crate::AppState;
use crate::error::AppError;

/// Verified access token claims, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

impl AuthenticatedUser {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.0.scopes.iter().any(|s| s == scope)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.0.roles.iter().any(|r| r == role)
    }

    pub fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Missing scope '{scope}'")))
        }
    }

    /// Require at least one of `roles`.
    pub fn require_any_role(&self, roles: &[&str]) -> Result<(), AppError> {
        if roles.iter().any(|role| self.has_role(role)) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Requires one of the roles {}",
                roles.join(", ")
            )))
        }
    }

    /// Account id from the `sub` claim.
    pub fn account_id(&self) -> Result<AccountId, AppError> {
        self.0
            .sub
            .as_deref()
            .and_then(|sub| sub.parse().ok())
            .ok_or_else(|| AppError::Unauthorized("Token has no account subject".into()))
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// access token, and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = verify_access_token(token, state.config.access_token_secret.as_bytes())
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use faf_core::models::auth::{ROLE_MODERATOR, ROLE_USER, SCOPE_WRITE_ACCOUNT_DATA};

    use super::*;

    fn user(sub: Option<&str>, roles: &[&str], scopes: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser(AccessClaims {
            sub: sub.map(str::to_string),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            exp: 0,
            iat: 0,
        })
    }

    #[test]
    fn checks_scopes_and_roles() {
        let u = user(Some("7"), &[ROLE_USER], &[SCOPE_WRITE_ACCOUNT_DATA]);
        assert!(u.require_scope(SCOPE_WRITE_ACCOUNT_DATA).is_ok());
        assert!(matches!(
            u.require_scope("create_user"),
            Err(AppError::Forbidden(_))
        ));
        assert!(u.require_any_role(&[ROLE_USER]).is_ok());
        assert!(matches!(
            u.require_any_role(&[ROLE_MODERATOR]),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn account_id_requires_numeric_subject() {
        assert_eq!(user(Some("42"), &[], &[]).account_id().unwrap(), 42);
        assert!(user(None, &[], &[]).account_id().is_err());
        assert!(user(Some("abc"), &[], &[]).account_id().is_err());
    }
}
