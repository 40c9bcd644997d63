//! Steam identity gateway: OpenID login URLs, callback verification and
//! game ownership checks.

pub mod web_api;

use async_trait::async_trait;
use url::Url;

use crate::accounts::AccountError;

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const OPENID_IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const STEAM_ID_PREFIXES: [&str; 2] = [
    "https://steamcommunity.com/openid/id/",
    "http://steamcommunity.com/openid/id/",
];

/// External identity platform used for account linking.
#[async_trait]
pub trait SteamGateway: Send + Sync {
    /// URL that starts the Steam login and returns to `return_to`.
    fn login_url(&self, return_to: &str) -> Result<String, AccountError>;

    /// Verify the OpenID callback parameters and return the Steam id.
    async fn verify_login_redirect(
        &self,
        params: &[(String, String)],
    ) -> Result<String, AccountError>;

    /// Whether the Steam account owns the game required for linking.
    async fn owns_game(&self, steam_id: &str) -> Result<bool, AccountError>;
}

/// Build an OpenID 2.0 `checkid_setup` request URL.
pub fn openid_login_url(
    login_endpoint: &str,
    realm: &str,
    return_to: &str,
) -> Result<String, AccountError> {
    let url = Url::parse_with_params(
        login_endpoint,
        [
            ("openid.ns", OPENID_NS),
            ("openid.mode", "checkid_setup"),
            ("openid.return_to", return_to),
            ("openid.realm", realm),
            ("openid.identity", OPENID_IDENTIFIER_SELECT),
            ("openid.claimed_id", OPENID_IDENTIFIER_SELECT),
        ],
    )
    .map_err(|e| AccountError::Internal(format!("Steam login URL: {e}")))?;
    Ok(url.into())
}

/// Value of the first parameter named `key`.
pub fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Extract the 64-bit Steam id from `openid.claimed_id` (or
/// `openid.identity`), e.g. `https://steamcommunity.com/openid/id/7656…`.
pub fn steam_id_from_params(params: &[(String, String)]) -> Result<String, AccountError> {
    let identity = param(params, "openid.claimed_id")
        .or_else(|| param(params, "openid.identity"))
        .ok_or(AccountError::SteamLoginInvalid)?;

    let id = STEAM_ID_PREFIXES
        .iter()
        .find_map(|prefix| identity.strip_prefix(prefix))
        .ok_or(AccountError::SteamLoginInvalid)?;

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AccountError::SteamLoginInvalid);
    }
    Ok(id.to_string())
}
