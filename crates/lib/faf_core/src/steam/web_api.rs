//! [`SteamGateway`] backed by Steam's OpenID endpoint and Web API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{SteamGateway, openid_login_url, param, steam_id_from_params};
use crate::accounts::AccountError;
use crate::settings::SteamSettings;

#[derive(Debug, Default, Deserialize)]
struct OwnedGamesEnvelope {
    #[serde(default)]
    response: OwnedGames,
}

#[derive(Debug, Default, Deserialize)]
struct OwnedGames {
    /// Absent for private profiles.
    #[serde(default)]
    game_count: u32,
}

pub struct SteamWebGateway {
    client: Client,
    settings: SteamSettings,
}

impl SteamWebGateway {
    pub fn new(settings: SteamSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl SteamGateway for SteamWebGateway {
    fn login_url(&self, return_to: &str) -> Result<String, AccountError> {
        openid_login_url(&self.settings.login_url, &self.settings.realm, return_to)
    }

    async fn verify_login_redirect(
        &self,
        params: &[(String, String)],
    ) -> Result<String, AccountError> {
        if param(params, "openid.mode") != Some("id_res") {
            return Err(AccountError::SteamLoginInvalid);
        }

        // Echo the signed fields back with mode check_authentication.
        let form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.starts_with("openid."))
            .map(|(k, v)| {
                if k == "openid.mode" {
                    (k.as_str(), "check_authentication")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        let body = self
            .client
            .post(&self.settings.login_url)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AccountError::SteamError(format!("check_authentication: {e}")))?
            .text()
            .await
            .map_err(|e| AccountError::SteamError(format!("check_authentication body: {e}")))?;

        if !body.lines().any(|line| line.trim() == "is_valid:true") {
            warn!("Steam rejected login assertion");
            return Err(AccountError::SteamLoginInvalid);
        }
        steam_id_from_params(params)
    }

    async fn owns_game(&self, steam_id: &str) -> Result<bool, AccountError> {
        let url = format!(
            "{}/IPlayerService/GetOwnedGames/v1/",
            self.settings.web_api_url.trim_end_matches('/')
        );
        let app_id = self.settings.required_app_id.to_string();
        let envelope = self
            .client
            .get(&url)
            .query(&[
                ("key", self.settings.api_key.as_str()),
                ("steamid", steam_id),
                ("format", "json"),
                ("appids_filter[0]", app_id.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AccountError::SteamError(format!("GetOwnedGames: {e}")))?
            .json::<OwnedGamesEnvelope>()
            .await
            .map_err(|e| AccountError::SteamError(format!("GetOwnedGames body: {e}")))?;

        debug!(steam_id, game_count = envelope.response.game_count, "checked game ownership");
        Ok(envelope.response.game_count > 0)
    }
}
