//! Request forms and response bodies.

use faf_core::accounts::ErrorDetail;
use serde::{Deserialize, Serialize};

/// Body of non-business errors (401, 403, 5xx).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Body of business rejections (422) and of the `errors` redirect parameter.
#[derive(Debug, Serialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateForm {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeUsernameForm {
    pub new_username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailForm {
    pub current_password: String,
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestPasswordResetForm {
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformPasswordResetForm {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSteamLinkUrlForm {
    pub callback_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamLinkUrlResponse {
    pub steam_url: String,
}
