//! Account lifecycle request handlers under `/users`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::{Extension, Form, Json};
use faf_core::accounts::{AccountError, ErrorDetail};
use faf_core::models::account::{Account, AccountId};
use faf_core::models::auth::{
    ROLE_ADMINISTRATOR, ROLE_MODERATOR, ROLE_USER, SCOPE_CREATE_USER, SCOPE_WRITE_ACCOUNT_DATA,
};
use tracing::info;
use url::Url;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::remote_addr::RemoteAddress;
use crate::models::{
    ActivateForm, BuildSteamLinkUrlForm, ChangeEmailForm, ChangePasswordForm, ChangeUsernameForm,
    PerformPasswordResetForm, RegisterForm, RequestPasswordResetForm, SteamLinkUrlResponse,
};

/// Load the account acting on its own data (scope `write_account_data`
/// and `ROLE_USER`).
async fn acting_account(state: &AppState, user: &AuthenticatedUser) -> AppResult<Account> {
    user.require_scope(SCOPE_WRITE_ACCOUNT_DATA)?;
    user.require_any_role(&[ROLE_USER])?;
    Ok(state.service.get_account(user.account_id()?).await?)
}

/// `POST /users/register`: request a registration; sends the activation mail.
pub async fn register(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Form(form): Form<RegisterForm>,
) -> AppResult<StatusCode> {
    user.require_scope(SCOPE_CREATE_USER)?;
    if user.has_role(ROLE_USER) {
        return Err(AccountError::AlreadyRegistered.into());
    }
    state.service.register(&form.username, &form.email).await?;
    Ok(StatusCode::OK)
}

/// `POST /users/activate`: create the account from a registration token.
pub async fn activate(
    State(state): State<AppState>,
    remote: RemoteAddress,
    Form(form): Form<ActivateForm>,
) -> AppResult<StatusCode> {
    state
        .service
        .activate(&form.token, &form.password, remote.as_str())
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/changePassword`
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<StatusCode> {
    let account = acting_account(&state, &user).await?;
    state
        .service
        .change_password(&form.current_password, &form.new_password, &account)
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/changeUsername`
pub async fn change_username(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    remote: RemoteAddress,
    Form(form): Form<ChangeUsernameForm>,
) -> AppResult<StatusCode> {
    let account = acting_account(&state, &user).await?;
    state
        .service
        .change_login(&form.new_username, &account, remote.as_str(), false)
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/{userId}/forceChangeUsername`: moderator rename that skips
/// the cooldown and the reservation window.
pub async fn force_change_username(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<AccountId>,
    remote: RemoteAddress,
    Form(form): Form<ChangeUsernameForm>,
) -> AppResult<StatusCode> {
    user.require_scope(SCOPE_WRITE_ACCOUNT_DATA)?;
    user.require_any_role(&[ROLE_MODERATOR, ROLE_ADMINISTRATOR])?;

    let target = state.service.get_account(user_id).await?;
    let updated = state
        .service
        .change_login(&form.new_username, &target, remote.as_str(), true)
        .await?;
    info!(
        moderator = ?user.0.sub,
        account_id = user_id,
        login = %updated.login,
        "forced login change"
    );
    Ok(StatusCode::OK)
}

/// `POST /users/changeEmail`
pub async fn change_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    remote: RemoteAddress,
    Form(form): Form<ChangeEmailForm>,
) -> AppResult<StatusCode> {
    let account = acting_account(&state, &user).await?;
    state
        .service
        .change_email(
            &form.current_password,
            &form.new_email,
            &account,
            remote.as_str(),
        )
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/requestPasswordReset`: mail a reset link for a login or email.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Form(form): Form<RequestPasswordResetForm>,
) -> AppResult<StatusCode> {
    state
        .service
        .request_password_reset(&form.identifier)
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/performPasswordReset`
pub async fn perform_password_reset(
    State(state): State<AppState>,
    Form(form): Form<PerformPasswordResetForm>,
) -> AppResult<StatusCode> {
    state
        .service
        .perform_password_reset(&form.token, &form.new_password)
        .await?;
    Ok(StatusCode::OK)
}

/// `POST /users/buildSteamLinkUrl`: Steam login URL that returns to
/// `linkToSteam`.
pub async fn build_steam_link_url(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Form(form): Form<BuildSteamLinkUrlForm>,
) -> AppResult<Json<SteamLinkUrlResponse>> {
    Url::parse(&form.callback_url)
        .map_err(|e| AppError::BadRequest(format!("Invalid callbackUrl: {e}")))?;
    let account = acting_account(&state, &user).await?;
    let steam_url = state
        .service
        .build_steam_link_url(&account, &form.callback_url)?;
    Ok(Json(SteamLinkUrlResponse { steam_url }))
}

/// `GET /users/linkToSteam`: Steam OpenID return endpoint. Redirects to the
/// callback URL carried by the link token, appending `errors=<json>` when
/// the link was rejected.
pub async fn link_to_steam(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Redirect> {
    let token = params
        .iter()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.clone())
        .ok_or_else(|| AppError::from(AccountError::TokenInvalid))?;

    let result = state.service.link_to_steam(&token, &params).await?;

    let mut target = Url::parse(&result.callback_url)
        .map_err(|e| AppError::BadRequest(format!("Invalid callback URL in token: {e}")))?;
    if !result.is_success() {
        let details: Vec<ErrorDetail> = result.errors.iter().filter_map(AccountError::detail).collect();
        let errors = serde_json::to_string(&details)
            .map_err(|e| AppError::Internal(format!("errors encoding: {e}")))?;
        target.query_pairs_mut().append_pair("errors", &errors);
    }
    Ok(Redirect::to(target.as_str()))
}
