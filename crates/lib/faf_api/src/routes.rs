//! Route paths.
//!
//! Names follow `<METHOD>_<PATH>` with path segments upper-snake-cased.

pub const POST_USERS_REGISTER: &str = "/users/register";
pub const POST_USERS_ACTIVATE: &str = "/users/activate";
pub const POST_USERS_CHANGE_PASSWORD: &str = "/users/changePassword";
pub const POST_USERS_CHANGE_USERNAME: &str = "/users/changeUsername";
pub const POST_USERS_ID_FORCE_CHANGE_USERNAME: &str = "/users/{userId}/forceChangeUsername";
pub const POST_USERS_CHANGE_EMAIL: &str = "/users/changeEmail";
pub const POST_USERS_REQUEST_PASSWORD_RESET: &str = "/users/requestPasswordReset";
pub const POST_USERS_PERFORM_PASSWORD_RESET: &str = "/users/performPasswordReset";
pub const POST_USERS_BUILD_STEAM_LINK_URL: &str = "/users/buildSteamLinkUrl";
pub const GET_USERS_LINK_TO_STEAM: &str = "/users/linkToSteam";
pub const GET_METRICS: &str = "/metrics";
