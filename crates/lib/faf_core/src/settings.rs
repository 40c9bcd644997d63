//! Policy knobs and collaborator settings for the account lifecycle.
//!
//! URL and mail templates use `{name}` placeholders filled by
//! [`render_template`].

use chrono::Duration;

use crate::models::account::RatingDefaults;

/// Lifecycle policy and URL templates.
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Months a previous login stays reserved for its last owner.
    pub username_reservation_months: u32,
    /// Days that must pass between two voluntary login changes.
    pub min_days_between_username_change: i64,
    /// Lifetime of registration (activation) tokens.
    pub registration_link_lifetime: Duration,
    /// Lifetime of password reset tokens.
    pub password_reset_link_lifetime: Duration,
    /// Activation link; placeholders `{username}`, `{token}`.
    pub activation_url_format: String,
    /// Password reset link; placeholders `{username}`, `{token}`.
    pub password_reset_url_format: String,
    /// Where Steam redirects after login; placeholder `{token}`.
    pub steam_redirect_url_format: String,
    pub rating: RatingDefaults,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            username_reservation_months: 6,
            min_days_between_username_change: 30,
            registration_link_lifetime: Duration::seconds(86_400),
            password_reset_link_lifetime: Duration::seconds(86_400),
            activation_url_format:
                "https://www.faforever.com/account/activate?username={username}&token={token}"
                    .into(),
            password_reset_url_format:
                "https://www.faforever.com/account/password/confirmReset?username={username}&token={token}"
                    .into(),
            steam_redirect_url_format: "https://api.faforever.com/users/linkToSteam?token={token}"
                .into(),
            rating: RatingDefaults::default(),
        }
    }
}

/// Mail content and address policy.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub activation_subject: String,
    /// Placeholders `{username}`, `{url}`.
    pub activation_body: String,
    pub password_reset_subject: String,
    /// Placeholders `{username}`, `{url}`.
    pub password_reset_body: String,
    /// Domains (lowercase) refused for registration and email changes.
    pub blacklisted_domains: Vec<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            activation_subject: "FAF user registration".into(),
            activation_body: "Dear {username},\n\nplease activate your account by visiting:\n{url}\n\nIf you did not register, ignore this email.".into(),
            password_reset_subject: "FAF password reset".into(),
            password_reset_body: "Dear {username},\n\na password reset was requested for your account. Set a new password here:\n{url}\n\nIf you did not request this, ignore this email.".into(),
            blacklisted_domains: Vec::new(),
        }
    }
}

/// SMTP transport settings. An empty host puts the sender in log-only mode.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_starttls: bool,
    pub from: String,
}

/// Steam OpenID and Web API settings.
#[derive(Debug, Clone)]
pub struct SteamSettings {
    pub api_key: String,
    /// OpenID realm announced to Steam.
    pub realm: String,
    pub login_url: String,
    pub web_api_url: String,
    /// App id an account must own to be linked (Forged Alliance).
    pub required_app_id: u32,
}

impl Default for SteamSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            realm: "https://api.faforever.com".into(),
            login_url: "https://steamcommunity.com/openid/login".into(),
            web_api_url: "https://api.steampowered.com".into(),
            required_app_id: 9420,
        }
    }
}

/// Replace each `{key}` in `template` with its value.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_all_placeholders() {
        let url = render_template(
            "https://x/activate?username={username}&token={token}",
            &[("username", "Player1"), ("token", "abc")],
        );
        assert_eq!(url, "https://x/activate?username=Player1&token=abc");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        assert_eq!(render_template("{a}-{b}", &[("a", "1")]), "1-{b}");
    }

    #[test]
    fn defaults_match_documented_policy() {
        let settings = AccountSettings::default();
        assert_eq!(settings.username_reservation_months, 6);
        assert_eq!(settings.min_days_between_username_change, 30);
        assert_eq!(settings.rating.mean, 1500.0);
        assert_eq!(settings.rating.deviation, 500.0);
    }
}
