//! Account management API server binary.
//!
//! Composes the lifecycle manager from its Postgres, SMTP and Steam
//! collaborators and serves the `/users` API.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use faf_core::accounts::events::AccountEvents;
use faf_core::accounts::metrics::LifecycleMetrics;
use faf_core::accounts::queries::{PgAccountStore, PgLegacyCredentialStore};
use faf_core::accounts::service::{AccountService, Collaborators};
use faf_core::auth::tokens::{ClaimTokenService, resolve_claim_secret};
use faf_core::email::EmailService;
use faf_core::email::smtp::SmtpMailSender;
use faf_core::models::account::RatingDefaults;
use faf_core::settings::{AccountSettings, MailSettings, SmtpSettings, SteamSettings};
use faf_core::steam::web_api::SteamWebGateway;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,faf_api=debug,faf_core=debug";

/// CLI arguments; every option can also come from the environment.
#[derive(Parser, Debug)]
#[command(name = "faf_api_server", about = "Account management API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8010")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/faf"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// HS256 secret that verifies bearer access tokens.
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    access_token_secret: String,

    /// Months a previous login stays reserved for its last owner.
    #[arg(long, env = "USERNAME_RESERVATION_MONTHS")]
    username_reservation_months: Option<u32>,

    /// Days between two voluntary login changes.
    #[arg(long, env = "MIN_DAYS_BETWEEN_USERNAME_CHANGE")]
    min_days_between_username_change: Option<i64>,

    /// Lifetime of registration tokens, in seconds.
    #[arg(long, env = "REGISTRATION_LINK_LIFETIME_SECS")]
    registration_link_lifetime_secs: Option<i64>,

    /// Lifetime of password reset tokens, in seconds.
    #[arg(long, env = "PASSWORD_RESET_LINK_LIFETIME_SECS")]
    password_reset_link_lifetime_secs: Option<i64>,

    /// Activation link template (`{username}`, `{token}`).
    #[arg(long, env = "ACTIVATION_URL_FORMAT")]
    activation_url_format: Option<String>,

    /// Password reset link template (`{username}`, `{token}`).
    #[arg(long, env = "PASSWORD_RESET_URL_FORMAT")]
    password_reset_url_format: Option<String>,

    /// Steam return URL template (`{token}`).
    #[arg(long, env = "STEAM_REDIRECT_URL_FORMAT")]
    steam_redirect_url_format: Option<String>,

    /// Initial rating mean for new accounts.
    #[arg(long, env = "RATING_DEFAULT_MEAN")]
    rating_default_mean: Option<f64>,

    /// Initial rating deviation for new accounts.
    #[arg(long, env = "RATING_DEFAULT_DEVIATION")]
    rating_default_deviation: Option<f64>,

    /// SMTP host; empty disables delivery and only logs mails.
    #[arg(long, env = "SMTP_HOST", default_value = "")]
    smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Use STARTTLS instead of implicit TLS.
    #[arg(long, env = "SMTP_STARTTLS", default_value_t = true, action = clap::ArgAction::Set)]
    smtp_starttls: bool,

    /// Sender address of lifecycle mails.
    #[arg(long, env = "MAIL_FROM", default_value = "admin@faforever.com")]
    mail_from: String,

    /// Email domains refused for registration and email changes.
    #[arg(long, env = "MAIL_BLACKLISTED_DOMAINS", value_delimiter = ',')]
    mail_blacklisted_domains: Vec<String>,

    /// Steam Web API key.
    #[arg(long, env = "STEAM_API_KEY", default_value = "", hide_env_values = true)]
    steam_api_key: String,

    /// OpenID realm announced to Steam.
    #[arg(long, env = "STEAM_REALM")]
    steam_realm: Option<String>,

    /// Steam app id an account must own to be linked.
    #[arg(long, env = "STEAM_REQUIRED_APP_ID")]
    steam_required_app_id: Option<u32>,
}

impl Args {
    fn account_settings(&self) -> AccountSettings {
        let defaults = AccountSettings::default();
        AccountSettings {
            username_reservation_months: self
                .username_reservation_months
                .unwrap_or(defaults.username_reservation_months),
            min_days_between_username_change: self
                .min_days_between_username_change
                .unwrap_or(defaults.min_days_between_username_change),
            registration_link_lifetime: self
                .registration_link_lifetime_secs
                .map(Duration::seconds)
                .unwrap_or(defaults.registration_link_lifetime),
            password_reset_link_lifetime: self
                .password_reset_link_lifetime_secs
                .map(Duration::seconds)
                .unwrap_or(defaults.password_reset_link_lifetime),
            activation_url_format: self
                .activation_url_format
                .clone()
                .unwrap_or(defaults.activation_url_format),
            password_reset_url_format: self
                .password_reset_url_format
                .clone()
                .unwrap_or(defaults.password_reset_url_format),
            steam_redirect_url_format: self
                .steam_redirect_url_format
                .clone()
                .unwrap_or(defaults.steam_redirect_url_format),
            rating: RatingDefaults {
                mean: self.rating_default_mean.unwrap_or(defaults.rating.mean),
                deviation: self
                    .rating_default_deviation
                    .unwrap_or(defaults.rating.deviation),
            },
        }
    }

    fn mail_settings(&self) -> MailSettings {
        MailSettings {
            blacklisted_domains: self
                .mail_blacklisted_domains
                .iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            ..MailSettings::default()
        }
    }

    fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            use_starttls: self.smtp_starttls,
            from: self.mail_from.clone(),
        }
    }

    fn steam_settings(&self) -> SteamSettings {
        let defaults = SteamSettings::default();
        SteamSettings {
            api_key: self.steam_api_key.clone(),
            realm: self.steam_realm.clone().unwrap_or(defaults.realm),
            required_app_id: self
                .steam_required_app_id
                .unwrap_or(defaults.required_app_id),
            ..defaults
        }
    }
}

/// Log every account change; stands in for downstream consumers.
fn spawn_event_logger(events: &AccountEvents) {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => info!(
                    account_id = event.id,
                    login = %event.login,
                    recent_ip = ?event.recent_ip,
                    "account updated"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "account event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    info!(
        bind_addr = %args.bind_addr,
        max_connections = args.max_connections,
        "starting faf_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    faf_api::migrate(&pool).await?;

    let mail_sender = SmtpMailSender::new(&args.smtp_settings())?;
    let events = AccountEvents::new();
    spawn_event_logger(&events);

    let service = AccountService::new(Collaborators {
        store: Arc::new(PgAccountStore::new(pool.clone())),
        credentials: Arc::new(PgLegacyCredentialStore::new(pool)),
        email: EmailService::new(Arc::new(mail_sender), args.mail_settings()),
        steam: Arc::new(SteamWebGateway::new(args.steam_settings())),
        tokens: ClaimTokenService::new(resolve_claim_secret().as_bytes()),
        events,
        metrics: LifecycleMetrics::new()?,
        settings: args.account_settings(),
    });

    let config = faf_api::config::ApiConfig::new(&args.bind_addr, &args.access_token_secret);
    let state = faf_api::AppState {
        service: Arc::new(service),
        config: config.clone(),
    };
    let app = faf_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
