//! Integration tests: build the router over the in-memory store and fake
//! collaborators, then drive the `/users` endpoints with `oneshot`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use faf_api::{AppState, config::ApiConfig};
use faf_core::accounts::AccountError;
use faf_core::accounts::events::AccountEvents;
use faf_core::accounts::memory::{MemoryAccountStore, MemoryCredentialStore};
use faf_core::accounts::metrics::LifecycleMetrics;
use faf_core::accounts::service::{AccountService, Collaborators};
use faf_core::auth::jwt::generate_access_token;
use faf_core::auth::password::{hash_password, verify_password};
use faf_core::auth::tokens::ClaimTokenService;
use faf_core::email::{EmailService, MailSender};
use faf_core::models::account::{Account, NewAccount};
use faf_core::models::auth::{
    ROLE_MODERATOR, ROLE_USER, SCOPE_CREATE_USER, SCOPE_WRITE_ACCOUNT_DATA,
};
use faf_core::settings::{AccountSettings, MailSettings};
use faf_core::steam::{SteamGateway, steam_id_from_params};
use tower::ServiceExt;

const ACCESS_SECRET: &str = "access-test-secret";

#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

impl Outbox {
    fn last_body(&self) -> String {
        self.0.lock().unwrap().last().cloned().expect("a mail was sent")
    }
}

#[async_trait]
impl MailSender for Outbox {
    async fn send_mail(&self, _to: &str, _subject: &str, body: &str) -> Result<(), AccountError> {
        self.0.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

struct FakeSteam;

#[async_trait]
impl SteamGateway for FakeSteam {
    fn login_url(&self, return_to: &str) -> Result<String, AccountError> {
        Ok(format!("https://steam.test/login?return_to={return_to}"))
    }

    async fn verify_login_redirect(
        &self,
        params: &[(String, String)],
    ) -> Result<String, AccountError> {
        steam_id_from_params(params)
    }

    async fn owns_game(&self, steam_id: &str) -> Result<bool, AccountError> {
        Ok(steam_id != "76561198000000099")
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryAccountStore>,
    outbox: Arc<Outbox>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryAccountStore::new());
        let outbox = Arc::new(Outbox::default());
        let service = AccountService::new(Collaborators {
            store: store.clone(),
            credentials: Arc::new(MemoryCredentialStore::new()),
            email: EmailService::new(
                outbox.clone(),
                MailSettings {
                    activation_body: "{url}".into(),
                    password_reset_body: "{url}".into(),
                    ..MailSettings::default()
                },
            ),
            steam: Arc::new(FakeSteam),
            tokens: ClaimTokenService::new(b"claim-test-secret"),
            events: AccountEvents::new(),
            metrics: LifecycleMetrics::new().unwrap(),
            settings: AccountSettings {
                activation_url_format: "{token}".into(),
                password_reset_url_format: "{token}".into(),
                steam_redirect_url_format: "{token}".into(),
                ..AccountSettings::default()
            },
        });
        let state = AppState {
            service: Arc::new(service),
            config: ApiConfig::new("127.0.0.1:0", ACCESS_SECRET),
        };
        Self {
            router: faf_api::router(state),
            store,
            outbox,
        }
    }

    fn seed(&self, login: &str, email: &str, password: &str) -> Account {
        self.store
            .insert_account(NewAccount {
                login: login.into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                recent_ip: "127.0.0.1".into(),
            })
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.expect("request")
    }
}

fn bearer(account_id: Option<i64>, roles: &[&str], scopes: &[&str]) -> String {
    let token = generate_access_token(
        account_id,
        roles,
        scopes,
        Duration::hours(1),
        ACCESS_SECRET.as_bytes(),
    )
    .unwrap();
    format!("Bearer {token}")
}

fn user_token(account: &Account) -> String {
    bearer(Some(account.id), &[ROLE_USER], &[SCOPE_WRITE_ACCOUNT_DATA])
}

fn form_post(uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

async fn text_body(resp: axum::response::Response) -> String {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn register_and_activate_over_http() {
    let app = TestApp::new();
    let client = bearer(None, &[], &[SCOPE_CREATE_USER]);

    let resp = app
        .send(form_post(
            "/users/register",
            Some(&client),
            "username=Player1&email=p1%40example.com",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let token = app.outbox.last_body();
    let mut request = form_post(
        "/users/activate",
        None,
        &format!("token={token}&password=secret"),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
    let resp = app.send(request).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app.store.account_count(), 1);
    let account = app.store.account(1).unwrap();
    assert_eq!(account.login, "Player1");
    assert_eq!(account.recent_ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn register_requires_token_and_scope() {
    let app = TestApp::new();
    let body = "username=Player1&email=p1%40example.com";

    let resp = app.send(form_post("/users/register", None, body)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let wrong_scope = bearer(None, &[], &[SCOPE_WRITE_ACCOUNT_DATA]);
    let resp = app
        .send(form_post("/users/register", Some(&wrong_scope), body))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn register_by_logged_in_user_is_already_registered() {
    let app = TestApp::new();
    let token = bearer(Some(1), &[ROLE_USER], &[SCOPE_CREATE_USER]);

    let resp = app
        .send(form_post(
            "/users/register",
            Some(&token),
            "username=Player1&email=p1%40example.com",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(resp).await;
    assert_eq!(json["errors"][0]["code"], "100");
}

#[tokio::test]
async fn business_rejection_has_error_list_body() {
    let app = TestApp::new();
    let client = bearer(None, &[], &[SCOPE_CREATE_USER]);

    let resp = app
        .send(form_post(
            "/users/register",
            Some(&client),
            "username=1bad&email=p1%40example.com",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_body(resp).await;
    let errors = json["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "101");
    assert_eq!(errors[0]["title"], "Invalid username");
    assert!(errors[0]["detail"].as_str().unwrap().contains("1bad"));
}

#[tokio::test]
async fn activate_with_garbage_token_is_token_invalid() {
    let app = TestApp::new();
    let resp = app
        .send(form_post("/users/activate", None, "token=nope&password=x"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["errors"][0]["code"], "111");
    assert_eq!(app.store.account_count(), 0);
}

#[tokio::test]
async fn change_password_requires_user_role_and_scope() {
    let app = TestApp::new();
    let account = app.seed("Player1", "p1@example.com", "old");
    let body = "currentPassword=old&newPassword=new";

    let no_role = bearer(Some(account.id), &[], &[SCOPE_WRITE_ACCOUNT_DATA]);
    let resp = app
        .send(form_post("/users/changePassword", Some(&no_role), body))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send(form_post(
            "/users/changePassword",
            Some(&user_token(&account)),
            body,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = app.store.account(account.id).unwrap();
    assert!(verify_password("new", &stored.password_hash).unwrap());
}

#[tokio::test]
async fn change_username_uses_forwarded_address() {
    let app = TestApp::new();
    let account = app.seed("Player1", "p1@example.com", "pw");

    let mut request = form_post(
        "/users/changeUsername",
        Some(&user_token(&account)),
        "newUsername=Renamed",
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.4, 10.0.0.1".parse().unwrap());
    let resp = app.send(request).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = app.store.account(account.id).unwrap();
    assert_eq!(stored.login, "Renamed");
    assert_eq!(stored.recent_ip.as_deref(), Some("198.51.100.4"));
}

#[tokio::test]
async fn deleted_account_token_is_token_invalid() {
    let app = TestApp::new();
    let resp = app
        .send(form_post(
            "/users/changeEmail",
            Some(&bearer(Some(77), &[ROLE_USER], &[SCOPE_WRITE_ACCOUNT_DATA])),
            "currentPassword=pw&newEmail=new%40example.com",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["errors"][0]["code"], "111");
}

#[tokio::test]
async fn force_change_username_requires_moderator() {
    let app = TestApp::new();
    let target = app.seed("Offensive", "o@example.com", "pw");
    let uri = format!("/users/{}/forceChangeUsername", target.id);

    let resp = app
        .send(form_post(&uri, Some(&user_token(&target)), "newUsername=Clean"))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let moderator = bearer(Some(999), &[ROLE_MODERATOR], &[SCOPE_WRITE_ACCOUNT_DATA]);
    let resp = app
        .send(form_post(&uri, Some(&moderator), "newUsername=Clean"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.store.account(target.id).unwrap().login, "Clean");
}

#[tokio::test]
async fn password_reset_over_http() {
    let app = TestApp::new();
    let account = app.seed("Player1", "p1@example.com", "old");

    let resp = app
        .send(form_post(
            "/users/requestPasswordReset",
            None,
            "identifier=p1%40example.com",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let token = app.outbox.last_body();
    let resp = app
        .send(form_post(
            "/users/performPasswordReset",
            None,
            &format!("token={token}&newPassword=fresh"),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = app.store.account(account.id).unwrap();
    assert!(verify_password("fresh", &stored.password_hash).unwrap());

    let resp = app
        .send(form_post(
            "/users/requestPasswordReset",
            None,
            "identifier=nobody",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["errors"][0]["code"], "110");
}

async fn steam_link_token(app: &TestApp, account: &Account) -> String {
    let resp = app
        .send(form_post(
            "/users/buildSteamLinkUrl",
            Some(&user_token(account)),
            "callbackUrl=https%3A%2F%2Fwww.example.com%2Fdone",
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    json["steamUrl"]
        .as_str()
        .unwrap()
        .strip_prefix("https://steam.test/login?return_to=")
        .unwrap()
        .to_string()
}

fn link_request(token: &str, steam_id: &str) -> Request<Body> {
    let uri = format!(
        "/users/linkToSteam?token={token}&openid.mode=id_res&openid.claimed_id=https%3A%2F%2Fsteamcommunity.com%2Fopenid%2Fid%2F{steam_id}"
    );
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn steam_link_redirects_to_callback() {
    let app = TestApp::new();
    let account = app.seed("Player1", "p1@example.com", "pw");
    let token = steam_link_token(&app, &account).await;

    let resp = app.send(link_request(&token, "76561198000000001")).await;
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers()[header::LOCATION],
        "https://www.example.com/done"
    );
    assert_eq!(
        app.store.account(account.id).unwrap().steam_id.as_deref(),
        Some("76561198000000001")
    );
}

#[tokio::test]
async fn failed_steam_link_appends_errors_to_callback() {
    let app = TestApp::new();
    let account = app.seed("Player1", "p1@example.com", "pw");
    let token = steam_link_token(&app, &account).await;

    let resp = app.send(link_request(&token, "76561198000000099")).await;
    assert!(resp.status().is_redirection());

    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    let url = url::Url::parse(location).unwrap();
    let errors = url
        .query_pairs()
        .find(|(k, _)| k == "errors")
        .map(|(_, v)| v.into_owned())
        .expect("errors parameter");
    let errors: serde_json::Value = serde_json::from_str(&errors).unwrap();
    assert_eq!(errors[0]["code"], "114");
    assert!(app.store.account(account.id).unwrap().steam_id.is_none());
}

#[tokio::test]
async fn metrics_endpoint_exposes_counters() {
    let app = TestApp::new();
    let client = bearer(None, &[], &[SCOPE_CREATE_USER]);
    app.send(form_post(
        "/users/register",
        Some(&client),
        "username=Player1&email=p1%40example.com",
    ))
    .await;

    let resp = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = text_body(resp).await;
    assert!(text.contains("user_registrations_count{step=\"registration\"} 1"));
}
