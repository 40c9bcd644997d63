//! API server configuration.

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8010").
    pub bind_addr: String,
    /// HS256 secret that verifies bearer access tokens.
    pub access_token_secret: String,
}

impl ApiConfig {
    pub fn new(bind_addr: impl Into<String>, access_token_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            access_token_secret: access_token_secret.into(),
        }
    }
}
