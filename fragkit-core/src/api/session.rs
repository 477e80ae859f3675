//! Immutable authentication state passed into every API call.
//!
//! Token refresh never mutates a session in place; callers get a new value
//! back from [`FragmentsApi::refresh_session`](super::FragmentsApi::refresh_session).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// OAuth2 client registered on the server
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub(crate) client_secret: String,
}

impl OAuthClient {
    pub fn new<I: Into<String>, S: Into<String>>(client_id: I, client_secret: S) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiration_date: DateTime<Utc>,
}

/// Body of a successful `/o/oauth2/token` response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    600
}

impl TokenResponse {
    pub(crate) fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiration_date: now + Duration::seconds(self.expires_in),
        }
    }
}

/// Which `Authorization` scheme an endpoint wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Legacy JSON web services
    Basic,
    /// Newer endpoints: OAuth bearer token when present, Basic otherwise
    PreferBearer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Base URL without trailing slash
    pub host: String,
    pub basic: Option<BasicCredentials>,
    pub oauth_client: Option<OAuthClient>,
    pub oauth: Option<OAuthToken>,
    pub company_id: Option<String>,
}

impl Session {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            basic: None,
            oauth_client: None,
            oauth: None,
            company_id: None,
        }
    }

    pub fn with_basic(mut self, credentials: BasicCredentials) -> Self {
        self.basic = Some(credentials);
        self
    }

    pub fn with_token(mut self, token: OAuthToken) -> Self {
        self.oauth = Some(token);
        self
    }

    pub fn without_token(mut self) -> Self {
        self.oauth = None;
        self
    }

    /// True when a token is held and `now` is past its expiration date
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.oauth
            .as_ref()
            .map(|token| now > token.expiration_date)
            .unwrap_or(false)
    }

    /// True when no token is held but one could be acquired
    pub fn can_acquire_token(&self) -> bool {
        self.oauth.is_none() && self.oauth_client.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path.trim_start_matches('/'))
    }

    pub fn authorization(&self, scheme: AuthScheme) -> Option<String> {
        let basic = || self.basic.as_ref().map(BasicCredentials::header_value);
        match scheme {
            AuthScheme::Basic => basic(),
            AuthScheme::PreferBearer => self
                .oauth
                .as_ref()
                .map(|token| format!("Bearer {}", token.access_token))
                .or_else(basic),
        }
    }

    /// User shown in status output
    pub fn user_label(&self) -> String {
        match (&self.basic, &self.oauth_client) {
            (Some(basic), _) => basic.username.clone(),
            (None, Some(client)) => format!("oauth:{}", client.client_id),
            (None, None) => "anonymous".to_string(),
        }
    }
}
