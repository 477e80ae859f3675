//! Configuration for the remote server connection
//!
//! A [`ServerConfig`] is loaded from a JSON file, from `FRAGKIT_*` environment
//! variables, or both (environment wins), and turned into an immutable
//! [`Session`] for API calls.

use crate::api::session::{BasicCredentials, OAuthClient, Session};
use crate::{FragkitError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the project directory
pub const CONFIG_FILE: &str = ".fragkit.json";

/// Connection and target settings for a remote server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://localhost:8080`
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub company_id: Option<String>,
    /// Site the fragments are imported into / exported from
    pub group_id: Option<String>,
    /// Target company for deployment descriptors (`*` for every company)
    pub company_web_id: Option<String>,
    /// Target site key for deployment descriptors
    pub group_key: Option<String>,
}

impl ServerConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FragkitError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| FragkitError::config(format!("Invalid {}: {e}", path.display())))
    }

    /// Load configuration from `FRAGKIT_*` environment variables only
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Override fields with any `FRAGKIT_*` environment variables that are set
    pub fn merge_env(self) -> Self {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    fn merge_vars<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        if let Some(host) = var("FRAGKIT_HOST") {
            self.host = host;
        }
        let overrides: [(&str, &mut Option<String>); 8] = [
            ("FRAGKIT_USERNAME", &mut self.username),
            ("FRAGKIT_PASSWORD", &mut self.password),
            ("FRAGKIT_OAUTH_CLIENT_ID", &mut self.oauth_client_id),
            ("FRAGKIT_OAUTH_CLIENT_SECRET", &mut self.oauth_client_secret),
            ("FRAGKIT_COMPANY_ID", &mut self.company_id),
            ("FRAGKIT_GROUP_ID", &mut self.group_id),
            ("FRAGKIT_COMPANY_WEB_ID", &mut self.company_web_id),
            ("FRAGKIT_GROUP_KEY", &mut self.group_key),
        ];
        for (name, field) in overrides {
            if let Some(value) = var(name) {
                *field = Some(value);
            }
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(FragkitError::config("host is required"));
        }
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(FragkitError::config(format!(
                "host must start with http:// or https://, got {}",
                self.host
            )));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(FragkitError::config(
                "username and password must be provided together",
            ));
        }
        if self.oauth_client_id.is_some() != self.oauth_client_secret.is_some() {
            return Err(FragkitError::config(
                "OAuth client id and secret must be provided together",
            ));
        }
        if self.username.is_none() && self.oauth_client_id.is_none() {
            return Err(FragkitError::config(
                "either basic credentials or an OAuth client is required",
            ));
        }
        Ok(())
    }

    /// Group id, or a configuration error when it was never set
    pub fn require_group_id(&self) -> Result<&str> {
        self.group_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FragkitError::config("groupId is required"))
    }

    /// Build the session used for API calls
    pub fn to_session(&self) -> Result<Session> {
        self.validate()?;

        let basic = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(BasicCredentials::new(username, password)),
            _ => None,
        };
        let oauth_client = match (&self.oauth_client_id, &self.oauth_client_secret) {
            (Some(id), Some(secret)) => Some(OAuthClient::new(id, secret)),
            _ => None,
        };

        Ok(Session {
            host: self.host.trim_end_matches('/').to_string(),
            basic,
            oauth_client,
            oauth: None,
            company_id: self.company_id.clone(),
        })
    }
}
