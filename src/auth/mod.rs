//! # Authentication
//!
//! Exchanges the configured credentials for a bearer token through the
//! platform's OAuth password grant. Tokens are not cached, refreshed or
//! validated: a rejected token fails the step that used it.

use std::fmt;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{HarnessError, Result};

const TOKEN_PATH: &str = "/user/oauth/token";

/// Opaque bearer token scoped to one named service.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Token(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct TokenProvider<'a> {
    config: &'a Config,
    http: Client,
}

impl<'a> TokenProvider<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            config,
            http: builder.build()?,
        })
    }

    /// Fetch a token for `service`. Every service shares the same credential
    /// set; the name only labels the log line.
    pub fn token(&self, service: &str) -> Result<Token> {
        let credentials = &self.config.credentials;
        let username = credentials
            .username
            .as_deref()
            .ok_or_else(|| HarnessError::Auth("USERNAME is not configured".into()))?;
        let password = credentials
            .password
            .as_deref()
            .ok_or_else(|| HarnessError::Auth("PASSWORD is not configured".into()))?;

        let url = format!("{}{TOKEN_PATH}", self.config.base_url);
        let form = [
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
            ("scope", "read"),
            ("tenantId", self.config.tenant_id.as_str()),
            ("userType", credentials.user_type.as_str()),
        ];

        info!(service = %service, "requesting access token");
        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .form(&form);
        if let Some(header) = credentials.client_auth_header.as_deref() {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if status.as_u16() != 200 {
            return Err(HarnessError::Auth(format!("status {}: {body}", status.as_u16())));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| HarnessError::Auth(format!("unreadable token response: {err}")))?;
        let token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| HarnessError::Auth(format!("no access_token in response: {body}")))?;
        debug!(service = %service, "access token acquired");
        Ok(Token(token))
    }
}
