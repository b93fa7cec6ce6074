use std::collections::BTreeMap;
use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{Token, TokenProvider};
use crate::config::Config;
use crate::error::{HarnessError, Result};

use super::request::{HttpMethod, RequestInput};
use super::response::HttpResponse;

/// Authenticated client bound to the platform base URL.
pub struct ApiClient {
    base_url: String,
    token: Token,
    http: Client,
}

pub struct ApiClientBuilder<'a> {
    config: &'a Config,
    token: Option<Token>,
    service: Option<String>,
}

impl<'a> ApiClientBuilder<'a> {
    pub fn token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Resolve the token through the token provider for this service when no
    /// explicit token is given.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let token = match (self.token, self.service) {
            (Some(token), _) => token,
            (None, Some(service)) => TokenProvider::new(self.config)?.token(&service)?,
            (None, None) => {
                return Err(HarnessError::Usage(
                    "either a token or a service name must be provided".into(),
                ));
            }
        };

        let mut builder = Client::builder();
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(ApiClient {
            base_url: self.config.base_url.clone(),
            token,
            http: builder.build()?,
        })
    }
}

impl ApiClient {
    pub fn builder(config: &Config) -> ApiClientBuilder<'_> {
        ApiClientBuilder {
            config,
            token: None,
            service: None,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn get(&self, path: &str) -> Result<HttpResponse> {
        self.send(RequestInput::new(HttpMethod::Get, path))
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<HttpResponse> {
        self.send(RequestInput::post(path, body.clone()))
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<HttpResponse> {
        self.send(RequestInput::new(HttpMethod::Put, path).with_body(body.clone()))
    }

    pub fn delete(&self, path: &str) -> Result<HttpResponse> {
        self.send(RequestInput::new(HttpMethod::Delete, path))
    }

    pub fn send(&self, request: RequestInput) -> Result<HttpResponse> {
        let raw_url = format!("{}{}", self.base_url, request.path);
        let mut url = reqwest::Url::parse(&raw_url).map_err(|e| HarnessError::InvalidUrl {
            url: raw_url.clone(),
            message: e.to_string(),
        })?;

        if !request.query.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                query_pairs.append_pair(key, value);
            }
        }

        info!(method = %request.method, path = %request.path, "sending request");
        let mut req_builder = self
            .http
            .request(request.method.into(), url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(self.token.as_str());
        if let Some(body) = &request.body {
            req_builder = req_builder.body(serde_json::to_vec(body)?);
        }

        let started = Instant::now();
        let response = req_builder.send()?;
        let elapsed = started.elapsed().as_millis() as u64;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = response.text()?;
        debug!(status = status.as_u16(), elapsed_ms = elapsed, "response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            body,
            duration_ms: elapsed,
        })
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}
