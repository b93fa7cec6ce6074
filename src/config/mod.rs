//! # Configuration
//!
//! Reads the platform settings (base URL, credentials, tenant, locale, search
//! and boundary defaults, service base paths) from environment variables into
//! a single [`Config`] value. The struct is built once at start-up and passed
//! by reference to every component.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` is not set")]
    Missing(&'static str),
    #[error("`{key}` has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
    #[error("failed to load env file `{path}`: {message}")]
    EnvFile { path: String, message: String },
}

/// Credentials exchanged for a bearer token.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_auth_header: Option<String>,
    pub user_type: String,
}

/// The user the `RequestInfo` envelope claims to act as.
#[derive(Debug, Clone)]
pub struct ActorProfile {
    pub id: i64,
    pub uuid: String,
    pub user_name: String,
    pub name: String,
    pub role_code: String,
    pub role_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchDefaults {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct BoundaryDefaults {
    pub hierarchy_type: String,
    pub boundary_code: String,
    pub boundary_type: String,
}

/// Base paths of the platform services, relative to `base_url`.
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub project_factory: String,
    pub project: String,
    pub project_facility: String,
    pub project_staff: String,
    pub household: String,
    pub product: String,
}

/// How long a search waits for a freshly written entity to become visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub credentials: Credentials,
    pub tenant_id: String,
    pub locale: String,
    pub api_id: String,
    pub actor: ActorProfile,
    pub search: SearchDefaults,
    pub boundary: BoundaryDefaults,
    pub services: ServicePaths,
    pub payload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub poll: PollPolicy,
    pub request_timeout: Option<Duration>,
}

/// A missing `.env` is fine, the variables may come from the shell. A file
/// that exists but cannot be read or parsed is not.
fn dotenv_loaded(outcome: Result<(), dotenvy::Error>) -> Result<(), ConfigError> {
    match outcome {
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ConfigError::EnvFile {
            path: ".env".to_string(),
            message: err.to_string(),
        }),
        Ok(()) => Ok(()),
    }
}

impl Config {
    /// Load `.env` from the working directory (overriding the process
    /// environment, if present) and read the configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv_loaded(dotenvy::dotenv_override().map(drop))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load an explicit env file, then read the configuration.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::from_path_override(path).map_err(|err| ConfigError::EnvFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let base_url = get("BASE_URL").ok_or(ConfigError::Missing("BASE_URL"))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let tenant_id = or("TENANTID", "mz");

        let request_timeout = match get("REQUEST_TIMEOUT_MS") {
            Some(raw) => Some(Duration::from_millis(parse_number("REQUEST_TIMEOUT_MS", &raw)?)),
            None => None,
        };

        Ok(Self {
            credentials: Credentials {
                username: get("USERNAME"),
                password: get("PASSWORD"),
                client_auth_header: get("CLIENT_AUTH_HEADER"),
                user_type: or("USERTYPE", "EMPLOYEE"),
            },
            locale: or("LOCALE", "en_MZ"),
            api_id: or("API_ID", "Rainmaker"),
            actor: ActorProfile {
                id: parse_or(&get, "ACTOR_ID", 31582)?,
                uuid: or("ACTOR_UUID", "4687260d-1b70-4262-b280-31a61534583e"),
                user_name: or("ACTOR_USERNAME", "ACM11"),
                name: or("ACTOR_NAME", "ACM11"),
                role_code: or("ACTOR_ROLE_CODE", "CAMPAIGN_MANAGER"),
                role_name: or("ACTOR_ROLE_NAME", "Campaign Manager"),
            },
            search: SearchDefaults {
                limit: parse_or(&get, "SEARCH_LIMIT", 100)?,
                offset: parse_or(&get, "SEARCH_OFFSET", 0)?,
            },
            boundary: BoundaryDefaults {
                hierarchy_type: or("HIERARCHYTYPE", "ADMIN"),
                boundary_code: or("BOUNDARY_CODE", "MICROPLAN_MO"),
                boundary_type: or("BOUNDARY_TYPE", "COUNTRY"),
            },
            services: ServicePaths {
                project_factory: service_path(or(
                    "SERVICE_PROJECT_FACTORY",
                    "/project-factory/v1/project-type",
                )),
                project: service_path(or("SERVICE_PROJECT", "/project/v1")),
                project_facility: service_path(or("SERVICE_PROJECT_FACILITY", "/project/facility/v1")),
                project_staff: service_path(or("SERVICE_PROJECT_STAFF", "/project/staff/v1")),
                household: service_path(or("SERVICE_HOUSEHOLD", "/household/v1")),
                product: service_path(or("SERVICE_PRODUCT", "/product/v1")),
            },
            payload_dir: PathBuf::from(or("PAYLOAD_DIR", "payloads")),
            output_dir: PathBuf::from(or("OUTPUT_DIR", "data/outputs")),
            ledger_path: PathBuf::from(or("LEDGER_PATH", "output/ids.txt")),
            poll: PollPolicy {
                attempts: parse_or::<u32, _>(&get, "SEARCH_POLL_ATTEMPTS", 30)?.max(1),
                delay: Duration::from_millis(parse_or(&get, "SEARCH_POLL_DELAY_MS", 2000)?),
            },
            request_timeout,
            base_url,
            tenant_id,
        })
    }

    /// Standard pagination query parameters appended to search calls.
    pub fn search_params(&self) -> Vec<(String, String)> {
        vec![
            ("limit".to_string(), self.search.limit.to_string()),
            ("offset".to_string(), self.search.offset.to_string()),
            ("tenantId".to_string(), self.tenant_id.clone()),
        ]
    }
}

fn service_path(raw: String) -> String {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_number(key, &raw),
        None => Ok(default),
    }
}
