use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Every failure a harness step can surface. Nothing is recovered locally:
/// the error aborts the enclosing step and lands in the run report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error("payload template `{}` not found", .path.display())]
    TemplateNotFound { path: PathBuf },
    #[error("payload template `{}` is not valid JSON: {source}", .path.display())]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{step}: unexpected status {status}: {body}")]
    Assertion { step: String, status: u16, body: String },
    #[error("{step}: {message}")]
    Check { step: String, message: String },
    #[error("key `{key}` missing from response: {body}")]
    Extraction { key: String, body: String },
    #[error("label `{0}` not found in ID ledger")]
    LabelNotFound(String),
    #[error("{what} not visible after {attempts} attempt(s)")]
    NotVisible { what: String, attempts: u32 },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("date computation failed: {0}")]
    Clock(String),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn check(step: &str, message: impl Into<String>) -> Self {
        HarnessError::Check {
            step: step.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            HarnessError::Assertion { status, .. } => Some(*status),
            _ => None,
        }
    }
}
