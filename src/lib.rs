//! Automated API testing harness for a public-health campaign platform.
//!
//! Builds authenticated JSON requests from on-disk templates, injects dates
//! and identifiers, drives the campaign lifecycle and verifies it through the
//! platform's search endpoints.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod inject;
pub mod ledger;
pub mod payload;
pub mod request_info;
pub mod search;
pub mod storage;
pub mod testing;
pub mod workflow;

pub use error::{HarnessError, Result};
