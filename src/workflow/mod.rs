//! # Workflows
//!
//! Multi-step scenarios against the platform. A [`Session`] owns everything
//! a step needs; identifiers produced by one step reach the next through a
//! [`campaign::CampaignContext`] within a run, and through the ID ledger and
//! the output store across runs.

pub mod campaign;
pub mod search;

use serde_json::Value;
use tracing::debug;

use crate::auth::Token;
use crate::config::Config;
use crate::error::Result;
use crate::http::{ApiClient, HttpResponse, RequestInput};
use crate::inject::{apply_dynamic_dates, assign_client_reference_ids, interpolate, template_vars};
use crate::payload::{PayloadStore, Service};
use crate::request_info::{self, RequestInfo};
use crate::storage::OutputStore;

pub use campaign::{CampaignContext, group_by_boundary_type, run_campaign_e2e};
pub use search::{SearchSummary, run_search_flow};

/// Service name the token provider authenticates workflows as.
pub const WORKFLOW_TOKEN_SERVICE: &str = "user";

pub struct Session {
    pub config: Config,
    pub payloads: PayloadStore,
    pub client: ApiClient,
    pub outputs: OutputStore,
}

impl Session {
    /// Authenticate through the token provider and open a session.
    pub fn connect(config: Config) -> Result<Self> {
        let client = ApiClient::builder(&config)
            .service(WORKFLOW_TOKEN_SERVICE)
            .build()?;
        Ok(Self::assemble(config, client))
    }

    pub fn with_token(config: Config, token: Token) -> Result<Self> {
        let client = ApiClient::builder(&config).token(token).build()?;
        Ok(Self::assemble(config, client))
    }

    fn assemble(config: Config, client: ApiClient) -> Self {
        Self {
            payloads: PayloadStore::new(&config.payload_dir),
            outputs: OutputStore::new(&config.output_dir),
            config,
            client,
        }
    }

    /// Load a campaign template with placeholders filled. Write payloads
    /// also get a fresh date window and new client reference IDs.
    pub(crate) fn campaign_payload(&self, file_name: &str, write: bool) -> Result<Value> {
        let mut payload = self.payloads.load(Service::Campaign, file_name)?;
        interpolate(&mut payload, &template_vars(&self.config));
        if write {
            let dates = apply_dynamic_dates(&mut payload)?;
            let references = assign_client_reference_ids(&mut payload);
            debug!(file = %file_name, dates, references, "write payload prepared");
        }
        Ok(payload)
    }

    /// Attach a fresh envelope, post and snapshot the response.
    pub(crate) fn post(&self, step: &str, path: &str, mut payload: Value, query: Vec<(String, String)>) -> Result<HttpResponse> {
        request_info::attach(&mut payload, &RequestInfo::build(self.client.token(), &self.config))?;
        let response = self
            .client
            .send(RequestInput::post(path, payload).with_query(query))?;
        self.outputs.save_snapshot(step, &response)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use serde_json::json;

    use super::*;

    fn session_over(payload_dir: &std::path::Path) -> Session {
        let vars = HashMap::from([
            ("BASE_URL".to_string(), "http://localhost".to_string()),
            ("TENANTID".to_string(), "pg".to_string()),
            ("PAYLOAD_DIR".to_string(), payload_dir.display().to_string()),
        ]);
        Session::with_token(Config::from_map(&vars).unwrap(), Token::new("t")).unwrap()
    }

    #[test]
    fn write_payloads_get_client_reference_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("campaign")).unwrap();
        let template = json!({
            "CampaignDetails": {
                "tenantId": "{{tenantId}}",
                "deliveryRules": [{"clientReferenceId": ""}, {"clientReferenceId": "kept"}]
            }
        });
        fs::write(dir.path().join("campaign/setup.json"), template.to_string()).unwrap();
        let session = session_over(dir.path());

        let write = session.campaign_payload("setup.json", true).unwrap();
        let rules = &write["CampaignDetails"]["deliveryRules"];
        assert_eq!(write["CampaignDetails"]["tenantId"], "pg");
        assert_eq!(rules[0]["clientReferenceId"].as_str().unwrap().len(), 36);
        assert_eq!(rules[1]["clientReferenceId"], "kept");

        let read = session.campaign_payload("setup.json", false).unwrap();
        assert_eq!(read["CampaignDetails"]["deliveryRules"][0]["clientReferenceId"], "");
    }
}
