#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use campaign_harness::config::Config;
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

pub const FACTORY: &str = "/project-factory/v1/project-type";

/// A fake platform plus a scratch directory for outputs and the ledger.
pub struct Platform {
    pub server: MockServer,
    pub dir: TempDir,
}

impl Platform {
    pub fn start() -> Self {
        Self {
            server: MockServer::start(),
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn config(&self) -> Config {
        let scratch = self.dir.path();
        let vars = HashMap::from([
            ("BASE_URL".to_string(), self.server.base_url()),
            ("USERNAME".to_string(), "auto_user".to_string()),
            ("PASSWORD".to_string(), "secret".to_string()),
            ("CLIENT_AUTH_HEADER".to_string(), "Basic Y2xpZW50Og==".to_string()),
            ("PAYLOAD_DIR".to_string(), concat!(env!("CARGO_MANIFEST_DIR"), "/payloads").to_string()),
            ("OUTPUT_DIR".to_string(), scratch.join("outputs").display().to_string()),
            ("LEDGER_PATH".to_string(), scratch.join("output/ids.txt").display().to_string()),
            ("SEARCH_POLL_ATTEMPTS".to_string(), "3".to_string()),
            ("SEARCH_POLL_DELAY_MS".to_string(), "0".to_string()),
        ]);
        Config::from_map(&vars).expect("test config")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("output/ids.txt")
    }

    pub fn mock_token(&self) -> httpmock::Mock<'_> {
        self.server.mock(|when, then| {
            when.method(POST)
                .path("/user/oauth/token")
                .body_contains("grant_type=password");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"access_token": "tok-123", "token_type": "bearer"}));
        })
    }

    pub fn mock_campaign_search_by_number(&self, number: &str, id: &str) -> httpmock::Mock<'_> {
        let needle = format!("\"campaignNumber\":\"{number}\"");
        let body = json!({"CampaignDetails": [campaign(id, number)]});
        self.server.mock(|when, then| {
            when.method(POST).path(format!("{FACTORY}/search")).body_contains(needle);
            then.status(200).json_body(body);
        })
    }

    pub fn mock_campaign_search_by_id(&self, number: &str, id: &str) -> httpmock::Mock<'_> {
        let needle = format!("\"ids\":[\"{id}\"]");
        let body = json!({"CampaignDetails": [campaign(id, number)]});
        self.server.mock(|when, then| {
            when.method(POST).path(format!("{FACTORY}/search")).body_contains(needle);
            then.status(200).json_body(body);
        })
    }

    /// Searches for identifiers that do not exist, and mapping searches with
    /// an empty project list. Six mocks, one per request.
    pub fn mock_unknown_entity_searches(&self) -> Vec<httpmock::Mock<'_>> {
        let empty = [
            (format!("{FACTORY}/search"), "\"campaignNumber\":\"INVALID-CAMPAIGN-NUMBER-12345\"", json!({"CampaignDetails": []})),
            (
                "/project/v1/_search".to_string(),
                "\"referenceID\":\"INVALID-REFERENCE-ID-12345\"",
                json!({"TotalCount": 0, "Project": []}),
            ),
            (
                "/project/facility/v1/_search".to_string(),
                "\"projectId\":[\"invalid-project-id-12345\"]",
                json!({"ProjectFacilities": []}),
            ),
            (
                "/project/staff/v1/_search".to_string(),
                "\"projectId\":[\"invalid-project-id-12345\"]",
                json!({"ProjectStaff": []}),
            ),
            ("/project/facility/v1/_search".to_string(), "\"projectId\":[]", json!({"ProjectFacilities": []})),
            ("/project/staff/v1/_search".to_string(), "\"projectId\":[]", json!({"ProjectStaff": []})),
        ];
        empty
            .into_iter()
            .map(|(path, needle, body)| {
                self.server.mock(|when, then| {
                    when.method(POST).path(path).body_contains(needle);
                    then.status(200).json_body(body);
                })
            })
            .collect()
    }

    pub fn mock_project_search(&self, number: &str, projects: serde_json::Value) -> httpmock::Mock<'_> {
        let count = projects.as_array().map_or(0, Vec::len);
        let needle = format!("\"referenceID\":\"{number}\"");
        self.server.mock(|when, then| {
            when.method(POST)
                .path("/project/v1/_search")
                .query_param("limit", "100")
                .query_param("offset", "0")
                .query_param("tenantId", "mz")
                .body_contains(needle);
            then.status(200).json_body(json!({"TotalCount": count, "Project": projects}));
        })
    }
}

pub fn campaign(id: &str, number: &str) -> serde_json::Value {
    json!({
        "id": id,
        "campaignNumber": number,
        "campaignName": "Test_Campaign_0badf00d",
        "tenantId": "mz",
        "status": "created"
    })
}

pub fn project(id: &str, number: &str, boundary_type: &str) -> serde_json::Value {
    json!({
        "id": id,
        "tenantId": "mz",
        "referenceID": number,
        "address": {"boundaryType": boundary_type}
    })
}
