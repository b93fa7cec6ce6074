use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::http::HttpResponse;

const CAMPAIGN_OUTPUT_FILE: &str = "campaign_ids.json";
const SNAPSHOT_FILE: &str = "latest_response.json";

/// What the campaign workflow leaves behind for the search workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignOutput {
    pub campaign_id: String,
    pub campaign_number: String,
    pub campaign_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_by_boundary_type: Option<BTreeMap<String, Vec<String>>>,
}

impl CampaignOutput {
    pub fn project_ids(&self) -> Vec<String> {
        self.projects_by_boundary_type
            .iter()
            .flat_map(|groups| groups.values().flatten().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub step: String,
    pub response: HttpResponse,
}

#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_campaign_output(&self, output: &CampaignOutput) -> Result<()> {
        self.write_json(CAMPAIGN_OUTPUT_FILE, output)
    }

    pub fn load_campaign_output(&self) -> Result<Option<CampaignOutput>> {
        self.read_json(CAMPAIGN_OUTPUT_FILE)
    }

    pub fn save_snapshot(&self, step: &str, response: &HttpResponse) -> Result<()> {
        self.write_json(
            SNAPSHOT_FILE,
            &ResponseSnapshot {
                step: step.to_string(),
                response: response.clone(),
            },
        )
    }

    pub fn load_snapshot(&self) -> Result<Option<ResponseSnapshot>> {
        self.read_json(SNAPSHOT_FILE)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;
        let file = self.dir.join(name);
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(&file, raw).map_err(|e| HarnessError::io(file, e))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<Option<T>> {
        let file = self.dir.join(name);
        if !file.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&file).map_err(|e| HarnessError::io(&file, e))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}
