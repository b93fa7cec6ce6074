//! # Assertions & run report
//!
//! Status and presence checks applied to platform responses, plus the
//! per-step report the runner prints or writes to disk.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{HarnessError, Result};
use crate::http::HttpResponse;

/// Accept 200 or 202 and return the parsed body (`Null` when empty).
pub fn expect_success(step: &str, response: &HttpResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(HarnessError::Assertion {
            step: step.to_string(),
            status: response.status,
            body: response.body.clone(),
        });
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    response.json().map_err(|_| {
        HarnessError::check(step, format!("response is not JSON: {}", response.body))
    })
}

/// Presence check by JSON pointer (`/CampaignDetails/id`).
pub fn require_field<'v>(step: &str, value: &'v Value, pointer: &str) -> Result<&'v Value> {
    value
        .pointer(pointer)
        .filter(|found| !found.is_null())
        .ok_or_else(|| HarnessError::check(step, format!("missing `{pointer}` in response")))
}

/// Like [`require_field`] but the value must be a non-empty string.
pub fn require_str(step: &str, value: &Value, pointer: &str) -> Result<String> {
    require_field(step, value, pointer)?
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HarnessError::check(step, format!("`{pointer}` is not a non-empty string")))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub workflow: String,
    pub step: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<StepResult>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one step, record its outcome and hand the result back unchanged.
    pub fn step<T>(&mut self, workflow: &str, step: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        info!(workflow = %workflow, step = %step, "step started");
        let started = Instant::now();
        let outcome = run();
        let duration_ms = started.elapsed().as_millis() as u64;

        let (passed, status, message) = match &outcome {
            Ok(_) => (true, None, "ok".to_string()),
            Err(err) => {
                error!(workflow = %workflow, step = %step, error = %err, "step failed");
                (false, err.status(), err.to_string())
            }
        };
        self.push(StepResult {
            workflow: workflow.to_string(),
            step: step.to_string(),
            passed,
            status,
            duration_ms,
            message,
        });
        outcome
    }

    /// Record a step that was not run, e.g. a search with no inputs.
    pub fn skip(&mut self, workflow: &str, step: &str, reason: &str) {
        info!(workflow = %workflow, step = %step, reason = %reason, "step skipped");
        self.push(StepResult {
            workflow: workflow.to_string(),
            step: step.to_string(),
            passed: true,
            status: None,
            duration_ms: 0,
            message: format!("skipped: {reason}"),
        });
    }

    fn push(&mut self, result: StepResult) {
        self.total += 1;
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.duration_ms += result.duration_ms;
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn to_text(&self) -> String {
        let mut lines: Vec<String> = self
            .results
            .iter()
            .map(|r| {
                let mark = if r.passed { "PASS" } else { "FAIL" };
                format!("[{mark}] {} / {} ({} ms) {}", r.workflow, r.step, r.duration_ms, r.message)
            })
            .collect();
        lines.push(format!(
            "{} step(s): {} passed, {} failed in {} ms",
            self.total, self.passed, self.failed, self.duration_ms
        ));
        lines.join("\n")
    }
}
