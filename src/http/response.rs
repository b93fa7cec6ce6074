use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Raw response as the platform returned it. Status interpretation is left
/// to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    /// 200 OK and 202 Accepted both count: the platform acknowledges most
    /// writes asynchronously.
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 202)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            status_text: String::new(),
            headers: BTreeMap::new(),
            body: body.to_string(),
            duration_ms: 0,
        }
    }

    #[test]
    fn ok_and_accepted_are_success() {
        assert!(response(200, "").is_success());
        assert!(response(202, "").is_success());
        assert!(!response(201, "").is_success());
        assert!(!response(400, "").is_success());
    }

    #[test]
    fn json_parses_body() {
        let parsed = response(200, r#"{"TotalCount": 3}"#).json().unwrap();
        assert_eq!(parsed["TotalCount"], 3);
        assert!(response(200, "<html>").json().is_err());
    }
}
