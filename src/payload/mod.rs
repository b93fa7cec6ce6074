//! # Payload templates
//!
//! Static JSON request bodies live under `<payload_dir>/<service>/`. A
//! template is read fresh on every load and returned exactly as written;
//! dynamic values are injected by the caller afterwards.

use std::fmt::{self, Display};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::error::{HarnessError, Result};

/// Platform services that own a template directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Campaign,
    Household,
    Product,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Campaign, Service::Household, Service::Product];

    pub fn dir_name(self) -> &'static str {
        match self {
            Service::Campaign => "campaign",
            Service::Household => "household",
            Service::Product => "product",
        }
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.dir_name().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown service `{raw}`"))
    }
}

#[derive(Debug, Clone)]
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, service: Service, file_name: &str) -> PathBuf {
        self.root.join(service.dir_name()).join(file_name)
    }

    pub fn load(&self, service: Service, file_name: &str) -> Result<Value> {
        let path = self.path_of(service, file_name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(HarnessError::TemplateNotFound { path });
            }
            Err(err) => return Err(HarnessError::io(path, err)),
        };
        debug!(path = %path.display(), "loaded payload template");
        serde_json::from_str(&raw).map_err(|source| HarnessError::TemplateParse { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped() -> PayloadStore {
        PayloadStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/payloads"))
    }

    #[test]
    fn service_parses_from_directory_name() {
        assert_eq!("campaign".parse::<Service>().unwrap(), Service::Campaign);
        assert_eq!("Household".parse::<Service>().unwrap(), Service::Household);
        assert!("billing".parse::<Service>().is_err());
    }

    #[test]
    fn load_returns_template_literals_unmodified() {
        let doc = shipped().load(Service::Campaign, "create_setup.json").unwrap();

        let details = &doc["CampaignDetails"];
        assert_eq!(details["action"], "draft");
        assert_eq!(details["campaignName"], "");
        assert_eq!(details["startDate"], 0);
        assert_eq!(details["tenantId"], "{{tenantId}}");
        assert!(doc.get("RequestInfo").is_none());
    }

    #[test]
    fn loading_twice_yields_identical_documents() {
        let store = shipped();
        let first = store.load(Service::Campaign, "update_delivery.json").unwrap();
        let second = store.load(Service::Campaign, "update_delivery.json").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_template_is_not_found() {
        let err = shipped().load(Service::Product, "nope.json").unwrap_err();
        match err {
            HarnessError::TemplateNotFound { path } => assert!(path.ends_with("product/nope.json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_template_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("household")).unwrap();
        std::fs::write(dir.path().join("household/broken.json"), "{ not json").unwrap();

        let err = PayloadStore::new(dir.path())
            .load(Service::Household, "broken.json")
            .unwrap_err();
        assert!(matches!(err, HarnessError::TemplateParse { .. }));
    }
}
