//! # Search helper
//!
//! Generic search-by-ID against any `_search` endpoint whose payload has a
//! single entity key, plus bounded polling for reads that follow a write.

use std::thread;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{Config, PollPolicy};
use crate::error::{HarnessError, Result};
use crate::http::{ApiClient, HttpResponse, RequestInput};
use crate::inject::{interpolate, template_vars};
use crate::payload::{PayloadStore, Service};
use crate::request_info::{self, RequestInfo};
use crate::testing::expect_success;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub service: Service,
    pub payload_file: String,
    pub endpoint: String,
    pub response_key: String,
    pub entity_id: String,
}

impl SearchQuery {
    pub fn household(entity_id: impl Into<String>, config: &Config) -> Self {
        Self {
            service: Service::Household,
            payload_file: "search_household.json".to_string(),
            endpoint: format!("{}/_search", config.services.household),
            response_key: "Households".to_string(),
            entity_id: entity_id.into(),
        }
    }

    pub fn product(entity_id: impl Into<String>, config: &Config) -> Self {
        Self {
            service: Service::Product,
            payload_file: "search_product.json".to_string(),
            endpoint: format!("{}/_search", config.services.product),
            response_key: "Product".to_string(),
            entity_id: entity_id.into(),
        }
    }

    /// Preset by service. Campaign searches have their own workflow steps.
    pub fn for_service(service: Service, entity_id: impl Into<String>, config: &Config) -> Result<Self> {
        match service {
            Service::Household => Ok(Self::household(entity_id, config)),
            Service::Product => Ok(Self::product(entity_id, config)),
            Service::Campaign => Err(HarnessError::Usage(
                "campaign searches run through the campaign workflow".into(),
            )),
        }
    }
}

/// Search one entity by ID and return `response[response_key]`.
pub fn search_entity(
    client: &ApiClient,
    config: &Config,
    payloads: &PayloadStore,
    query: &SearchQuery,
) -> Result<Value> {
    let mut payload = payloads.load(query.service, &query.payload_file)?;
    interpolate(&mut payload, &template_vars(config));
    set_entity_id(&mut payload, &query.entity_id)?;
    request_info::attach(&mut payload, &RequestInfo::build(client.token(), config))?;
    debug!(endpoint = %query.endpoint, payload = %payload, "search payload ready");

    let request = RequestInput::post(&query.endpoint, payload).with_query(config.search_params());
    let response = client.send(request)?;
    let step = format!("{} search", query.service);
    let mut body = expect_success(&step, &response)?;

    let found = body
        .get_mut(&query.response_key)
        .map(Value::take)
        .ok_or_else(|| HarnessError::Extraction {
            key: query.response_key.clone(),
            body: response.body.clone(),
        })?;
    info!(service = %query.service, id = %query.entity_id, "search completed");
    Ok(found)
}

/// `payload[<first entity key>].id = [entity_id]`, skipping any envelope.
fn set_entity_id(payload: &mut Value, entity_id: &str) -> Result<()> {
    let entity = payload
        .as_object_mut()
        .and_then(|root| {
            root.iter_mut()
                .find(|(key, value)| key.as_str() != "RequestInfo" && value.is_object())
                .map(|(_, value)| value)
        })
        .and_then(Value::as_object_mut)
        .ok_or_else(|| HarnessError::Usage("search payload has no entity object".into()))?;
    entity.insert("id".to_string(), json!([entity_id]));
    Ok(())
}

/// Repeat `search` until it succeeds and `check` accepts the parsed body.
///
/// Sleeps `policy.delay` between attempts, never after the last one.
pub fn poll_until<S, C>(what: &str, policy: PollPolicy, mut search: S, check: C) -> Result<(HttpResponse, Value)>
where
    S: FnMut() -> Result<HttpResponse>,
    C: Fn(&Value) -> bool,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let response = search()?;
        if response.is_success() {
            let body = response.json().unwrap_or(Value::Null);
            if check(&body) {
                info!(what = %what, attempt, "visible");
                return Ok((response, body));
            }
        }

        if attempt < attempts {
            warn!(what = %what, attempt, attempts, status = response.status, "not visible yet, retrying");
            thread::sleep(policy.delay);
        }
    }
    Err(HarnessError::NotVisible {
        what: what.to_string(),
        attempts,
    })
}
