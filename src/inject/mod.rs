//! # Dynamic values
//!
//! Mutates a loaded payload in place before it is sent: campaign dates are
//! moved into the future, `{{variable}}` placeholders are filled from the
//! configuration and empty client reference IDs receive fresh UUIDs.

use std::collections::HashMap;

use chrono::{DateTime, Local, Months, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Date fields the platform validates, as key paths. `*` walks every
/// element of an array.
const DATE_FIELDS: &[(&[&str], Edge)] = &[
    (&["startDate"], Edge::Start),
    (&["endDate"], Edge::End),
    (&["CampaignDetails", "startDate"], Edge::Start),
    (&["CampaignDetails", "endDate"], Edge::End),
    (&["CampaignDetails", "deliveryRules", "*", "startDate"], Edge::Start),
    (&["CampaignDetails", "deliveryRules", "*", "endDate"], Edge::End),
    (
        &["CampaignDetails", "additionalDetails", "cycleData", "cycleData", "*", "fromDate"],
        Edge::Start,
    ),
    (
        &["CampaignDetails", "additionalDetails", "cycleData", "cycleData", "*", "toDate"],
        Edge::End,
    ),
];

/// Campaign window: tomorrow at local midnight until one calendar month later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn tomorrow<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let tz = now.timezone();
        let midnight = now
            .date_naive()
            .succ_opt()
            .ok_or_else(|| HarnessError::Clock("no calendar day after today".into()))?
            .and_time(NaiveTime::MIN);
        let month_later = midnight
            .checked_add_months(Months::new(1))
            .ok_or_else(|| HarnessError::Clock("end date out of range".into()))?;

        let start = tz
            .from_local_datetime(&midnight)
            .earliest()
            .ok_or_else(|| HarnessError::Clock(format!("{midnight} does not exist locally")))?;
        let end = tz
            .from_local_datetime(&month_later)
            .earliest()
            .ok_or_else(|| HarnessError::Clock(format!("{month_later} does not exist locally")))?;

        Ok(Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        })
    }

    fn encode(&self, edge: Edge, current: &Value) -> Value {
        let instant = match edge {
            Edge::Start => self.start,
            Edge::End => self.end,
        };
        if current.is_string() {
            Value::String(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
        } else {
            Value::from(instant.timestamp_millis())
        }
    }
}

/// Rewrite every recognized date field relative to the local clock.
pub fn apply_dynamic_dates(doc: &mut Value) -> Result<usize> {
    apply_dynamic_dates_at(doc, &Local::now())
}

/// Rewrite every recognized date field relative to `now`. String fields get
/// ISO-8601, everything else Unix milliseconds. Absent fields are skipped.
/// Returns how many fields were set.
pub fn apply_dynamic_dates_at<Tz: TimeZone>(doc: &mut Value, now: &DateTime<Tz>) -> Result<usize> {
    let window = DateWindow::tomorrow(now)?;
    let mut updated = 0;
    for (path, edge) in DATE_FIELDS {
        visit_path(doc, path, &mut |field| {
            *field = window.encode(*edge, field);
            updated += 1;
        });
    }
    Ok(updated)
}

fn visit_path(value: &mut Value, path: &[&str], apply: &mut dyn FnMut(&mut Value)) {
    let Some((segment, rest)) = path.split_first() else {
        apply(value);
        return;
    };

    if *segment == "*" {
        if let Value::Array(items) = value {
            for item in items {
                visit_path(item, rest, apply);
            }
        }
    } else if let Some(child) = value.get_mut(*segment) {
        visit_path(child, rest, apply);
    }
}

/// `<prefix>_<8 hex chars>`, unique enough for campaign names.
pub fn unique_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &id[..8])
}

pub fn client_reference_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fill every empty or null `clientReferenceId` in the tree.
pub fn assign_client_reference_ids(doc: &mut Value) -> usize {
    match doc {
        Value::Object(map) => {
            let mut assigned = 0;
            for (key, value) in map.iter_mut() {
                let empty = value.is_null() || value.as_str().is_some_and(str::is_empty);
                if key == "clientReferenceId" && empty {
                    *value = Value::String(client_reference_id());
                    assigned += 1;
                } else {
                    assigned += assign_client_reference_ids(value);
                }
            }
            assigned
        }
        Value::Array(items) => items.iter_mut().map(assign_client_reference_ids).sum(),
        _ => 0,
    }
}

/// Placeholder values taken from the configuration.
pub fn template_vars(config: &Config) -> HashMap<String, String> {
    HashMap::from([
        ("tenantId".to_string(), config.tenant_id.clone()),
        ("locale".to_string(), config.locale.clone()),
        ("hierarchyType".to_string(), config.boundary.hierarchy_type.clone()),
        ("boundaryCode".to_string(), config.boundary.boundary_code.clone()),
        ("boundaryType".to_string(), config.boundary.boundary_type.clone()),
    ])
}

/// Replace `{{key}}` placeholders in every string leaf. Unknown placeholders
/// are left as they are.
pub fn interpolate(doc: &mut Value, variables: &HashMap<String, String>) {
    match doc {
        Value::String(text) if text.contains("{{") => {
            for (key, value) in variables {
                *text = text.replace(&format!("{{{{{key}}}}}"), value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| interpolate(item, variables)),
        Value::Object(map) => map.values_mut().for_each(|item| interpolate(item, variables)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, NaiveDate};
    use serde_json::json;

    fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .from_local_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 15, 0).unwrap())
            .unwrap()
    }

    fn campaign_doc() -> Value {
        json!({
            "CampaignDetails": {
                "startDate": 0,
                "endDate": 0,
                "deliveryRules": [
                    {"cycleNumber": 1, "startDate": 0, "endDate": 0},
                    {"cycleNumber": 2, "startDate": 0, "endDate": 0}
                ],
                "additionalDetails": {
                    "cycleData": {"cycleData": [{"key": 1, "fromDate": "", "toDate": ""}]}
                }
            }
        })
    }

    #[test]
    fn window_starts_at_next_local_midnight() {
        let now = at(2, 2026, 10, 19, 16);
        let window = DateWindow::tomorrow(&now).unwrap();

        assert_eq!(window.start.to_rfc3339(), "2026-10-19T22:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2026-11-19T22:00:00+00:00");
    }

    #[test]
    fn month_end_is_clamped() {
        let window = DateWindow::tomorrow(&at(0, 2027, 1, 30, 9)).unwrap();
        assert_eq!(window.start.day(), 31);
        assert_eq!(window.end.month(), 2);
        assert_eq!(window.end.day(), 28);
    }

    #[test]
    fn numeric_fields_get_millis_and_string_fields_get_iso() {
        let now = at(0, 2026, 10, 19, 11);
        let mut doc = campaign_doc();

        let updated = apply_dynamic_dates_at(&mut doc, &now).unwrap();

        assert_eq!(updated, 8);
        let details = &doc["CampaignDetails"];
        let start = DateTime::parse_from_rfc3339("2026-10-20T00:00:00Z").unwrap().timestamp_millis();
        let end = DateTime::parse_from_rfc3339("2026-11-20T00:00:00Z").unwrap().timestamp_millis();
        assert_eq!(details["startDate"], start);
        assert_eq!(details["endDate"], end);
        assert_eq!(details["deliveryRules"][1]["startDate"], start);
        assert_eq!(details["deliveryRules"][1]["endDate"], end);
        let cycle = &details["additionalDetails"]["cycleData"]["cycleData"][0];
        assert_eq!(cycle["fromDate"], "2026-10-20T00:00:00.000Z");
        assert_eq!(cycle["toDate"], "2026-11-20T00:00:00.000Z");
    }

    #[test]
    fn dates_are_later_than_now_and_one_month_apart() {
        let now = Local::now();
        let mut doc = json!({"startDate": 0, "endDate": 0});

        apply_dynamic_dates(&mut doc).unwrap();

        let start = doc["startDate"].as_i64().unwrap();
        let end = doc["endDate"].as_i64().unwrap();
        assert!(start > now.timestamp_millis());

        let start_local = Local.timestamp_millis_opt(start).unwrap().naive_local();
        let end_local = Local.timestamp_millis_opt(end).unwrap().naive_local();
        assert_eq!(start_local.checked_add_months(Months::new(1)).unwrap(), end_local);
    }

    #[test]
    fn missing_fields_are_skipped() {
        let mut doc = json!({"Household": {"id": []}});
        let updated = apply_dynamic_dates_at(&mut doc, &at(0, 2026, 10, 19, 8)).unwrap();

        assert_eq!(updated, 0);
        assert_eq!(doc, json!({"Household": {"id": []}}));
    }

    #[test]
    fn reapplying_on_the_same_day_is_stable() {
        let mut first = campaign_doc();
        let mut second = campaign_doc();
        apply_dynamic_dates_at(&mut first, &at(0, 2026, 10, 19, 1)).unwrap();
        apply_dynamic_dates_at(&mut second, &at(0, 2026, 10, 19, 23)).unwrap();
        apply_dynamic_dates_at(&mut second, &at(0, 2026, 10, 19, 23)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn unique_names_differ() {
        let a = unique_name("Test_Campaign");
        let b = unique_name("Test_Campaign");

        assert!(a.starts_with("Test_Campaign_"));
        assert_eq!(a.len(), "Test_Campaign_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn only_empty_client_reference_ids_are_filled() {
        let mut doc = json!({
            "Households": [
                {"clientReferenceId": "", "members": [{"clientReferenceId": null}]},
                {"clientReferenceId": "keep-me"}
            ]
        });

        assert_eq!(assign_client_reference_ids(&mut doc), 2);
        assert_eq!(doc["Households"][1]["clientReferenceId"], "keep-me");
        let generated = doc["Households"][0]["clientReferenceId"].as_str().unwrap();
        assert!(Uuid::parse_str(generated).is_ok());
    }

    #[test]
    fn interpolate_fills_known_placeholders_only() {
        let mut doc = json!({
            "tenantId": "{{tenantId}}",
            "nested": [{"code": "{{boundaryCode}}-{{tenantId}}"}],
            "other": "{{unknown}}",
            "count": 3
        });
        let vars = HashMap::from([
            ("tenantId".to_string(), "mz".to_string()),
            ("boundaryCode".to_string(), "MICROPLAN_MO".to_string()),
        ]);

        interpolate(&mut doc, &vars);

        assert_eq!(
            doc,
            json!({
                "tenantId": "mz",
                "nested": [{"code": "MICROPLAN_MO-mz"}],
                "other": "{{unknown}}",
                "count": 3
            })
        );
    }
}
