//! Read-side checks over a campaign created by an earlier run.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{HarnessError, Result};
use crate::ledger::IdLedger;
use crate::search::poll_until;
use crate::testing::{RunReport, expect_success, require_field};

use super::Session;
use super::campaign::{campaign_listed, search_campaign, search_project, search_project_facility, search_project_staff};

pub const WORKFLOW: &str = "search";

const UNKNOWN_CAMPAIGN_NUMBER: &str = "INVALID-CAMPAIGN-NUMBER-12345";
const UNKNOWN_REFERENCE_ID: &str = "INVALID-REFERENCE-ID-12345";
const UNKNOWN_PROJECT_ID: &str = "invalid-project-id-12345";

const CAMPAIGN_FIELDS: &[&str] = &["/id", "/campaignNumber", "/campaignName", "/tenantId", "/status"];
const PROJECT_FIELDS: &[&str] = &["/id", "/tenantId", "/referenceID", "/address/boundaryType"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub campaign_id: String,
    pub campaign_number: String,
    pub project_total_count: u64,
    pub project_ids: Vec<String>,
    pub facility_count: Option<usize>,
    pub staff_count: Option<usize>,
}

struct Target {
    campaign_id: String,
    campaign_number: String,
    stored_project_ids: Vec<String>,
}

/// Output file first; the ledger covers runs that only left IDs behind.
fn locate_target(session: &Session, ledger: &dyn IdLedger) -> Result<Target> {
    if let Some(output) = session.outputs.load_campaign_output()? {
        return Ok(Target {
            stored_project_ids: output.project_ids(),
            campaign_id: output.campaign_id,
            campaign_number: output.campaign_number,
        });
    }

    warn!(dir = %session.outputs.dir().display(), "no campaign output, falling back to ID ledger");
    Ok(Target {
        campaign_id: ledger.lookup("Campaign ID")?,
        campaign_number: ledger.lookup("Campaign Number")?,
        stored_project_ids: Vec::new(),
    })
}

fn string_ids(projects: &[Value]) -> Vec<String> {
    projects
        .iter()
        .filter_map(|project| project.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn require_fields(step: &str, entity: &Value, pointers: &[&str]) -> Result<()> {
    for pointer in pointers {
        require_field(step, entity, pointer)?;
    }
    Ok(())
}

/// `CampaignDetails` as a slice of campaigns, whether the platform sent a
/// list or a single object.
fn campaigns(body: &Value) -> &[Value] {
    match body.get("CampaignDetails") {
        Some(Value::Array(list)) => list.as_slice(),
        Some(single @ Value::Object(_)) => std::slice::from_ref(single),
        _ => &[],
    }
}

fn array_len(step: &str, body: &Value, pointer: &str) -> Result<usize> {
    require_field(step, body, pointer)?
        .as_array()
        .map(Vec::len)
        .ok_or_else(|| HarnessError::check(step, format!("`{pointer}` is not a list")))
}

pub fn run_search_flow(session: &Session, ledger: &dyn IdLedger, report: &mut RunReport) -> Result<SearchSummary> {
    let target = report.step(WORKFLOW, "locate campaign", || locate_target(session, ledger))?;
    let number = target.campaign_number.as_str();
    let id = target.campaign_id.as_str();

    report.step(WORKFLOW, "search campaign by number", || {
        let (_, body) = poll_until(
            &format!("campaign {number}"),
            session.config.poll,
            || search_campaign(session, Some(number), None),
            |body| campaign_listed(body, "campaignNumber", number),
        )?;
        campaigns(&body)
            .iter()
            .try_for_each(|campaign| require_fields("search campaign by number", campaign, CAMPAIGN_FIELDS))
    })?;

    report.step(WORKFLOW, "search campaign by id", || {
        poll_until(
            &format!("campaign {id}"),
            session.config.poll,
            || search_campaign(session, None, Some(id)),
            |body| campaign_listed(body, "id", id),
        )
        .map(drop)
    })?;

    let (total, found_ids) = report.step(WORKFLOW, "search project", || {
        const STEP: &str = "search project";
        let body = expect_success(STEP, &search_project(session, number)?)?;
        let total = require_field(STEP, &body, "/TotalCount")?.as_u64().unwrap_or(0);
        let projects = require_field(STEP, &body, "/Project")?
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default();

        for project in projects {
            require_fields(STEP, project, PROJECT_FIELDS)?;
        }
        if let Some(stray) = projects.iter().find(|p| p["referenceID"] != number) {
            return Err(HarnessError::check(
                STEP,
                format!("project referenceID {} does not match {number}", stray["referenceID"]),
            ));
        }
        Ok((total, string_ids(projects)))
    })?;

    let project_ids = if target.stored_project_ids.is_empty() {
        found_ids
    } else {
        target.stored_project_ids
    };

    let mut summary = SearchSummary {
        campaign_id: id.to_string(),
        campaign_number: number.to_string(),
        project_total_count: total,
        project_ids,
        facility_count: None,
        staff_count: None,
    };

    if summary.project_ids.is_empty() {
        report.skip(WORKFLOW, "search project facility", "no projects");
        report.skip(WORKFLOW, "search project staff", "no projects");
    } else {
        let ids = &summary.project_ids;
        let facilities = report.step(WORKFLOW, "search project facility", || {
            const STEP: &str = "search project facility";
            let body = expect_success(STEP, &search_project_facility(session, ids)?)?;
            array_len(STEP, &body, "/ProjectFacilities")
        })?;
        let staff = report.step(WORKFLOW, "search project staff", || {
            const STEP: &str = "search project staff";
            let body = expect_success(STEP, &search_project_staff(session, ids)?)?;
            array_len(STEP, &body, "/ProjectStaff")
        })?;
        info!(projects = ids.len(), facilities, staff, "mapping searches finished");
        summary.facility_count = Some(facilities);
        summary.staff_count = Some(staff);
    }

    search_unknown_entities(session, report)?;
    Ok(summary)
}

fn expect_empty(step: &str, body: &Value, pointer: &str) -> Result<()> {
    match array_len(step, body, pointer)? {
        0 => Ok(()),
        n => Err(HarnessError::check(step, format!("expected no results in `{pointer}`, got {n}"))),
    }
}

/// Searches for identifiers that cannot exist must succeed with nothing in
/// them, and empty ID filters must still be accepted.
fn search_unknown_entities(session: &Session, report: &mut RunReport) -> Result<()> {
    report.step(WORKFLOW, "search unknown campaign", || {
        const STEP: &str = "search unknown campaign";
        let body = expect_success(STEP, &search_campaign(session, Some(UNKNOWN_CAMPAIGN_NUMBER), None)?)?;
        expect_empty(STEP, &body, "/CampaignDetails")
    })?;

    report.step(WORKFLOW, "search unknown project reference", || {
        const STEP: &str = "search unknown project reference";
        let body = expect_success(STEP, &search_project(session, UNKNOWN_REFERENCE_ID)?)?;
        match require_field(STEP, &body, "/TotalCount")?.as_u64() {
            Some(0) => Ok(()),
            _ => Err(HarnessError::check(STEP, format!("expected TotalCount 0, got {}", body["TotalCount"]))),
        }
    })?;

    let unknown = [UNKNOWN_PROJECT_ID.to_string()];
    report.step(WORKFLOW, "search facility of unknown project", || {
        const STEP: &str = "search facility of unknown project";
        let body = expect_success(STEP, &search_project_facility(session, &unknown)?)?;
        expect_empty(STEP, &body, "/ProjectFacilities")
    })?;
    report.step(WORKFLOW, "search staff of unknown project", || {
        const STEP: &str = "search staff of unknown project";
        let body = expect_success(STEP, &search_project_staff(session, &unknown)?)?;
        expect_empty(STEP, &body, "/ProjectStaff")
    })?;

    report.step(WORKFLOW, "search facility without project ids", || {
        expect_success("search facility without project ids", &search_project_facility(session, &[])?).map(drop)
    })?;
    report.step(WORKFLOW, "search staff without project ids", || {
        expect_success("search staff without project ids", &search_project_staff(session, &[])?).map(drop)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_string_ids_are_collected() {
        let projects = vec![json!({"id": "p-1"}), json!({"id": 7}), json!({}), json!({"id": "p-2"})];
        assert_eq!(string_ids(&projects), vec!["p-1", "p-2"]);
    }

    #[test]
    fn campaign_structure_is_checked_in_lists_and_single_objects() {
        let complete = json!({"id": "c-1", "campaignNumber": "N", "campaignName": "n", "tenantId": "mz", "status": "created"});
        let list = json!({"CampaignDetails": [complete.clone(), {"id": "c-2"}]});
        assert_eq!(campaigns(&list).len(), 2);
        assert!(require_fields("s", &campaigns(&list)[0], CAMPAIGN_FIELDS).is_ok());
        let err = require_fields("s", &campaigns(&list)[1], CAMPAIGN_FIELDS).unwrap_err();
        assert!(err.to_string().contains("/campaignNumber"));

        assert_eq!(campaigns(&json!({"CampaignDetails": complete})).len(), 1);
        assert!(campaigns(&json!({})).is_empty());
    }

    #[test]
    fn nested_project_fields_are_required() {
        let project = json!({"id": "p-1", "tenantId": "mz", "referenceID": "N", "address": {}});
        let err = require_fields("s", &project, PROJECT_FIELDS).unwrap_err();
        assert!(err.to_string().contains("/address/boundaryType"));
    }

    #[test]
    fn expect_empty_rejects_results() {
        assert!(expect_empty("s", &json!({"ProjectStaff": []}), "/ProjectStaff").is_ok());
        let err = expect_empty("s", &json!({"ProjectStaff": [{}]}), "/ProjectStaff").unwrap_err();
        assert!(err.to_string().contains("got 1"));
    }

    #[test]
    fn array_len_requires_a_list() {
        let body = json!({"ProjectStaff": [{}, {}], "ProjectFacilities": {}});
        assert_eq!(array_len("s", &body, "/ProjectStaff").unwrap(), 2);
        assert!(array_len("s", &body, "/ProjectFacilities").is_err());
        assert!(array_len("s", &body, "/Missing").is_err());
    }
}
