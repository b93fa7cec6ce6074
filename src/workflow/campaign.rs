//! Campaign lifecycle: draft setup, three updates, finalize, then verify
//! through the campaign and project searches.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::{HarnessError, Result};
use crate::http::HttpResponse;
use crate::inject::unique_name;
use crate::ledger::IdLedger;
use crate::search::poll_until;
use crate::storage::CampaignOutput;
use crate::testing::{RunReport, expect_success, require_str};

use super::Session;

pub const WORKFLOW: &str = "campaign";
pub const DEFAULT_NAME_PREFIX: &str = "Test_Campaign";

const UNKNOWN_BOUNDARY: &str = "UNKNOWN";

/// Identifiers of the campaign under test, taken from the setup response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignContext {
    pub id: String,
    pub campaign_number: String,
    pub campaign_name: String,
    pub hierarchy_type: String,
}

impl CampaignContext {
    pub fn from_setup(body: &Value) -> Result<Self> {
        const STEP: &str = "create setup";
        Ok(Self {
            id: require_str(STEP, body, "/CampaignDetails/id")?,
            campaign_number: require_str(STEP, body, "/CampaignDetails/campaignNumber")?,
            campaign_name: require_str(STEP, body, "/CampaignDetails/campaignName")?,
            hierarchy_type: require_str(STEP, body, "/CampaignDetails/hierarchyType")?,
        })
    }

    pub fn to_output(&self) -> CampaignOutput {
        CampaignOutput {
            campaign_id: self.id.clone(),
            campaign_number: self.campaign_number.clone(),
            campaign_name: self.campaign_name.clone(),
            project_total_count: None,
            projects_by_boundary_type: None,
        }
    }

    fn stamp(&self, details: &mut Map<String, Value>, with_hierarchy: bool) {
        details.insert("id".into(), json!(self.id));
        details.insert("campaignNumber".into(), json!(self.campaign_number));
        details.insert("campaignName".into(), json!(self.campaign_name));
        if with_hierarchy {
            details.insert("hierarchyType".into(), json!(self.hierarchy_type));
        }
    }
}

/// Object at `pointer` inside a loaded template (`""` is the root).
fn object_mut<'v>(payload: &'v mut Value, pointer: &str, file_name: &str) -> Result<&'v mut Map<String, Value>> {
    payload
        .pointer_mut(pointer)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| HarnessError::Usage(format!("{file_name} has no object at `{pointer}`")))
}

fn details_mut<'v>(payload: &'v mut Value, file_name: &str) -> Result<&'v mut Map<String, Value>> {
    object_mut(payload, "/CampaignDetails", file_name)
}

impl Session {
    fn stamp_tenant(&self, details: &mut Map<String, Value>) {
        details.insert("tenantId".into(), json!(self.config.tenant_id));
        details.insert("locale".into(), json!(self.config.locale));
    }

    fn factory_path(&self, action: &str) -> String {
        format!("{}/{action}", self.config.services.project_factory)
    }
}

pub fn create_setup(session: &Session, campaign_name: &str) -> Result<HttpResponse> {
    let file = "create_setup.json";
    let mut payload = session.campaign_payload(file, true)?;
    let details = details_mut(&mut payload, file)?;
    session.stamp_tenant(details);
    details.insert("campaignName".into(), json!(campaign_name));

    info!(campaign = %campaign_name, "creating campaign setup");
    session.post("create setup", &session.factory_path("create"), payload, Vec::new())
}

fn update(session: &Session, ctx: &CampaignContext, step: &str, file: &str, with_hierarchy: bool) -> Result<HttpResponse> {
    let mut payload = session.campaign_payload(file, true)?;
    let details = details_mut(&mut payload, file)?;
    ctx.stamp(details, with_hierarchy);
    session.stamp_tenant(details);
    session.post(step, &session.factory_path("update"), payload, Vec::new())
}

pub fn update_boundary(session: &Session, ctx: &CampaignContext) -> Result<HttpResponse> {
    update(session, ctx, "update boundary", "update_boundary.json", true)
}

pub fn update_delivery(session: &Session, ctx: &CampaignContext) -> Result<HttpResponse> {
    update(session, ctx, "update delivery", "update_delivery.json", true)
}

pub fn update_files(session: &Session, ctx: &CampaignContext) -> Result<HttpResponse> {
    update(session, ctx, "update files", "update_files.json", true)
}

/// Moves the draft to `create`; the template carries its own hierarchy.
pub fn finalize(session: &Session, ctx: &CampaignContext) -> Result<HttpResponse> {
    update(session, ctx, "finalize", "create_campaign.json", false)
}

/// Search by number, by id, or both. An empty `campaignNumber` is dropped
/// so an id-only search is not filtered on it.
pub fn search_campaign(session: &Session, number: Option<&str>, id: Option<&str>) -> Result<HttpResponse> {
    let file = "search_campaign.json";
    let mut payload = session.campaign_payload(file, false)?;
    let details = details_mut(&mut payload, file)?;
    details.insert("tenantId".into(), json!(session.config.tenant_id));
    match number {
        Some(number) => {
            details.insert("campaignNumber".into(), json!(number));
        }
        None => {
            details.remove("campaignNumber");
        }
    }
    if let Some(id) = id {
        details.insert("ids".into(), json!([id]));
    }
    session.post("search campaign", &session.factory_path("search"), payload, Vec::new())
}

/// Projects created for a campaign carry its number as `referenceID`.
pub fn search_project(session: &Session, campaign_number: &str) -> Result<HttpResponse> {
    let file = "search_project.json";
    let tenant = &session.config.tenant_id;
    let mut payload = session.campaign_payload(file, false)?;
    let project = object_mut(&mut payload, "/Projects/0", file)?;
    project.insert("referenceID".into(), json!(campaign_number));
    project.insert("tenantId".into(), json!(tenant));
    object_mut(&mut payload, "", file)?.insert("tenantId".into(), json!(tenant));

    let path = format!("{}/_search", session.config.services.project);
    session.post("search project", &path, payload, session.config.search_params())
}

pub fn search_project_facility(session: &Session, project_ids: &[String]) -> Result<HttpResponse> {
    let file = "search_project_facility.json";
    let mut payload = session.campaign_payload(file, false)?;
    object_mut(&mut payload, "/ProjectFacility", file)?.insert("projectId".into(), json!(project_ids));

    let path = format!("{}/_search", session.config.services.project_facility);
    session.post("search project facility", &path, payload, mapping_query(session))
}

pub fn search_project_staff(session: &Session, project_ids: &[String]) -> Result<HttpResponse> {
    let file = "search_project_staff.json";
    let mut payload = session.campaign_payload(file, false)?;
    object_mut(&mut payload, "/ProjectStaff", file)?.insert("projectId".into(), json!(project_ids));

    let path = format!("{}/_search", session.config.services.project_staff);
    session.post("search project staff", &path, payload, mapping_query(session))
}

fn mapping_query(session: &Session) -> Vec<(String, String)> {
    let config = &session.config;
    vec![
        ("tenantId".to_string(), config.tenant_id.clone()),
        ("offset".to_string(), config.search.offset.to_string()),
        ("limit".to_string(), config.search.limit.to_string()),
    ]
}

/// True when `CampaignDetails` (a list, or a single object) holds a campaign
/// whose `field` equals `expected`.
pub fn campaign_listed(body: &Value, field: &str, expected: &str) -> bool {
    match body.get("CampaignDetails") {
        Some(Value::Array(campaigns)) => campaigns.iter().any(|c| c[field] == expected),
        Some(campaign @ Value::Object(_)) => campaign[field] == expected,
        _ => false,
    }
}

/// Project IDs keyed by `address.boundaryType`. Projects without an id are
/// left out.
pub fn group_by_boundary_type(projects: &[Value]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for project in projects {
        let Some(id) = project.get("id").and_then(Value::as_str) else {
            continue;
        };
        let boundary_type = project
            .pointer("/address/boundaryType")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_BOUNDARY);
        groups.entry(boundary_type.to_string()).or_default().push(id.to_string());
    }
    groups
}

type UpdateStep = fn(&Session, &CampaignContext) -> Result<HttpResponse>;

/// Run the whole lifecycle. Stops at the first failed step; the report
/// holds every step attempted.
pub fn run_campaign_e2e(
    session: &Session,
    ledger: &dyn IdLedger,
    report: &mut RunReport,
    campaign_name: Option<&str>,
) -> Result<CampaignOutput> {
    let name = campaign_name
        .map(str::to_string)
        .unwrap_or_else(|| unique_name(DEFAULT_NAME_PREFIX));

    let ctx = report.step(WORKFLOW, "create setup", || {
        let body = expect_success("create setup", &create_setup(session, &name)?)?;
        let ctx = CampaignContext::from_setup(&body)?;
        ledger.reset()?;
        ledger.record("Campaign ID", &ctx.id)?;
        ledger.record("Campaign Number", &ctx.campaign_number)?;
        session.outputs.save_campaign_output(&ctx.to_output())?;
        info!(id = %ctx.id, number = %ctx.campaign_number, "campaign drafted");
        Ok(ctx)
    })?;

    let updates: [(&str, UpdateStep); 4] = [
        ("update boundary", update_boundary),
        ("update delivery", update_delivery),
        ("update files", update_files),
        ("finalize", finalize),
    ];
    for (step, send) in updates {
        report.step(WORKFLOW, step, || expect_success(step, &send(session, &ctx)?).map(drop))?;
    }

    report.step(WORKFLOW, "search campaign", || {
        poll_until(
            &format!("campaign {}", ctx.campaign_number),
            session.config.poll,
            || search_campaign(session, Some(&ctx.campaign_number), None),
            |body| campaign_listed(body, "campaignNumber", &ctx.campaign_number),
        )
        .map(drop)
    })?;

    report.step(WORKFLOW, "search project", || {
        let body = expect_success("search project", &search_project(session, &ctx.campaign_number)?)?;
        let total = body.get("TotalCount").and_then(Value::as_u64).unwrap_or(0);
        let projects = body
            .get("Project")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut output = ctx.to_output();
        output.project_total_count = Some(total);
        output.projects_by_boundary_type = Some(group_by_boundary_type(projects));
        session.outputs.save_campaign_output(&output)?;
        ledger.record("Project Total Count", &total.to_string())?;
        info!(total, "projects grouped by boundary type");
        Ok(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_requires_every_identifier() {
        let body = json!({"CampaignDetails": {
            "id": "c-1",
            "campaignNumber": "CMP-1",
            "campaignName": "Test_Campaign_ab12cd34",
            "hierarchyType": "ADMIN"
        }});
        let ctx = CampaignContext::from_setup(&body).unwrap();
        assert_eq!(ctx.campaign_number, "CMP-1");
        assert_eq!(ctx.to_output().campaign_id, "c-1");

        let partial = json!({"CampaignDetails": {"id": "c-1", "campaignNumber": "CMP-1"}});
        let err = CampaignContext::from_setup(&partial).unwrap_err();
        assert!(err.to_string().contains("/CampaignDetails/campaignName"));
    }

    #[test]
    fn stamp_overwrites_template_identifiers() {
        let ctx = CampaignContext {
            id: "c-1".into(),
            campaign_number: "CMP-1".into(),
            campaign_name: "n".into(),
            hierarchy_type: "HCM".into(),
        };
        let mut details = Map::new();
        details.insert("id".into(), json!(""));
        details.insert("hierarchyType".into(), json!("ADMIN"));

        ctx.stamp(&mut details, false);
        assert_eq!(details["id"], "c-1");
        assert_eq!(details["hierarchyType"], "ADMIN");

        ctx.stamp(&mut details, true);
        assert_eq!(details["hierarchyType"], "HCM");
    }

    #[test]
    fn campaign_listed_handles_lists_and_single_objects() {
        let list = json!({"CampaignDetails": [{"campaignNumber": "A"}, {"campaignNumber": "B"}]});
        assert!(campaign_listed(&list, "campaignNumber", "B"));
        assert!(!campaign_listed(&list, "campaignNumber", "C"));

        let single = json!({"CampaignDetails": {"id": "c-1"}});
        assert!(campaign_listed(&single, "id", "c-1"));
        assert!(!campaign_listed(&json!({}), "id", "c-1"));
    }

    #[test]
    fn projects_group_by_boundary_type_with_unknown_fallback() {
        let projects = vec![
            json!({"id": "p-1", "address": {"boundaryType": "COUNTRY"}}),
            json!({"id": "p-2", "address": {"boundaryType": "DISTRICT"}}),
            json!({"id": "p-3", "address": {"boundaryType": "DISTRICT"}}),
            json!({"id": "p-4", "address": {}}),
            json!({"address": {"boundaryType": "COUNTRY"}}),
        ];

        let groups = group_by_boundary_type(&projects);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups["COUNTRY"], vec!["p-1"]);
        assert_eq!(groups["DISTRICT"], vec!["p-2", "p-3"]);
        assert_eq!(groups["UNKNOWN"], vec!["p-4"]);
    }
}
