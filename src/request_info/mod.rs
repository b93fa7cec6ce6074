//! The `RequestInfo` envelope the platform expects on every call.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::Token;
use crate::config::Config;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub code: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub uuid: String,
    pub user_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub roles: Vec<Role>,
    pub active: bool,
    pub tenant_id: String,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub api_id: String,
    pub ver: String,
    pub ts: i64,
    pub action: String,
    pub msg_id: String,
    pub auth_token: String,
    pub user_info: UserInfo,
    pub plain_access_request: Map<String, Value>,
}

impl RequestInfo {
    pub fn build(token: &Token, config: &Config) -> Self {
        Self::build_at(token, config, Utc::now().timestamp_millis())
    }

    pub fn build_at(token: &Token, config: &Config, ts: i64) -> Self {
        let actor = &config.actor;
        Self {
            api_id: config.api_id.clone(),
            ver: "1.0".to_string(),
            ts,
            action: String::new(),
            msg_id: format!("{}|{}", Uuid::new_v4(), config.locale),
            auth_token: token.as_str().to_string(),
            user_info: UserInfo {
                id: actor.id,
                uuid: actor.uuid.clone(),
                user_name: actor.user_name.clone(),
                name: actor.name.clone(),
                user_type: config.credentials.user_type.clone(),
                roles: vec![Role {
                    name: actor.role_name.clone(),
                    code: actor.role_code.clone(),
                    tenant_id: config.tenant_id.clone(),
                }],
                active: true,
                tenant_id: config.tenant_id.clone(),
                locale: None,
            },
            plain_access_request: Map::new(),
        }
    }
}

/// Set `doc["RequestInfo"]`, replacing anything the template carried.
pub fn attach(doc: &mut Value, info: &RequestInfo) -> Result<()> {
    let envelope = serde_json::to_value(info)?;
    doc.as_object_mut()
        .ok_or_else(|| HarnessError::Usage("payload root must be a JSON object".into()))?
        .insert("RequestInfo".to_string(), envelope);
    Ok(())
}
