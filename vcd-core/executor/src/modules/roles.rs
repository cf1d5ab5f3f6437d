//! vcd_roles: 组织角色
//!
//! - state: present / update / absent
//! - operation: list_roles / list_rights
//!
//! update 时权限集合为 (现有 - remove_rights) + add_rights；
//! 给出 role_rights 时直接替换。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::api::role::right_names;
use vcd_platform::VcdClient;

use crate::modules::{compact, href_of, ModuleContext};
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleOperation {
    ListRoles,
    ListRights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleParams {
    pub role_name: String,

    #[serde(default)]
    pub role_description: Option<String>,

    #[serde(default)]
    pub role_rights: Vec<String>,

    #[serde(default)]
    pub add_rights: Vec<String>,

    #[serde(default)]
    pub remove_rights: Vec<String>,

    #[serde(default)]
    pub org_name: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<RoleOperation>,
}

pub struct RoleOps<'a> {
    client: &'a VcdClient,
    org_href: String,
}

#[async_trait]
impl<'a> ResourceOps for RoleOps<'a> {
    type Descriptor = RoleParams;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Role"
    }

    fn key(&self, params: &RoleParams) -> String {
        params.role_name.clone()
    }

    async fn lookup(&self, params: &RoleParams) -> Result<Lookup<serde_json::Value>> {
        Ok(self.client.role().find(&self.org_href, &params.role_name).await?.into())
    }

    async fn create(&self, params: &RoleParams) -> Result<Submitted> {
        let rights = self.client.role().right_references(&params.role_rights).await?;
        let description = params.role_description.as_deref().unwrap_or_default();
        let task = self.client.role()
            .create(&self.org_href, &params.role_name, description, rights)
            .await?;
        Ok(task.into())
    }

    async fn update(&self, role: &serde_json::Value, params: &RoleParams) -> Result<Submitted> {
        let href = href_of(role, "角色")?;
        let rights = next_rights(&right_names(role), params);
        let references = self.client.role().right_references(&rights).await?;

        let patch = compact(json!({
            "description": params.role_description,
            "rightReferences": { "rightReference": references },
        }));
        Ok(self.client.role().update(&href, patch).await?.into())
    }

    async fn delete(&self, role: &serde_json::Value, _params: &RoleParams) -> Result<Submitted> {
        let href = href_of(role, "角色")?;
        Ok(self.client.role().delete(&href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: RoleParams = params::parse(args)?;
    let org = ctx.org_name(params.org_name.as_deref()).await?;
    let org_href = ctx.org_href(&org).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = RoleOps { client: ctx.client, org_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(RoleOperation::ListRoles) => {
            let roles = ctx.client.role().list(&org_href).await?;
            let listing: Vec<serde_json::Value> = roles
                .iter()
                .map(|r| json!({ "name": r["name"], "description": r["description"] }))
                .collect();
            Ok(ModuleResult::data(listing))
        }
        Action::Operation(RoleOperation::ListRights) => {
            let rights = ctx.client.role().list_rights().await?;
            let names: Vec<String> = rights
                .iter()
                .filter_map(|r| r["name"].as_str().map(str::to_string))
                .collect();
            Ok(ModuleResult::data(names))
        }
    }
}

/// 修改后的权限集合，保持原有顺序并去重
fn next_rights(existing: &[String], params: &RoleParams) -> Vec<String> {
    let base: &[String] = if params.role_rights.is_empty() {
        existing
    } else {
        &params.role_rights
    };

    let mut rights: Vec<String> = Vec::new();
    for right in base.iter().chain(params.add_rights.iter()) {
        if !params.remove_rights.contains(right) && !rights.contains(right) {
            rights.push(right.clone());
        }
    }
    rights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> RoleParams {
        params::parse(&value).unwrap()
    }

    fn names(rights: &[&str]) -> Vec<String> {
        rights.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_add_and_remove_rights() {
        let params = params(json!({
            "role_name": "ops",
            "add_rights": ["vApp: Power Operations", "Catalog: View"],
            "remove_rights": ["Disk: Delete"],
            "state": "update"
        }));
        let existing = names(&["Catalog: View", "Disk: Delete"]);

        assert_eq!(
            next_rights(&existing, &params),
            names(&["Catalog: View", "vApp: Power Operations"])
        );
    }

    #[test]
    fn test_role_rights_replace_existing() {
        let params = params(json!({
            "role_name": "ops",
            "role_rights": ["Organization: View"],
            "state": "update"
        }));
        let existing = names(&["Catalog: View"]);
        assert_eq!(next_rights(&existing, &params), names(&["Organization: View"]));
    }

    #[test]
    fn test_list_operations_parse() {
        let params = params(json!({ "role_name": "ops", "operation": "list_rights" }));
        assert_eq!(params.operation, Some(RoleOperation::ListRights));
    }
}
