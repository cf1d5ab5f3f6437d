//! vcd_resources: NSX-T 管理器（系统管理员）
//!
//! - state: present / absent
//! - operation: list_nsxt_managers

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::{href_of, ModuleContext};
use crate::params::{self, lenient_string, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcesOperation {
    ListNsxtManagers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesParams {
    pub nsxt_manager_name: String,

    /// 管理器地址，如 `https://nsx.example.com`
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<ResourcesOperation>,
}

pub struct NsxtManagerOps<'a> {
    client: &'a VcdClient,
}

#[async_trait]
impl<'a> ResourceOps for NsxtManagerOps<'a> {
    type Descriptor = ResourcesParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "NSX-T manager"
    }

    fn key(&self, params: &ResourcesParams) -> String {
        params.nsxt_manager_name.clone()
    }

    async fn lookup(&self, params: &ResourcesParams) -> Result<Lookup<String>> {
        let manager = self.client.nsxt().find(&params.nsxt_manager_name).await?;
        Ok(manager.map(|m| href_of(&m, "NSX-T 管理器")).transpose()?.into())
    }

    async fn create(&self, params: &ResourcesParams) -> Result<Submitted> {
        let body = manager_body(params)?;
        Ok(self.client.nsxt().register(body).await?.into())
    }

    async fn delete(&self, href: &String, _params: &ResourcesParams) -> Result<Submitted> {
        Ok(self.client.nsxt().unregister(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: ResourcesParams = params::parse(args)?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = NsxtManagerOps { client: ctx.client };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(ResourcesOperation::ListNsxtManagers) => {
            let managers = ctx.client.nsxt().list().await?;
            let listing: Vec<serde_json::Value> = managers
                .iter()
                .map(|m| json!({ "name": m["name"], "url": m["url"] }))
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

fn manager_body(params: &ResourcesParams) -> Result<serde_json::Value> {
    let url = params::required(&params.hostname, "hostname")?;
    let username = params::required(&params.username, "username")?;
    let password = params::required(&params.password, "password")?;

    Ok(json!({
        "name": params.nsxt_manager_name,
        "description": params.description.as_deref().unwrap_or_default(),
        "url": url,
        "username": username,
        "password": password,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutorError;

    #[test]
    fn test_manager_body() {
        let params: ResourcesParams = params::parse(&json!({
            "nsxt_manager_name": "nsx1",
            "hostname": "https://nsx1.example.com",
            "username": "admin",
            "password": "secret",
            "state": "present"
        }))
        .unwrap();

        let body = manager_body(&params).unwrap();
        assert_eq!(body["url"], "https://nsx1.example.com");
        assert_eq!(body["description"], "");
    }

    #[test]
    fn test_manager_body_requires_credentials() {
        let params: ResourcesParams = params::parse(&json!({
            "nsxt_manager_name": "nsx1",
            "hostname": "https://nsx1.example.com",
            "state": "present"
        }))
        .unwrap();
        assert!(matches!(manager_body(&params), Err(ExecutorError::MissingParam(_))));
    }
}
