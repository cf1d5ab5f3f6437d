//! vcd_org: 组织
//!
//! - state: present / update / absent
//! - operation: read

use async_trait::async_trait;
use serde::Deserialize;

use vcd_platform::VcdClient;

use crate::modules::{href_of, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgOperation {
    Read,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgParams {
    pub org_name: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_enabled: Option<bool>,

    /// 删除时一并删除运行中的对象
    #[serde(default, deserialize_with = "lenient_bool")]
    pub force: Option<bool>,

    /// 删除时一并删除子对象
    #[serde(default, deserialize_with = "lenient_bool")]
    pub recursive: Option<bool>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<OrgOperation>,
}

pub struct OrgOps<'a> {
    client: &'a VcdClient,
}

#[async_trait]
impl<'a> ResourceOps for OrgOps<'a> {
    type Descriptor = OrgParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Org"
    }

    fn key(&self, params: &OrgParams) -> String {
        params.org_name.clone()
    }

    async fn lookup(&self, params: &OrgParams) -> Result<Lookup<String>> {
        let org = self.client.org().find(&params.org_name).await?;
        Ok(org.map(|o| href_of(&o, "组织")).transpose()?.into())
    }

    async fn create(&self, params: &OrgParams) -> Result<Submitted> {
        let full_name = params.full_name.as_deref().unwrap_or(&params.org_name);
        let task = self.client.org()
            .create(&params.org_name, full_name, params.is_enabled.unwrap_or(true))
            .await?;
        Ok(task.into())
    }

    async fn update(&self, href: &String, params: &OrgParams) -> Result<Submitted> {
        let task = self.client.org()
            .update(href, params.full_name.as_deref(), params.is_enabled)
            .await?;
        Ok(task.into())
    }

    async fn delete(&self, href: &String, params: &OrgParams) -> Result<Submitted> {
        let task = self.client.org()
            .delete(href, params.force.unwrap_or(false), params.recursive.unwrap_or(false))
            .await?;
        Ok(task.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: OrgParams = params::parse(args)?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = OrgOps { client: ctx.client };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(OrgOperation::Read) => {
            let org = ctx.client.org().get_by_name(&params.org_name).await?;
            Ok(ModuleResult::data(summary(&org)))
        }
    }
}

fn summary(org: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "name": org["name"],
        "full_name": org["fullName"],
        "is_enabled": org["isEnabled"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        let params: OrgParams = params::parse(&json!({
            "org_name": "acme",
            "is_enabled": "yes",
            "state": "present",
            "user": "admin"
        }))
        .unwrap();
        assert_eq!(params.org_name, "acme");
        assert_eq!(params.is_enabled, Some(true));
        assert!(params.operation.is_none());
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let err = params::parse::<OrgParams>(&json!({ "org_name": "acme", "operation": "explode" }))
            .unwrap_err();
        assert!(matches!(err, crate::ExecutorError::InvalidParams(_)));
    }

    #[test]
    fn test_summary() {
        let org = json!({ "name": "acme", "fullName": "Acme Corp", "isEnabled": true, "settings": {} });
        assert_eq!(
            summary(&org),
            json!({ "name": "acme", "full_name": "Acme Corp", "is_enabled": true })
        );
    }
}
