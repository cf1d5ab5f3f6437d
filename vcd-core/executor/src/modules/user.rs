//! vcd_user: 组织用户
//!
//! - state: present / update / absent
//! - operation: list_users

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::{compact, href_of, required_record, ModuleContext};
use crate::params::{self, lenient_bool, lenient_string, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOperation {
    ListUsers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserParams {
    pub username: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub userpassword: Option<String>,

    #[serde(default)]
    pub role_name: Option<String>,

    #[serde(default)]
    pub full_username: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub telephone: Option<String>,

    #[serde(default)]
    pub im: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_enabled: Option<bool>,

    #[serde(default)]
    pub stored_vm_quota: Option<u32>,

    #[serde(default)]
    pub deployed_vm_quota: Option<u32>,

    #[serde(default)]
    pub org_name: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<UserOperation>,
}

pub struct UserOps<'a> {
    client: &'a VcdClient,
    org_href: String,
}

impl<'a> UserOps<'a> {
    async fn role_href(&self, role_name: Option<&str>) -> Result<Option<String>> {
        match role_name {
            Some(name) => {
                let role = self.client.role().find(&self.org_href, name).await?;
                required_record(role, "角色", name).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<'a> ResourceOps for UserOps<'a> {
    type Descriptor = UserParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "User"
    }

    fn key(&self, params: &UserParams) -> String {
        params.username.clone()
    }

    async fn lookup(&self, params: &UserParams) -> Result<Lookup<String>> {
        let user = self.client.user().find(&self.org_href, &params.username).await?;
        Ok(user.map(|u| href_of(&u, "用户")).transpose()?.into())
    }

    async fn create(&self, params: &UserParams) -> Result<Submitted> {
        let password = params::required(&params.userpassword, "userpassword")?;
        let role_name = params::required(&params.role_name, "role_name")?;
        let role_href = self.role_href(Some(role_name)).await?;

        let mut body = user_body(params, role_href.as_deref());
        body["password"] = json!(password);
        body["isEnabled"] = json!(params.is_enabled.unwrap_or(true));
        body["providerType"] = json!("INTEGRATED");

        Ok(self.client.user().create(&self.org_href, body).await?.into())
    }

    async fn update(&self, href: &String, params: &UserParams) -> Result<Submitted> {
        let role_href = self.role_href(params.role_name.as_deref()).await?;
        let mut patch = user_body(params, role_href.as_deref());
        if let Some(password) = &params.userpassword {
            patch["password"] = json!(password);
        }
        if let Some(enabled) = params.is_enabled {
            patch["isEnabled"] = json!(enabled);
        }
        Ok(self.client.user().update(href, patch).await?.into())
    }

    async fn delete(&self, href: &String, _params: &UserParams) -> Result<Submitted> {
        Ok(self.client.user().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: UserParams = params::parse(args)?;
    let org = ctx.org_name(params.org_name.as_deref()).await?;
    let org_href = ctx.org_href(&org).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = UserOps { client: ctx.client, org_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(UserOperation::ListUsers) => {
            let users = ctx.client.user().list(&org_href).await?;
            let listing: Vec<serde_json::Value> = users
                .iter()
                .map(|u| {
                    json!({
                        "username": u["name"],
                        "full_name": u["fullName"],
                        "role": u["roleName"],
                        "is_enabled": u["isEnabled"],
                    })
                })
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

/// 用户的公共字段，未给出的字段不出现
fn user_body(params: &UserParams, role_href: Option<&str>) -> serde_json::Value {
    compact(json!({
        "name": params.username,
        "fullName": params.full_username,
        "description": params.description,
        "emailAddress": params.email,
        "telephone": params.telephone,
        "im": params.im,
        "storedVmQuota": params.stored_vm_quota,
        "deployedVmQuota": params.deployed_vm_quota,
        "role": role_href.map(|href| json!({ "href": href })),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_body() {
        let params: UserParams = params::parse(&json!({
            "username": "alice",
            "userpassword": "secret",
            "role_name": "vApp User",
            "email": "alice@example.com",
            "stored_vm_quota": 5,
            "state": "present"
        }))
        .unwrap();

        let body = user_body(&params, Some("https://vcd/api/admin/role/r-1"));
        assert_eq!(
            body,
            json!({
                "name": "alice",
                "emailAddress": "alice@example.com",
                "storedVmQuota": 5,
                "role": { "href": "https://vcd/api/admin/role/r-1" }
            })
        );
    }

    #[test]
    fn test_user_body_without_role() {
        let params: UserParams = params::parse(&json!({ "username": "bob", "state": "update" })).unwrap();
        assert_eq!(user_body(&params, None), json!({ "name": "bob" }));
    }
}
