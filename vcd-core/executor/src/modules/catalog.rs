//! vcd_catalog: 目录
//!
//! - state: present / update / absent
//! - operation: read / shareunshare / list_items

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{record_names, VcdClient};

use crate::modules::{compact, href_of, required_record, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOperation {
    Read,
    Shareunshare,
    ListItems,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogParams {
    pub catalog_name: String,

    #[serde(default)]
    pub new_catalog_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// shareunshare 的目标状态
    #[serde(default, deserialize_with = "lenient_bool")]
    pub shared: Option<bool>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<CatalogOperation>,
}

pub struct CatalogOps<'a> {
    client: &'a VcdClient,
    org: String,
}

#[async_trait]
impl<'a> ResourceOps for CatalogOps<'a> {
    type Descriptor = CatalogParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Catalog"
    }

    fn key(&self, params: &CatalogParams) -> String {
        params.catalog_name.clone()
    }

    async fn lookup(&self, params: &CatalogParams) -> Result<Lookup<String>> {
        let record = self.client.catalog().find(&self.org, &params.catalog_name).await?;
        Ok(record.map(|r| href_of(&r, "目录")).transpose()?.into())
    }

    async fn create(&self, params: &CatalogParams) -> Result<Submitted> {
        let org_href = href_of(&self.client.org().get_by_name(&self.org).await?, "组织")?;
        let task = self.client.catalog()
            .create(
                &org_href,
                &params.catalog_name,
                params.description.as_deref().unwrap_or_default(),
            )
            .await?;
        Ok(task.into())
    }

    async fn update(&self, href: &String, params: &CatalogParams) -> Result<Submitted> {
        let patch = compact(json!({
            "name": params.new_catalog_name,
            "description": params.description,
        }));
        Ok(self.client.catalog().update(href, patch).await?.into())
    }

    async fn delete(&self, href: &String, _params: &CatalogParams) -> Result<Submitted> {
        Ok(self.client.catalog().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: CatalogParams = params::parse(args)?;
    let org = ctx.org_name(None).await?;

    let operation = match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = CatalogOps { client: ctx.client, org };
            return ctx.reconciler().apply(&ops, &params, state).await;
        }
        Action::Operation(operation) => operation,
    };

    let record = ctx.client.catalog().find(&org, &params.catalog_name).await?;
    let href = required_record(record, "目录", &params.catalog_name)?;

    match operation {
        CatalogOperation::Read => {
            let catalog = ctx.client.catalog().get(&href).await?;
            Ok(ModuleResult::data(json!({
                "name": catalog["name"],
                "description": catalog["description"],
                "shared": catalog["isPublished"],
            })))
        }
        CatalogOperation::Shareunshare => {
            let shared = params.shared.ok_or_else(|| ExecutorError::MissingParam("shared".to_string()))?;
            let catalog = ctx.client.catalog().get(&href).await?;
            if catalog["isPublished"].as_bool() == Some(shared) {
                return Ok(ModuleResult::unchanged(format!(
                    "Catalog {} is already {}",
                    params.catalog_name,
                    share_word(shared)
                )));
            }

            let submitted: Submitted = ctx.client.catalog().publish(&href, shared).await?.into();
            ctx.waiter.complete(submitted).await?;
            Ok(ModuleResult::message(
                true,
                format!("Catalog {} has been {}", params.catalog_name, share_word(shared)),
            ))
        }
        CatalogOperation::ListItems => {
            let items = ctx.client.catalog().list_items(&href).await?;
            Ok(ModuleResult::data(record_names(&items)))
        }
    }
}

fn share_word(shared: bool) -> &'static str {
    if shared {
        "shared"
    } else {
        "unshared"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operations() {
        let params: CatalogParams = params::parse(&json!({
            "catalog_name": "templates",
            "operation": "shareunshare",
            "shared": true
        }))
        .unwrap();
        assert_eq!(params.operation, Some(CatalogOperation::Shareunshare));
        assert_eq!(params.shared, Some(true));

        let params: CatalogParams =
            params::parse(&json!({ "catalog_name": "templates", "operation": "list_items" })).unwrap();
        assert_eq!(params.operation, Some(CatalogOperation::ListItems));
    }

    #[test]
    fn test_share_word() {
        assert_eq!(share_word(true), "shared");
        assert_eq!(share_word(false), "unshared");
    }
}
