//! vcd_disk: 独立磁盘
//!
//! - state: present / update / absent
//! - operation: list_disks

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::{compact, href_of, ModuleContext};
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskOperation {
    ListDisks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskParams {
    pub disk_name: String,

    pub vdc: String,

    /// 容量（字节）
    #[serde(default)]
    pub size: Option<u64>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub storage_profile: Option<String>,

    #[serde(default)]
    pub bus_type: Option<String>,

    #[serde(default)]
    pub bus_sub_type: Option<String>,

    #[serde(default)]
    pub iops: Option<u64>,

    #[serde(default)]
    pub new_disk_name: Option<String>,

    #[serde(default)]
    pub new_size: Option<u64>,

    #[serde(default)]
    pub new_description: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<DiskOperation>,
}

pub struct DiskOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
}

#[async_trait]
impl<'a> ResourceOps for DiskOps<'a> {
    type Descriptor = DiskParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Disk"
    }

    fn key(&self, params: &DiskParams) -> String {
        params.disk_name.clone()
    }

    async fn lookup(&self, params: &DiskParams) -> Result<Lookup<String>> {
        let record = self.client.disk().find(&self.vdc_href, &params.disk_name).await?;
        Ok(record.map(|r| href_of(&r, "磁盘")).transpose()?.into())
    }

    async fn create(&self, params: &DiskParams) -> Result<Submitted> {
        let size = params.size.ok_or_else(|| ExecutorError::MissingParam("size".to_string()))?;
        let storage_profile_href = match &params.storage_profile {
            Some(name) => Some(self.client.vdc().storage_profile_href(&self.vdc_href, name).await?),
            None => None,
        };

        let disk = disk_body(params, size, storage_profile_href.as_deref());
        Ok(self.client.disk().create(&self.vdc_href, disk).await?.into())
    }

    async fn update(&self, href: &String, params: &DiskParams) -> Result<Submitted> {
        let patch = compact(json!({
            "name": params.new_disk_name,
            "size": params.new_size,
            "description": params.new_description,
            "iops": params.iops,
        }));
        Ok(self.client.disk().update(href, patch).await?.into())
    }

    async fn delete(&self, href: &String, _params: &DiskParams) -> Result<Submitted> {
        Ok(self.client.disk().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: DiskParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = DiskOps { client: ctx.client, vdc_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(DiskOperation::ListDisks) => {
            let disks = ctx.client.disk().list(&vdc_href).await?;
            let listing: Vec<serde_json::Value> = disks
                .iter()
                .map(|d| json!({ "name": d["name"], "size_mb": d["sizeMb"], "status": d["status"] }))
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

fn disk_body(params: &DiskParams, size: u64, storage_profile_href: Option<&str>) -> serde_json::Value {
    compact(json!({
        "name": params.disk_name,
        "size": size,
        "description": params.description,
        "busType": params.bus_type,
        "busSubType": params.bus_sub_type,
        "iops": params.iops,
        "storageProfile": storage_profile_href.map(|href| json!({ "href": href })),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_body() {
        let params: DiskParams = params::parse(&json!({
            "disk_name": "data",
            "vdc": "vdc1",
            "size": 1073741824u64,
            "bus_type": "6",
            "state": "present"
        }))
        .unwrap();

        let body = disk_body(&params, params.size.unwrap(), Some("https://vcd/api/vdcStorageProfile/1"));
        assert_eq!(body["name"], "data");
        assert_eq!(body["size"], 1073741824u64);
        assert_eq!(body["busType"], "6");
        assert!(body.get("busSubType").is_none());
        assert_eq!(body["storageProfile"]["href"], "https://vcd/api/vdcStorageProfile/1");
    }
}
