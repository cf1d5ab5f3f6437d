//! vcd_vapp_vm_disk: 虚拟机硬盘
//!
//! - state: present / update / absent
//! - operation: read
//!
//! 硬盘按 `disk_id`（RASD instanceID，如 `2001`）识别，增删改都是整表替换。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::api::vm::{disk_capacity_mb, disk_items, rasd_value, CAPACITY_ATTRIBUTE, RESOURCE_TYPE_DISK};
use vcd_platform::{VcdClient, VcdError};

use crate::modules::ModuleContext;
use crate::params::{self, lenient_string, string_or_number, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

/// 新硬盘默认的总线类型（SCSI）
const DEFAULT_BUS_TYPE: &str = "6";

/// 新硬盘默认的总线子类型
const DEFAULT_BUS_SUB_TYPE: &str = "VirtualSCSI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmDiskOperation {
    Read,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmDiskParams {
    pub vm_name: String,

    pub vapp: String,

    pub vdc: String,

    #[serde(deserialize_with = "string_or_number")]
    pub disk_id: String,

    /// 容量（MB）
    #[serde(default)]
    pub size: Option<u64>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub bus_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub bus_sub_type: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VmDiskOperation>,
}

pub struct VmDiskOps<'a> {
    client: &'a VcdClient,
    vm_href: String,
}

#[async_trait]
impl<'a> ResourceOps for VmDiskOps<'a> {
    type Descriptor = VmDiskParams;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Disk"
    }

    fn key(&self, params: &VmDiskParams) -> String {
        params.disk_id.clone()
    }

    async fn lookup(&self, params: &VmDiskParams) -> Result<Lookup<serde_json::Value>> {
        let rasd = self.client.vm().disks(&self.vm_href).await?;
        if find_disk(&rasd, &params.disk_id).is_some() {
            Ok(Lookup::Found(rasd))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    async fn create(&self, params: &VmDiskParams) -> Result<Submitted> {
        let size = params.size.ok_or_else(|| ExecutorError::MissingParam("size".to_string()))?;
        let mut rasd = self.client.vm().disks(&self.vm_href).await?;
        add_disk(&mut rasd, new_disk(params, size));
        Ok(self.client.vm().put_disks(&self.vm_href, rasd).await?.into())
    }

    async fn update(&self, rasd: &serde_json::Value, params: &VmDiskParams) -> Result<Submitted> {
        let size = params.size.ok_or_else(|| ExecutorError::MissingParam("size".to_string()))?;
        let mut rasd = rasd.clone();
        resize_disk(&mut rasd, &params.disk_id, size)?;
        Ok(self.client.vm().put_disks(&self.vm_href, rasd).await?.into())
    }

    async fn delete(&self, rasd: &serde_json::Value, params: &VmDiskParams) -> Result<Submitted> {
        let mut rasd = rasd.clone();
        remove_disk(&mut rasd, &params.disk_id);
        Ok(self.client.vm().put_disks(&self.vm_href, rasd).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: VmDiskParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let vapp_href = ctx.vapp_href(&vdc_href, &params.vapp).await?;
    let vm_href = ctx.vm_href(&vapp_href, &params.vm_name).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = VmDiskOps { client: ctx.client, vm_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(VmDiskOperation::Read) => {
            let rasd = ctx.client.vm().disks(&vm_href).await?;
            let disk = find_disk(&rasd, &params.disk_id)
                .ok_or_else(|| VcdError::NotFound(format!("硬盘 {}", params.disk_id)))?;
            Ok(ModuleResult::data(json!({
                "id": params.disk_id,
                "name": rasd_value(disk, "elementName"),
                "size_mb": disk_capacity_mb(disk),
            })))
        }
    }
}

fn find_disk<'v>(rasd: &'v serde_json::Value, disk_id: &str) -> Option<&'v serde_json::Value> {
    disk_items(rasd)
        .into_iter()
        .find(|item| rasd_value(item, "instanceID").as_deref() == Some(disk_id))
}

fn new_disk(params: &VmDiskParams, size_mb: u64) -> serde_json::Value {
    let mut attributes = serde_json::Map::new();
    attributes.insert(CAPACITY_ATTRIBUTE.to_string(), json!(size_mb.to_string()));
    attributes.insert(
        "{http://www.vmware.com/vcloud/v1.5}busType".to_string(),
        json!(params.bus_type.as_deref().unwrap_or(DEFAULT_BUS_TYPE)),
    );
    attributes.insert(
        "{http://www.vmware.com/vcloud/v1.5}busSubType".to_string(),
        json!(params.bus_sub_type.as_deref().unwrap_or(DEFAULT_BUS_SUB_TYPE)),
    );

    json!({
        "instanceID": { "value": params.disk_id },
        "resourceType": { "value": RESOURCE_TYPE_DISK },
        "elementName": { "value": format!("Hard disk {}", params.disk_id) },
        "hostResource": [ { "otherAttributes": attributes } ],
    })
}

fn add_disk(rasd: &mut serde_json::Value, disk: serde_json::Value) {
    match rasd["item"].as_array_mut() {
        Some(items) => items.push(disk),
        None => rasd["item"] = json!([disk]),
    }
}

fn resize_disk(rasd: &mut serde_json::Value, disk_id: &str, size_mb: u64) -> Result<()> {
    let Some(items) = rasd["item"].as_array_mut() else {
        return Ok(());
    };

    for item in items.iter_mut().filter(|item| is_disk(item, disk_id)) {
        let attributes = item
            .get_mut("hostResource")
            .and_then(|resources| resources.get_mut(0))
            .and_then(|resource| resource.as_object_mut())
            .map(|resource| resource.entry("otherAttributes").or_insert_with(|| json!({})))
            .and_then(|attributes| attributes.as_object_mut())
            .ok_or_else(|| VcdError::ParseError(format!("硬盘 {} 缺少 hostResource", disk_id)))?;
        attributes.insert(CAPACITY_ATTRIBUTE.to_string(), json!(size_mb.to_string()));
    }
    Ok(())
}

fn remove_disk(rasd: &mut serde_json::Value, disk_id: &str) {
    if let Some(items) = rasd["item"].as_array_mut() {
        items.retain(|item| !is_disk(item, disk_id));
    }
}

fn is_disk(item: &serde_json::Value, disk_id: &str) -> bool {
    rasd_value(item, "resourceType").as_deref() == Some(RESOURCE_TYPE_DISK)
        && rasd_value(item, "instanceID").as_deref() == Some(disk_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasd() -> serde_json::Value {
        json!({
            "item": [
                { "instanceID": { "value": 2 }, "resourceType": { "value": "6" } },
                {
                    "instanceID": { "value": "2000" },
                    "resourceType": { "value": "17" },
                    "hostResource": [ { "otherAttributes": { "{http://www.vmware.com/vcloud/v1.5}capacity": "16384" } } ]
                }
            ]
        })
    }

    fn params(disk_id: &str) -> VmDiskParams {
        params::parse(&json!({
            "vm_name": "web01",
            "vapp": "web",
            "vdc": "vdc1",
            "disk_id": disk_id,
            "size": 2048,
            "state": "present"
        }))
        .unwrap()
    }

    #[test]
    fn test_add_resize_remove() {
        let mut rasd = rasd();
        assert!(find_disk(&rasd, "2001").is_none());

        add_disk(&mut rasd, new_disk(&params("2001"), 2048));
        assert_eq!(find_disk(&rasd, "2001").and_then(disk_capacity_mb), Some(2048));

        resize_disk(&mut rasd, "2000", 32768).unwrap();
        assert_eq!(find_disk(&rasd, "2000").and_then(disk_capacity_mb), Some(32768));

        remove_disk(&mut rasd, "2001");
        assert!(find_disk(&rasd, "2001").is_none());
        assert_eq!(rasd["item"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_resize_without_host_resource() {
        let mut rasd = json!({
            "item": [ { "instanceID": { "value": "2000" }, "resourceType": { "value": "17" } } ]
        });
        assert!(matches!(
            resize_disk(&mut rasd, "2000", 4096),
            Err(ExecutorError::Platform(VcdError::ParseError(_)))
        ));
    }

    #[test]
    fn test_integer_disk_id() {
        let params: VmDiskParams = params::parse(&json!({
            "vm_name": "web01",
            "vapp": "web",
            "vdc": "vdc1",
            "disk_id": 2000,
            "bus_type": 6,
            "state": "update"
        }))
        .unwrap();
        assert_eq!(params.disk_id, "2000");
        assert_eq!(params.bus_type.as_deref(), Some("6"));
        assert!(find_disk(&rasd(), &params.disk_id).is_some());
    }

    #[test]
    fn test_controller_is_not_a_disk() {
        assert!(find_disk(&rasd(), "2").is_none());
    }
}
