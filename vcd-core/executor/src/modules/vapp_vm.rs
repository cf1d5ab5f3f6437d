//! vcd_vapp_vm: vApp 虚拟机
//!
//! - state: present / update / absent
//! - operation: poweron / poweroff / reboot / deploy / undeploy / list_disks / list_nics

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::api::vm::{disk_capacity_mb, disk_items, rasd_value};
use vcd_platform::{AddVmSpec, PowerAction, VcdClient, VcdError};

use crate::modules::vapp::power_word;
use crate::modules::{compact, href_of, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmOperation {
    Poweron,
    Poweroff,
    Reboot,
    Deploy,
    Undeploy,
    ListDisks,
    ListNics,
}

impl VmOperation {
    fn power_action(&self) -> Option<PowerAction> {
        match self {
            VmOperation::Poweron => Some(PowerAction::PowerOn),
            VmOperation::Poweroff => Some(PowerAction::PowerOff),
            VmOperation::Reboot => Some(PowerAction::Reboot),
            VmOperation::Deploy => Some(PowerAction::Deploy),
            VmOperation::Undeploy => Some(PowerAction::Undeploy),
            VmOperation::ListDisks | VmOperation::ListNics => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmParams {
    pub target_vm_name: String,

    pub target_vapp: String,

    pub target_vdc: String,

    #[serde(default)]
    pub source_catalog_name: Option<String>,

    #[serde(default)]
    pub source_template_name: Option<String>,

    /// 模板内的源虚拟机，缺省与新虚拟机同名
    #[serde(default)]
    pub source_vm_name: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    /// 连接的 vApp 网络
    #[serde(default)]
    pub network: Option<String>,

    /// DHCP / POOL / MANUAL
    #[serde(default)]
    pub ip_allocation_mode: Option<String>,

    #[serde(default)]
    pub storage_profile: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub power_on: Option<bool>,

    #[serde(default)]
    pub virtual_cpus: Option<u32>,

    #[serde(default)]
    pub cores_per_socket: Option<u32>,

    /// 内存（MB）
    #[serde(default)]
    pub memory: Option<u64>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VmOperation>,
}

pub struct VmOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
    vapp_href: String,
}

#[async_trait]
impl<'a> ResourceOps for VmOps<'a> {
    type Descriptor = VmParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "VM"
    }

    fn key(&self, params: &VmParams) -> String {
        params.target_vm_name.clone()
    }

    async fn lookup(&self, params: &VmParams) -> Result<Lookup<String>> {
        let record = self.client.vm().find(&self.vapp_href, &params.target_vm_name).await?;
        Ok(record.map(|r| href_of(&r, "虚拟机")).transpose()?.into())
    }

    async fn create(&self, params: &VmParams) -> Result<Submitted> {
        let catalog = params::required(&params.source_catalog_name, "source_catalog_name")?;
        let template = params::required(&params.source_template_name, "source_template_name")?;
        let source_vm = params.source_vm_name.as_deref().unwrap_or(&params.target_vm_name);

        let template_href = self.client.catalog()
            .find_template(catalog, template)
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("模板 {}/{}", catalog, template)))?;
        let source_href = self.client.vm()
            .find_in_template(&template_href, source_vm)
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("模板虚拟机 {}", source_vm)))?;
        let storage_profile_href = match &params.storage_profile {
            Some(name) => Some(self.client.vdc().storage_profile_href(&self.vdc_href, name).await?),
            None => None,
        };

        let spec = AddVmSpec {
            source_href,
            name: params.target_vm_name.clone(),
            hostname: params.hostname.clone(),
            storage_profile_href,
            network: params.network.clone(),
            ip_allocation_mode: params.ip_allocation_mode.clone(),
            power_on: params.power_on.unwrap_or(true),
        };
        Ok(self.client.vm().add(&self.vapp_href, &spec).await?.into())
    }

    async fn update(&self, href: &String, params: &VmParams) -> Result<Submitted> {
        Ok(self.client.vm().reconfigure(href, spec_patch(params)).await?.into())
    }

    async fn delete(&self, href: &String, _params: &VmParams) -> Result<Submitted> {
        Ok(self.client.vm().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: VmParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.target_vdc).await?;
    let vapp_href = ctx.vapp_href(&vdc_href, &params.target_vapp).await?;

    let operation = match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = VmOps { client: ctx.client, vdc_href, vapp_href };
            return ctx.reconciler().apply(&ops, &params, state).await;
        }
        Action::Operation(operation) => operation,
    };

    let href = ctx.vm_href(&vapp_href, &params.target_vm_name).await?;

    if let Some(action) = operation.power_action() {
        let submitted: Submitted = ctx.client.vm().power(&href, action).await?.into();
        ctx.waiter.complete(submitted).await?;
        return Ok(ModuleResult::message(
            true,
            format!("VM {} {} completed", params.target_vm_name, power_word(action)),
        ));
    }

    match operation {
        VmOperation::ListDisks => {
            let rasd = ctx.client.vm().disks(&href).await?;
            let disks: Vec<serde_json::Value> = disk_items(&rasd)
                .into_iter()
                .map(|item| {
                    json!({
                        "id": rasd_value(item, "instanceID"),
                        "name": rasd_value(item, "elementName"),
                        "size_mb": disk_capacity_mb(item),
                    })
                })
                .collect();
            Ok(ModuleResult::data(disks))
        }
        _ => {
            let section = ctx.client.vm().network_connections(&href).await?;
            let nics: Vec<serde_json::Value> = section["networkConnection"]
                .as_array()
                .map(|conns| {
                    conns
                        .iter()
                        .map(|c| {
                            json!({
                                "index": c["networkConnectionIndex"],
                                "network": c["network"],
                                "ip_address": c["ipAddress"],
                                "ip_allocation_mode": c["ipAddressAllocationMode"],
                                "is_connected": c["isConnected"],
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(ModuleResult::data(nics))
        }
    }
}

fn spec_patch(params: &VmParams) -> serde_json::Value {
    compact(json!({
        "vmSpecSection": {
            "modified": true,
            "numCpus": params.virtual_cpus,
            "numCoresPerSocket": params.cores_per_socket,
            "memoryResourceMb": { "configured": params.memory },
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_patch() {
        let params: VmParams = params::parse(&json!({
            "target_vm_name": "web01",
            "target_vapp": "web",
            "target_vdc": "vdc1",
            "virtual_cpus": 4,
            "memory": 8192,
            "state": "update"
        }))
        .unwrap();

        let patch = spec_patch(&params);
        assert_eq!(patch["vmSpecSection"]["numCpus"], 4);
        assert_eq!(patch["vmSpecSection"]["memoryResourceMb"]["configured"], 8192);
        assert!(patch["vmSpecSection"].get("numCoresPerSocket").is_none());
    }

    #[test]
    fn test_power_actions() {
        assert_eq!(VmOperation::Reboot.power_action(), Some(PowerAction::Reboot));
        assert!(VmOperation::ListNics.power_action().is_none());
    }
}
