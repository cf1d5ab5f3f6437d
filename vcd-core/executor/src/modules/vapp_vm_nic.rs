//! vcd_vapp_vm_nic: 虚拟机网卡
//!
//! - state: present / update / absent
//! - operation: read
//!
//! 网卡按 `nic_id`（networkConnectionIndex）识别。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::ModuleContext;
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NicOperation {
    Read,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NicParams {
    pub vm_name: String,

    pub vapp: String,

    pub vdc: String,

    pub nic_id: u32,

    #[serde(default)]
    pub network: Option<String>,

    /// DHCP / POOL / MANUAL / NONE
    #[serde(default)]
    pub ip_allocation_mode: Option<String>,

    #[serde(default)]
    pub ip_address: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_connected: Option<bool>,

    /// VMXNET3 / E1000 / E1000E ...
    #[serde(default)]
    pub adapter_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_primary: Option<bool>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<NicOperation>,
}

pub struct NicOps<'a> {
    client: &'a VcdClient,
    vm_href: String,
}

#[async_trait]
impl<'a> ResourceOps for NicOps<'a> {
    type Descriptor = NicParams;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Nic"
    }

    fn key(&self, params: &NicParams) -> String {
        params.nic_id.to_string()
    }

    async fn lookup(&self, params: &NicParams) -> Result<Lookup<serde_json::Value>> {
        let section = self.client.vm().network_connections(&self.vm_href).await?;
        if find_nic(&section, params.nic_id).is_some() {
            Ok(Lookup::Found(section))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    async fn create(&self, params: &NicParams) -> Result<Submitted> {
        let network = params::required(&params.network, "network")?;
        let mut section = self.client.vm().network_connections(&self.vm_href).await?;
        add_nic(&mut section, new_nic(params, network)?, params.is_primary.unwrap_or(false));
        Ok(self.client.vm().put_network_connections(&self.vm_href, section).await?.into())
    }

    async fn update(&self, section: &serde_json::Value, params: &NicParams) -> Result<Submitted> {
        let mut section = section.clone();
        update_nic(&mut section, params);
        Ok(self.client.vm().put_network_connections(&self.vm_href, section).await?.into())
    }

    async fn delete(&self, section: &serde_json::Value, params: &NicParams) -> Result<Submitted> {
        let mut section = section.clone();
        remove_nic(&mut section, params.nic_id);
        Ok(self.client.vm().put_network_connections(&self.vm_href, section).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: NicParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let vapp_href = ctx.vapp_href(&vdc_href, &params.vapp).await?;
    let vm_href = ctx.vm_href(&vapp_href, &params.vm_name).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = NicOps { client: ctx.client, vm_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(NicOperation::Read) => {
            let section = ctx.client.vm().network_connections(&vm_href).await?;
            let nic = find_nic(&section, params.nic_id).ok_or_else(|| {
                vcd_platform::VcdError::NotFound(format!("网卡 {}", params.nic_id))
            })?;
            Ok(ModuleResult::data(json!({
                "index": nic["networkConnectionIndex"],
                "network": nic["network"],
                "ip_address": nic["ipAddress"],
                "ip_allocation_mode": nic["ipAddressAllocationMode"],
                "mac_address": nic["macAddress"],
                "is_connected": nic["isConnected"],
                "adapter_type": nic["networkAdapterType"],
            })))
        }
    }
}

fn find_nic(section: &serde_json::Value, index: u32) -> Option<&serde_json::Value> {
    section["networkConnection"]
        .as_array()
        .and_then(|nics| {
            nics.iter()
                .find(|n| n["networkConnectionIndex"].as_u64() == Some(index as u64))
        })
}

fn new_nic(params: &NicParams, network: &str) -> Result<serde_json::Value> {
    let mode = params.ip_allocation_mode.as_deref().unwrap_or("DHCP");
    if mode.eq_ignore_ascii_case("MANUAL") && params.ip_address.is_none() {
        return Err(ExecutorError::InvalidParams(
            "ip_allocation_mode 为 MANUAL 时必须指定 ip_address".to_string(),
        ));
    }

    let mut nic = json!({
        "network": network,
        "networkConnectionIndex": params.nic_id,
        "isConnected": params.is_connected.unwrap_or(true),
        "ipAddressAllocationMode": mode.to_ascii_uppercase(),
    });
    if let Some(ip) = &params.ip_address {
        nic["ipAddress"] = json!(ip);
    }
    if let Some(adapter) = &params.adapter_type {
        nic["networkAdapterType"] = json!(adapter);
    }
    Ok(nic)
}

fn add_nic(section: &mut serde_json::Value, nic: serde_json::Value, primary: bool) {
    let index = nic["networkConnectionIndex"].clone();
    match section["networkConnection"].as_array_mut() {
        Some(nics) => nics.push(nic),
        None => section["networkConnection"] = json!([nic]),
    }
    if primary || section["primaryNetworkConnectionIndex"].is_null() {
        section["primaryNetworkConnectionIndex"] = index;
    }
}

fn update_nic(section: &mut serde_json::Value, params: &NicParams) {
    let Some(nics) = section["networkConnection"].as_array_mut() else {
        return;
    };
    let Some(nic) = nics
        .iter_mut()
        .find(|n| n["networkConnectionIndex"].as_u64() == Some(params.nic_id as u64))
    else {
        return;
    };

    if let Some(network) = &params.network {
        nic["network"] = json!(network);
    }
    if let Some(mode) = &params.ip_allocation_mode {
        nic["ipAddressAllocationMode"] = json!(mode.to_ascii_uppercase());
    }
    if let Some(ip) = &params.ip_address {
        nic["ipAddress"] = json!(ip);
    }
    if let Some(connected) = params.is_connected {
        nic["isConnected"] = json!(connected);
    }
    if let Some(adapter) = &params.adapter_type {
        nic["networkAdapterType"] = json!(adapter);
    }
    if params.is_primary == Some(true) {
        section["primaryNetworkConnectionIndex"] = json!(params.nic_id);
    }
}

/// 删除主网卡时，主网卡改为剩余的第一块网卡；没有剩余网卡则清除
fn remove_nic(section: &mut serde_json::Value, index: u32) {
    let Some(nics) = section["networkConnection"].as_array_mut() else {
        return;
    };
    nics.retain(|n| n["networkConnectionIndex"].as_u64() != Some(index as u64));
    let next_primary = nics.first().map(|n| n["networkConnectionIndex"].clone());

    if section["primaryNetworkConnectionIndex"].as_u64() == Some(index as u64) {
        match next_primary {
            Some(primary) => section["primaryNetworkConnectionIndex"] = primary,
            None => {
                if let Some(fields) = section.as_object_mut() {
                    fields.remove("primaryNetworkConnectionIndex");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(nic_id: u32) -> NicParams {
        params::parse(&json!({
            "vm_name": "web01",
            "vapp": "web",
            "vdc": "vdc1",
            "nic_id": nic_id,
            "network": "app-net",
            "state": "present"
        }))
        .unwrap()
    }

    fn section() -> serde_json::Value {
        json!({
            "primaryNetworkConnectionIndex": 0,
            "networkConnection": [
                { "network": "web", "networkConnectionIndex": 0, "isConnected": true, "ipAddressAllocationMode": "POOL" }
            ]
        })
    }

    #[test]
    fn test_add_nic() {
        let mut section = section();
        let params = params(1);
        add_nic(&mut section, new_nic(&params, "app-net").unwrap(), false);

        let nic = find_nic(&section, 1).unwrap();
        assert_eq!(nic["ipAddressAllocationMode"], "DHCP");
        assert_eq!(section["primaryNetworkConnectionIndex"], 0);
    }

    #[test]
    fn test_manual_requires_ip() {
        let mut params = params(1);
        params.ip_allocation_mode = Some("manual".into());
        assert!(matches!(
            new_nic(&params, "app-net"),
            Err(ExecutorError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_update_and_remove_nic() {
        let mut section = section();
        let mut params = params(0);
        params.network = None;
        params.ip_address = Some("10.0.0.5".into());
        params.ip_allocation_mode = Some("manual".into());

        update_nic(&mut section, &params);
        let nic = find_nic(&section, 0).unwrap();
        assert_eq!(nic["network"], "web");
        assert_eq!(nic["ipAddress"], "10.0.0.5");
        assert_eq!(nic["ipAddressAllocationMode"], "MANUAL");

        remove_nic(&mut section, 0);
        assert!(find_nic(&section, 0).is_none());
        assert!(section.get("primaryNetworkConnectionIndex").is_none());
    }

    #[test]
    fn test_remove_primary_moves_primary() {
        let mut section = section();
        add_nic(&mut section, new_nic(&params(1), "app-net").unwrap(), false);
        add_nic(&mut section, new_nic(&params(2), "app-net").unwrap(), false);

        remove_nic(&mut section, 2);
        assert_eq!(section["primaryNetworkConnectionIndex"], 0);

        remove_nic(&mut section, 0);
        assert_eq!(section["primaryNetworkConnectionIndex"], 1);
        assert!(find_nic(&section, 1).is_some());
    }
}
