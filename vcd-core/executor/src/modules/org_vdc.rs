//! vcd_org_vdc: 组织虚拟数据中心
//!
//! - state: present / update / absent
//! - operation: list_vdcs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{record_names, VcdClient};

use crate::modules::{compact, href_of, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VdcOperation {
    ListVdcs,
}

/// VDC 存储策略
#[derive(Debug, Clone, Deserialize)]
pub struct StorageProfile {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mem_units")]
    pub units: String,

    #[serde(default)]
    pub limit: u64,

    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgVdcParams {
    pub vdc_name: String,

    #[serde(default)]
    pub org_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub provider_vdc_name: Option<String>,

    /// AllocationVApp / AllocationPool / ReservationPool / Flex
    #[serde(default)]
    pub allocation_model: Option<String>,

    #[serde(default)]
    pub cpu_units: Option<String>,

    #[serde(default)]
    pub cpu_allocated: Option<u64>,

    #[serde(default)]
    pub cpu_limit: Option<u64>,

    #[serde(default)]
    pub mem_units: Option<String>,

    #[serde(default)]
    pub mem_allocated: Option<u64>,

    #[serde(default)]
    pub mem_limit: Option<u64>,

    #[serde(default)]
    pub nic_quota: Option<u32>,

    #[serde(default)]
    pub network_quota: Option<u32>,

    #[serde(default)]
    pub vm_quota: Option<u32>,

    #[serde(default)]
    pub storage_profiles: Vec<StorageProfile>,

    #[serde(default)]
    pub resource_guaranteed_cpu: Option<f64>,

    #[serde(default)]
    pub resource_guaranteed_memory: Option<f64>,

    #[serde(default)]
    pub vcpu_in_mhz: Option<u64>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_thin_provision: Option<bool>,

    #[serde(default)]
    pub network_pool_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub uses_fast_provisioning: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub over_commit_allowed: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub vm_discovery_enabled: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_enabled: Option<bool>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VdcOperation>,
}

fn default_true() -> bool {
    true
}

fn default_mem_units() -> String {
    "MB".to_string()
}

/// 引用解析后的创建参数
struct ResolvedRefs {
    provider_vdc_href: String,
    network_pool_href: Option<String>,
    storage_profile_hrefs: Vec<String>,
}

pub struct OrgVdcOps<'a> {
    client: &'a VcdClient,
    org: String,
}

#[async_trait]
impl<'a> ResourceOps for OrgVdcOps<'a> {
    type Descriptor = OrgVdcParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "VDC"
    }

    fn key(&self, params: &OrgVdcParams) -> String {
        params.vdc_name.clone()
    }

    async fn lookup(&self, params: &OrgVdcParams) -> Result<Lookup<String>> {
        let record = self.client.vdc().find(&self.org, &params.vdc_name).await?;
        Ok(record.map(|r| href_of(&r, "VDC")).transpose()?.into())
    }

    async fn create(&self, params: &OrgVdcParams) -> Result<Submitted> {
        let provider = params::required(&params.provider_vdc_name, "provider_vdc_name")?;
        let vdc = self.client.vdc();

        let provider_vdc_href = vdc.provider_vdc_href(provider).await?;
        let network_pool_href = match &params.network_pool_name {
            Some(pool) => Some(vdc.network_pool_href(pool).await?),
            None => None,
        };
        let mut storage_profile_hrefs = Vec::with_capacity(params.storage_profiles.len());
        for profile in &params.storage_profiles {
            storage_profile_hrefs.push(
                vdc.provider_storage_profile_href(&provider_vdc_href, &profile.name).await?,
            );
        }

        let refs = ResolvedRefs {
            provider_vdc_href,
            network_pool_href,
            storage_profile_hrefs,
        };
        let org_href = href_of(&self.client.org().get_by_name(&self.org).await?, "组织")?;
        Ok(vdc.create(&org_href, create_params(params, &refs)).await?.into())
    }

    async fn update(&self, href: &String, params: &OrgVdcParams) -> Result<Submitted> {
        Ok(self.client.vdc().update(href, update_patch(params)).await?.into())
    }

    async fn delete(&self, href: &String, _params: &OrgVdcParams) -> Result<Submitted> {
        Ok(self.client.vdc().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: OrgVdcParams = params::parse(args)?;
    let org = ctx.org_name(params.org_name.as_deref()).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = OrgVdcOps { client: ctx.client, org };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(VdcOperation::ListVdcs) => {
            let records = ctx.client.org().list_vdcs(&org).await?;
            Ok(ModuleResult::data(record_names(&records)))
        }
    }
}

fn capacity(units: &Option<String>, default_units: &str, allocated: Option<u64>, limit: Option<u64>) -> serde_json::Value {
    json!({
        "units": units.as_deref().unwrap_or(default_units),
        "allocated": allocated,
        "limit": limit,
    })
}

fn create_params(params: &OrgVdcParams, refs: &ResolvedRefs) -> serde_json::Value {
    let storage_profiles: Vec<serde_json::Value> = params
        .storage_profiles
        .iter()
        .zip(&refs.storage_profile_hrefs)
        .map(|(profile, href)| {
            json!({
                "enabled": profile.enabled,
                "units": profile.units,
                "limit": profile.limit,
                "default": profile.default,
                "providerVdcStorageProfile": { "href": href },
            })
        })
        .collect();

    compact(json!({
        "name": params.vdc_name,
        "description": params.description,
        "allocationModel": params.allocation_model.as_deref().unwrap_or("AllocationVApp"),
        "computeCapacity": {
            "cpu": capacity(&params.cpu_units, "MHz", params.cpu_allocated, params.cpu_limit),
            "memory": capacity(&params.mem_units, "MB", params.mem_allocated, params.mem_limit),
        },
        "nicQuota": params.nic_quota,
        "networkQuota": params.network_quota,
        "vmQuota": params.vm_quota,
        "isEnabled": params.is_enabled.unwrap_or(true),
        "vdcStorageProfile": storage_profiles,
        "resourceGuaranteedCpu": params.resource_guaranteed_cpu,
        "resourceGuaranteedMemory": params.resource_guaranteed_memory,
        "vCpuInMhz": params.vcpu_in_mhz,
        "isThinProvision": params.is_thin_provision,
        "networkPoolReference": refs.network_pool_href.as_ref().map(|href| json!({ "href": href })),
        "providerVdcReference": { "href": refs.provider_vdc_href },
        "usesFastProvisioning": params.uses_fast_provisioning,
        "overCommitAllowed": params.over_commit_allowed,
        "vmDiscoveryEnabled": params.vm_discovery_enabled,
    }))
}

fn update_patch(params: &OrgVdcParams) -> serde_json::Value {
    compact(json!({
        "description": params.description,
        "isEnabled": params.is_enabled,
        "computeCapacity": {
            "cpu": { "allocated": params.cpu_allocated, "limit": params.cpu_limit },
            "memory": { "allocated": params.mem_allocated, "limit": params.mem_limit },
        },
        "nicQuota": params.nic_quota,
        "networkQuota": params.network_quota,
        "vmQuota": params.vm_quota,
        "resourceGuaranteedCpu": params.resource_guaranteed_cpu,
        "resourceGuaranteedMemory": params.resource_guaranteed_memory,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> OrgVdcParams {
        params::parse(&json!({
            "vdc_name": "vdc1",
            "provider_vdc_name": "pvdc",
            "allocation_model": "Flex",
            "cpu_limit": 4000,
            "storage_profiles": [ { "name": "gold", "limit": 10240, "default": true } ],
            "state": "present"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_params() {
        let params = sample_params();
        let refs = ResolvedRefs {
            provider_vdc_href: "https://vcd/api/admin/providervdc/p1".into(),
            network_pool_href: None,
            storage_profile_hrefs: vec!["https://vcd/api/admin/pvdcStorageProfile/s1".into()],
        };

        let body = create_params(&params, &refs);
        assert_eq!(body["allocationModel"], "Flex");
        assert_eq!(body["computeCapacity"]["cpu"]["units"], "MHz");
        assert_eq!(body["computeCapacity"]["cpu"]["limit"], 4000);
        assert!(body["computeCapacity"]["cpu"].get("allocated").is_none());
        assert_eq!(body["vdcStorageProfile"][0]["units"], "MB");
        assert_eq!(body["vdcStorageProfile"][0]["enabled"], true);
        assert!(body.get("networkPoolReference").is_none());
        assert_eq!(body["isEnabled"], true);
    }

    #[test]
    fn test_update_patch_only_carries_given_fields() {
        let params: OrgVdcParams = params::parse(&json!({
            "vdc_name": "vdc1",
            "is_enabled": false,
            "state": "update"
        }))
        .unwrap();
        assert_eq!(update_patch(&params), json!({ "isEnabled": false }));
    }
}
