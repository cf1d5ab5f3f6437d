//! vcd_external_network: 外部网络（系统管理员）
//!
//! - state: present / update / absent
//! - operation: list_networks

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::{compact, ModuleContext};
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalNetworkOperation {
    ListNetworks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalNetworkParams {
    pub network_name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// 承载网络所在的 vCenter
    #[serde(default)]
    pub vc_name: Option<String>,

    /// 端口组 moref，如 `dvportgroup-12`
    #[serde(default)]
    pub port_group_ids: Vec<String>,

    /// DV_PORTGROUP / PORTGROUP
    #[serde(default)]
    pub backing_type: Option<String>,

    #[serde(default)]
    pub gateway_ip: Option<String>,

    #[serde(default)]
    pub prefix_length: Option<u8>,

    /// `start-end` 形式的地址段
    #[serde(default)]
    pub ip_ranges: Vec<String>,

    #[serde(default)]
    pub primary_dns: Option<String>,

    #[serde(default)]
    pub secondary_dns: Option<String>,

    #[serde(default)]
    pub dns_suffix: Option<String>,

    #[serde(default)]
    pub new_network_name: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<ExternalNetworkOperation>,
}

pub struct ExternalNetworkOps<'a> {
    client: &'a VcdClient,
}

#[async_trait]
impl<'a> ResourceOps for ExternalNetworkOps<'a> {
    type Descriptor = ExternalNetworkParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "External network"
    }

    fn key(&self, params: &ExternalNetworkParams) -> String {
        params.network_name.clone()
    }

    async fn lookup(&self, params: &ExternalNetworkParams) -> Result<Lookup<String>> {
        let network = self.client.network().find_external_network(&params.network_name).await?;
        Ok(network
            .and_then(|n| n["id"].as_str().map(str::to_string))
            .into())
    }

    async fn create(&self, params: &ExternalNetworkParams) -> Result<Submitted> {
        let vc_name = params::required(&params.vc_name, "vc_name")?;
        let gateway_ip = params::required(&params.gateway_ip, "gateway_ip")?;
        let prefix_length = params
            .prefix_length
            .ok_or_else(|| ExecutorError::MissingParam("prefix_length".to_string()))?;
        if params.port_group_ids.is_empty() {
            return Err(ExecutorError::MissingParam("port_group_ids".to_string()));
        }

        let vc_id = self.client.network().vcenter_id(vc_name).await?;
        let body = network_body(params, &vc_id, gateway_ip, prefix_length)?;
        Ok(self.client.network().create_external_network(body).await?.into())
    }

    async fn update(&self, id: &String, params: &ExternalNetworkParams) -> Result<Submitted> {
        let patch = compact(json!({
            "name": params.new_network_name,
            "description": params.description,
        }));
        Ok(self.client.network().update_external_network(id, patch).await?.into())
    }

    async fn delete(&self, id: &String, _params: &ExternalNetworkParams) -> Result<Submitted> {
        Ok(self.client.network().delete_external_network(id).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: ExternalNetworkParams = params::parse(args)?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = ExternalNetworkOps { client: ctx.client };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(ExternalNetworkOperation::ListNetworks) => {
            let networks = ctx.client.network().list_external_networks().await?;
            let names: Vec<String> = networks
                .iter()
                .filter_map(|n| n["name"].as_str().map(str::to_string))
                .collect();
            Ok(ModuleResult::data(names))
        }
    }
}

/// 解析 `start-end` 地址段
pub(crate) fn ip_ranges(ranges: &[String]) -> Result<Vec<serde_json::Value>> {
    ranges
        .iter()
        .map(|range| {
            let (start, end) = range
                .split_once('-')
                .map(|(s, e)| (s.trim(), e.trim()))
                .unwrap_or((range.trim(), range.trim()));
            if start.is_empty() || end.is_empty() {
                return Err(ExecutorError::InvalidParams(format!("无效的地址段: {}", range)));
            }
            Ok(json!({ "startAddress": start, "endAddress": end }))
        })
        .collect()
}

fn network_body(
    params: &ExternalNetworkParams,
    vc_id: &str,
    gateway_ip: &str,
    prefix_length: u8,
) -> Result<serde_json::Value> {
    let backing_type = params.backing_type.as_deref().unwrap_or("DV_PORTGROUP");
    let backings: Vec<serde_json::Value> = params
        .port_group_ids
        .iter()
        .map(|id| {
            json!({
                "backingId": id,
                "backingType": backing_type,
                "networkProvider": { "id": vc_id },
            })
        })
        .collect();

    Ok(compact(json!({
        "name": params.network_name,
        "description": params.description,
        "networkBackings": { "values": backings },
        "subnets": {
            "values": [{
                "gateway": gateway_ip,
                "prefixLength": prefix_length,
                "dnsServer1": params.primary_dns,
                "dnsServer2": params.secondary_dns,
                "dnsSuffix": params.dns_suffix,
                "enabled": true,
                "ipRanges": { "values": ip_ranges(&params.ip_ranges)? },
            }],
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_ranges() {
        let ranges = ip_ranges(&["10.0.0.10-10.0.0.20".into(), "10.0.0.30".into()]).unwrap();
        assert_eq!(ranges[0], json!({ "startAddress": "10.0.0.10", "endAddress": "10.0.0.20" }));
        assert_eq!(ranges[1], json!({ "startAddress": "10.0.0.30", "endAddress": "10.0.0.30" }));
        assert!(ip_ranges(&["10.0.0.1-".into()]).is_err());
    }

    #[test]
    fn test_network_body() {
        let params: ExternalNetworkParams = params::parse(&json!({
            "network_name": "ext1",
            "vc_name": "vc1",
            "port_group_ids": ["dvportgroup-12"],
            "gateway_ip": "203.0.113.1",
            "prefix_length": 24,
            "ip_ranges": ["203.0.113.10-203.0.113.50"],
            "state": "present"
        }))
        .unwrap();

        let body = network_body(&params, "urn:vcloud:vimserver:1", "203.0.113.1", 24).unwrap();
        assert_eq!(body["networkBackings"]["values"][0]["backingType"], "DV_PORTGROUP");
        assert_eq!(body["subnets"]["values"][0]["prefixLength"], 24);
        assert!(body["subnets"]["values"][0].get("dnsServer1").is_none());
    }
}
