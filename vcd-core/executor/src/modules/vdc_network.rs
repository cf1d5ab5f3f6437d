//! vcd_vdc_network: 组织 VDC 网络
//!
//! - state: present / update / absent
//! - operation: list_networks
//!
//! 支持三种网络：routed（接入边缘网关）、isolated、direct（直连外部网络）。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{urn_from_href, VcdClient, VcdError};

use crate::modules::external_network::ip_ranges;
use crate::modules::{compact, ModuleContext};
use crate::params::{self, lenient_bool, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ExecutorError, ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VdcNetworkOperation {
    ListNetworks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    Routed,
    #[default]
    Isolated,
    Direct,
}

impl NetworkType {
    fn api_name(&self) -> &'static str {
        match self {
            NetworkType::Routed => "NAT_ROUTED",
            NetworkType::Isolated => "ISOLATED",
            NetworkType::Direct => "DIRECT",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VdcNetworkParams {
    pub network_name: String,

    pub vdc: String,

    #[serde(default)]
    pub network_type: NetworkType,

    #[serde(default)]
    pub description: Option<String>,

    /// routed 网络接入的边缘网关
    #[serde(default)]
    pub gateway_name: Option<String>,

    /// direct 网络直连的外部网络
    #[serde(default)]
    pub parent_network: Option<String>,

    #[serde(default)]
    pub gateway_ip: Option<String>,

    #[serde(default)]
    pub prefix_length: Option<u8>,

    #[serde(default)]
    pub ip_ranges: Vec<String>,

    #[serde(default)]
    pub primary_dns: Option<String>,

    #[serde(default)]
    pub secondary_dns: Option<String>,

    #[serde(default)]
    pub dns_suffix: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub shared: Option<bool>,

    #[serde(default)]
    pub new_network_name: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VdcNetworkOperation>,
}

/// 按网络类型解析出的上游连接
enum Upstream {
    Gateway(String),
    External(String),
    None,
}

pub struct VdcNetworkOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
    vdc_urn: String,
}

#[async_trait]
impl<'a> ResourceOps for VdcNetworkOps<'a> {
    type Descriptor = VdcNetworkParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Network"
    }

    fn key(&self, params: &VdcNetworkParams) -> String {
        params.network_name.clone()
    }

    async fn lookup(&self, params: &VdcNetworkParams) -> Result<Lookup<String>> {
        let network = self.client.network()
            .find_vdc_network(&self.vdc_urn, &params.network_name)
            .await?;
        Ok(network
            .and_then(|n| n["id"].as_str().map(str::to_string))
            .into())
    }

    async fn create(&self, params: &VdcNetworkParams) -> Result<Submitted> {
        let upstream = match params.network_type {
            NetworkType::Routed => {
                let gateway = params::required(&params.gateway_name, "gateway_name")?;
                let record = self.client.gateway().find(&self.vdc_href, gateway).await?;
                let href = crate::modules::required_record(record, "边缘网关", gateway)?;
                Upstream::Gateway(urn_from_href("gateway", &href))
            }
            NetworkType::Direct => {
                let parent = params::required(&params.parent_network, "parent_network")?;
                let network = self.client.network()
                    .find_external_network(parent)
                    .await?
                    .ok_or_else(|| VcdError::NotFound(format!("外部网络 {}", parent)))?;
                let id = network["id"]
                    .as_str()
                    .ok_or_else(|| VcdError::ParseError("外部网络缺少 id".to_string()))?;
                Upstream::External(id.to_string())
            }
            NetworkType::Isolated => Upstream::None,
        };

        let body = network_body(params, &self.vdc_urn, &upstream)?;
        Ok(self.client.network().create_vdc_network(body).await?.into())
    }

    async fn update(&self, id: &String, params: &VdcNetworkParams) -> Result<Submitted> {
        let patch = compact(json!({
            "name": params.new_network_name,
            "description": params.description,
            "shared": params.shared,
        }));
        Ok(self.client.network().update_vdc_network(id, patch).await?.into())
    }

    async fn delete(&self, id: &String, _params: &VdcNetworkParams) -> Result<Submitted> {
        Ok(self.client.network().delete_vdc_network(id).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: VdcNetworkParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let vdc_urn = urn_from_href("vdc", &vdc_href);

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = VdcNetworkOps { client: ctx.client, vdc_href, vdc_urn };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(VdcNetworkOperation::ListNetworks) => {
            let networks = ctx.client.network().list_vdc_networks(&vdc_urn).await?;
            let listing: Vec<serde_json::Value> = networks
                .iter()
                .map(|n| json!({ "name": n["name"], "type": n["networkType"] }))
                .collect();
            Ok(ModuleResult::data(listing))
        }
    }
}

fn network_body(params: &VdcNetworkParams, vdc_urn: &str, upstream: &Upstream) -> Result<serde_json::Value> {
    let mut body = json!({
        "name": params.network_name,
        "description": params.description,
        "orgVdc": { "id": vdc_urn },
        "networkType": params.network_type.api_name(),
        "shared": params.shared,
    });

    match upstream {
        Upstream::Gateway(id) => {
            body["connection"] = json!({ "routerRef": { "id": id }, "connectionType": "INTERNAL" });
        }
        Upstream::External(id) => body["parentNetworkId"] = json!({ "id": id }),
        Upstream::None => {}
    }

    if params.network_type != NetworkType::Direct {
        let gateway_ip = params::required(&params.gateway_ip, "gateway_ip")?;
        let prefix_length = params
            .prefix_length
            .ok_or_else(|| ExecutorError::MissingParam("prefix_length".to_string()))?;
        body["subnets"] = json!({
            "values": [{
                "gateway": gateway_ip,
                "prefixLength": prefix_length,
                "dnsServer1": params.primary_dns,
                "dnsServer2": params.secondary_dns,
                "dnsSuffix": params.dns_suffix,
                "ipRanges": { "values": ip_ranges(&params.ip_ranges)? },
            }],
        });
    }

    Ok(compact(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> VdcNetworkParams {
        params::parse(&value).unwrap()
    }

    #[test]
    fn test_routed_network_body() {
        let params = params(json!({
            "network_name": "web",
            "vdc": "vdc1",
            "network_type": "routed",
            "gateway_name": "edge1",
            "gateway_ip": "10.0.0.1",
            "prefix_length": 24,
            "ip_ranges": ["10.0.0.100-10.0.0.200"],
            "state": "present"
        }));
        let body = network_body(
            &params,
            "urn:vcloud:vdc:1",
            &Upstream::Gateway("urn:vcloud:gateway:e1".into()),
        )
        .unwrap();

        assert_eq!(body["networkType"], "NAT_ROUTED");
        assert_eq!(body["connection"]["routerRef"]["id"], "urn:vcloud:gateway:e1");
        assert_eq!(body["subnets"]["values"][0]["ipRanges"]["values"][0]["startAddress"], "10.0.0.100");
        assert!(body.get("shared").is_none());
    }

    #[test]
    fn test_direct_network_has_no_subnet() {
        let params = params(json!({
            "network_name": "direct",
            "vdc": "vdc1",
            "network_type": "direct",
            "parent_network": "ext1",
            "state": "present"
        }));
        let body = network_body(&params, "urn:vcloud:vdc:1", &Upstream::External("urn:vcloud:network:x".into()))
            .unwrap();
        assert_eq!(body["parentNetworkId"]["id"], "urn:vcloud:network:x");
        assert!(body.get("subnets").is_none());
    }

    #[test]
    fn test_isolated_requires_gateway_ip() {
        let params = params(json!({ "network_name": "iso", "vdc": "vdc1", "state": "present" }));
        assert_eq!(params.network_type, NetworkType::Isolated);
        assert!(matches!(
            network_body(&params, "urn:vcloud:vdc:1", &Upstream::None),
            Err(ExecutorError::MissingParam(_))
        ));
    }
}
