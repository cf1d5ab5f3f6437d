//! vcd_gateway: 边缘网关
//!
//! - state: present / update / absent

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::{compact, href_of, ModuleContext};
use crate::params::{self, lenient_bool, State};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayParams {
    pub gateway_name: String,

    pub vdc: String,

    #[serde(default)]
    pub description: Option<String>,

    /// 上联的外部网络
    #[serde(default)]
    pub external_networks: Vec<String>,

    /// 作为默认路由的外部网络
    #[serde(default)]
    pub default_gateway: Option<String>,

    /// compact / full / full4 / x-large
    #[serde(default)]
    pub gateway_backing_config: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub ha_enabled: Option<bool>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub distributed_routing: Option<bool>,

    #[serde(default)]
    pub new_gateway_name: Option<String>,

    #[serde(default)]
    pub state: Option<String>,
}

pub struct GatewayOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
}

#[async_trait]
impl<'a> ResourceOps for GatewayOps<'a> {
    type Descriptor = GatewayParams;
    type Handle = String;

    fn kind(&self) -> &str {
        "Gateway"
    }

    fn key(&self, params: &GatewayParams) -> String {
        params.gateway_name.clone()
    }

    async fn lookup(&self, params: &GatewayParams) -> Result<Lookup<String>> {
        let record = self.client.gateway().find(&self.vdc_href, &params.gateway_name).await?;
        Ok(record.map(|r| href_of(&r, "边缘网关")).transpose()?.into())
    }

    async fn create(&self, params: &GatewayParams) -> Result<Submitted> {
        let mut uplinks = Vec::with_capacity(params.external_networks.len());
        for name in &params.external_networks {
            let href = self.client.network().external_network_href(name).await?;
            uplinks.push((name.clone(), href));
        }
        let gateway = gateway_body(params, &uplinks);
        Ok(self.client.gateway().create(&self.vdc_href, gateway).await?.into())
    }

    async fn update(&self, href: &String, params: &GatewayParams) -> Result<Submitted> {
        let patch = compact(json!({
            "name": params.new_gateway_name,
            "description": params.description,
            "configuration": {
                "haEnabled": params.ha_enabled,
                "distributedRoutingEnabled": params.distributed_routing,
            },
        }));
        Ok(self.client.gateway().update(href, patch).await?.into())
    }

    async fn delete(&self, href: &String, _params: &GatewayParams) -> Result<Submitted> {
        Ok(self.client.gateway().delete(href).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: GatewayParams = params::parse(args)?;
    let state: State = params::required(&params.state, "state")?.parse()?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;

    let ops = GatewayOps { client: ctx.client, vdc_href };
    ctx.reconciler().apply(&ops, &params, state).await
}

fn gateway_body(params: &GatewayParams, uplinks: &[(String, String)]) -> serde_json::Value {
    let interfaces: Vec<serde_json::Value> = uplinks
        .iter()
        .map(|(name, href)| {
            json!({
                "name": name,
                "displayName": name,
                "network": { "href": href, "name": name },
                "interfaceType": "uplink",
                "useForDefaultRoute": params.default_gateway.as_deref() == Some(name.as_str()),
            })
        })
        .collect();

    compact(json!({
        "name": params.gateway_name,
        "description": params.description,
        "configuration": {
            "gatewayBackingConfig": params.gateway_backing_config.as_deref().unwrap_or("compact"),
            "gatewayInterfaces": { "gatewayInterface": interfaces },
            "haEnabled": params.ha_enabled.unwrap_or(false),
            "distributedRoutingEnabled": params.distributed_routing.unwrap_or(false),
            "advancedNetworkingEnabled": true,
            "useDefaultRouteForDnsRelay": false,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_body() {
        let params: GatewayParams = params::parse(&json!({
            "gateway_name": "edge1",
            "vdc": "vdc1",
            "external_networks": ["ext1", "ext2"],
            "default_gateway": "ext2",
            "state": "present"
        }))
        .unwrap();
        let uplinks = vec![
            ("ext1".to_string(), "https://vcd/api/admin/extension/externalnet/1".to_string()),
            ("ext2".to_string(), "https://vcd/api/admin/extension/externalnet/2".to_string()),
        ];

        let body = gateway_body(&params, &uplinks);
        let interfaces = &body["configuration"]["gatewayInterfaces"]["gatewayInterface"];
        assert_eq!(interfaces[0]["useForDefaultRoute"], false);
        assert_eq!(interfaces[1]["useForDefaultRoute"], true);
        assert_eq!(body["configuration"]["gatewayBackingConfig"], "compact");
        assert!(body.get("description").is_none());
    }

    #[test]
    fn test_state_is_required() {
        let err = params::parse::<GatewayParams>(&json!({ "gateway_name": "edge1", "vdc": "vdc1" }));
        assert!(err.is_err());
    }
}
