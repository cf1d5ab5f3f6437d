//! vcd_gateway_static_route: 网关静态路由
//!
//! - state: present / update / absent，一次可处理多条路由
//! - operation: list_routes
//!
//! 路由按目标网络识别。静态路由配置整体读取、修改后整体提交。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::{merge, VcdClient};

use crate::modules::{compact, ModuleContext};
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOperation {
    ListRoutes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticRoute {
    /// 目标网络，CIDR
    pub network: String,

    #[serde(default)]
    pub next_hop: Option<String>,

    #[serde(default)]
    pub mtu: Option<u32>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub vnic: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteParams {
    pub gateway: String,

    pub vdc: String,

    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<RouteOperation>,
}

pub struct StaticRouteOps<'a> {
    client: &'a VcdClient,
    gateway_href: String,
}

#[async_trait]
impl<'a> ResourceOps for StaticRouteOps<'a> {
    type Descriptor = StaticRoute;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Static route(s)"
    }

    fn key(&self, route: &StaticRoute) -> String {
        route.network.clone()
    }

    async fn lookup(&self, route: &StaticRoute) -> Result<Lookup<serde_json::Value>> {
        let config = self.client.gateway().static_routing(&self.gateway_href).await?;
        if position(&config, &route.network).is_some() {
            Ok(Lookup::Found(config))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    async fn create(&self, route: &StaticRoute) -> Result<Submitted> {
        let next_hop = params::required(&route.next_hop, "next_hop")?;
        let mut config = self.client.gateway().static_routing(&self.gateway_href).await?;
        add_route(&mut config, route_body(route, Some(next_hop)));
        Ok(self.client.gateway().put_static_routing(&self.gateway_href, config).await?.into())
    }

    async fn update(&self, config: &serde_json::Value, route: &StaticRoute) -> Result<Submitted> {
        let mut config = config.clone();
        if let Some(index) = position(&config, &route.network) {
            merge(
                &mut config["staticRoutes"]["staticRoutes"][index],
                route_body(route, route.next_hop.as_deref()),
            );
        }
        Ok(self.client.gateway().put_static_routing(&self.gateway_href, config).await?.into())
    }

    async fn delete(&self, config: &serde_json::Value, route: &StaticRoute) -> Result<Submitted> {
        let mut config = config.clone();
        if let Some(routes) = config["staticRoutes"]["staticRoutes"].as_array_mut() {
            routes.retain(|r| r["network"].as_str() != Some(route.network.as_str()));
        }
        Ok(self.client.gateway().put_static_routing(&self.gateway_href, config).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: RouteParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let gateway_href = ctx.gateway_href(&vdc_href, &params.gateway).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = StaticRouteOps { client: ctx.client, gateway_href };
            ctx.reconciler().apply_all(&ops, &params.static_routes, state).await
        }
        Action::Operation(RouteOperation::ListRoutes) => {
            let config = ctx.client.gateway().static_routing(&gateway_href).await?;
            let routes: Vec<serde_json::Value> = config["staticRoutes"]["staticRoutes"]
                .as_array()
                .map(|routes| {
                    routes
                        .iter()
                        .map(|r| {
                            json!({
                                "network": r["network"],
                                "next_hop": r["nextHop"],
                                "mtu": r["mtu"],
                                "description": r["description"],
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(ModuleResult::data(routes))
        }
    }
}

fn position(config: &serde_json::Value, network: &str) -> Option<usize> {
    config["staticRoutes"]["staticRoutes"]
        .as_array()
        .and_then(|routes| routes.iter().position(|r| r["network"].as_str() == Some(network)))
}

fn route_body(route: &StaticRoute, next_hop: Option<&str>) -> serde_json::Value {
    compact(json!({
        "network": route.network,
        "nextHop": next_hop,
        "mtu": route.mtu,
        "description": route.description,
        "vnic": route.vnic,
    }))
}

fn add_route(config: &mut serde_json::Value, route: serde_json::Value) {
    match config["staticRoutes"]["staticRoutes"].as_array_mut() {
        Some(routes) => routes.push(route),
        None => config["staticRoutes"] = json!({ "staticRoutes": [route] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(network: &str, next_hop: Option<&str>) -> StaticRoute {
        StaticRoute {
            network: network.into(),
            next_hop: next_hop.map(str::to_string),
            mtu: None,
            description: None,
            vnic: None,
        }
    }

    #[test]
    fn test_add_route_to_empty_config() {
        let mut config = json!({ "defaultRoute": { "gatewayAddress": "203.0.113.1" } });
        add_route(&mut config, route_body(&route("10.10.0.0/16", None), Some("10.0.0.1")));

        assert_eq!(position(&config, "10.10.0.0/16"), Some(0));
        assert_eq!(config["staticRoutes"]["staticRoutes"][0]["nextHop"], "10.0.0.1");
        assert_eq!(config["defaultRoute"]["gatewayAddress"], "203.0.113.1");
    }

    #[test]
    fn test_route_body_skips_unset() {
        let body = route_body(&route("10.10.0.0/16", None), None);
        assert_eq!(body, json!({ "network": "10.10.0.0/16" }));
    }
}
