//! vcd_vapp_network: vApp 网络
//!
//! - state: present / absent
//! - operation: read
//!
//! vApp 网络保存在 vApp 的 networkConfigSection 中，增删都是整段替换。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use vcd_platform::VcdClient;

use crate::modules::ModuleContext;
use crate::params::{self, Action};
use crate::reconciler::{Lookup, ResourceOps, Submitted};
use crate::{ModuleResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VappNetworkOperation {
    Read,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VappNetworkParams {
    pub network: String,

    pub vapp: String,

    pub vdc: String,

    /// 上游 VDC 网络，缺省时创建隔离网络
    #[serde(default)]
    pub parent_network: Option<String>,

    #[serde(default)]
    pub fence_mode: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub operation: Option<VappNetworkOperation>,
}

pub struct VappNetworkOps<'a> {
    client: &'a VcdClient,
    vdc_href: String,
    vapp_href: String,
}

#[async_trait]
impl<'a> ResourceOps for VappNetworkOps<'a> {
    type Descriptor = VappNetworkParams;
    type Handle = serde_json::Value;

    fn kind(&self) -> &str {
        "Vapp network"
    }

    fn key(&self, params: &VappNetworkParams) -> String {
        params.network.clone()
    }

    async fn lookup(&self, params: &VappNetworkParams) -> Result<Lookup<serde_json::Value>> {
        let section = self.client.vapp().network_config(&self.vapp_href).await?;
        if find_config(&section, &params.network).is_some() {
            Ok(Lookup::Found(section))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    async fn create(&self, params: &VappNetworkParams) -> Result<Submitted> {
        let parent_href = match &params.parent_network {
            Some(parent) => Some(self.client.network().vdc_network_href(&self.vdc_href, parent).await?),
            None => None,
        };

        let mut section = self.client.vapp().network_config(&self.vapp_href).await?;
        add_config(&mut section, network_config(params, parent_href.as_deref()));
        Ok(self.client.vapp().put_network_config(&self.vapp_href, section).await?.into())
    }

    async fn delete(&self, section: &serde_json::Value, params: &VappNetworkParams) -> Result<Submitted> {
        let mut section = section.clone();
        remove_config(&mut section, &params.network);
        Ok(self.client.vapp().put_network_config(&self.vapp_href, section).await?.into())
    }
}

pub async fn run(ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let params: VappNetworkParams = params::parse(args)?;
    let vdc_href = ctx.login_vdc_href(&params.vdc).await?;
    let vapp_href = ctx.vapp_href(&vdc_href, &params.vapp).await?;

    match params::dispatch(params.state.as_deref(), params.operation)? {
        Action::State(state) => {
            let ops = VappNetworkOps { client: ctx.client, vdc_href, vapp_href };
            ctx.reconciler().apply(&ops, &params, state).await
        }
        Action::Operation(VappNetworkOperation::Read) => {
            let section = ctx.client.vapp().network_config(&vapp_href).await?;
            let networks: Vec<serde_json::Value> = section["networkConfig"]
                .as_array()
                .map(|configs| {
                    configs
                        .iter()
                        .map(|c| {
                            json!({
                                "name": c["networkName"],
                                "fence_mode": c["configuration"]["fenceMode"],
                                "parent_network": c["configuration"]["parentNetwork"]["name"],
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(ModuleResult::data(networks))
        }
    }
}

fn find_config<'v>(section: &'v serde_json::Value, name: &str) -> Option<&'v serde_json::Value> {
    section["networkConfig"]
        .as_array()
        .and_then(|configs| configs.iter().find(|c| c["networkName"].as_str() == Some(name)))
}

fn network_config(params: &VappNetworkParams, parent_href: Option<&str>) -> serde_json::Value {
    let mut configuration = json!({
        "fenceMode": params.fence_mode.as_deref().unwrap_or(if parent_href.is_some() { "bridged" } else { "isolated" }),
    });
    if let Some(href) = parent_href {
        configuration["parentNetwork"] = json!({ "href": href });
    }

    json!({
        "networkName": params.network,
        "configuration": configuration,
        "isDeployed": false,
    })
}

fn add_config(section: &mut serde_json::Value, config: serde_json::Value) {
    match section["networkConfig"].as_array_mut() {
        Some(configs) => configs.push(config),
        None => section["networkConfig"] = json!([config]),
    }
}

fn remove_config(section: &mut serde_json::Value, name: &str) {
    if let Some(configs) = section["networkConfig"].as_array_mut() {
        configs.retain(|c| c["networkName"].as_str() != Some(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(parent: Option<&str>) -> VappNetworkParams {
        VappNetworkParams {
            network: "app-net".into(),
            vapp: "web".into(),
            vdc: "vdc1".into(),
            parent_network: parent.map(str::to_string),
            fence_mode: None,
            state: Some("present".into()),
            operation: None,
        }
    }

    #[test]
    fn test_add_and_remove_config() {
        let mut section = json!({ "networkConfig": [ { "networkName": "none" } ] });

        add_config(&mut section, network_config(&params(None), None));
        assert!(find_config(&section, "app-net").is_some());
        assert_eq!(find_config(&section, "app-net").unwrap()["configuration"]["fenceMode"], "isolated");

        remove_config(&mut section, "app-net");
        assert!(find_config(&section, "app-net").is_none());
        assert!(find_config(&section, "none").is_some());
    }

    #[test]
    fn test_bridged_when_parent_given() {
        let config = network_config(&params(Some("web")), Some("https://vcd/api/network/1"));
        assert_eq!(config["configuration"]["fenceMode"], "bridged");
        assert_eq!(config["configuration"]["parentNetwork"]["href"], "https://vcd/api/network/1");
    }

    #[test]
    fn test_add_to_empty_section() {
        let mut section = json!({});
        add_config(&mut section, network_config(&params(None), None));
        assert_eq!(section["networkConfig"].as_array().map(Vec::len), Some(1));
    }
}
