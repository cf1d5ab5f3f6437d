//! vApp 管理 API
//!
//! 提供 vApp 管理功能，包括：
//! - 基本操作：创建（空 vApp 或从模板实例化）、删除
//! - 电源操作：开机、关机、部署、取消部署
//! - vApp 网络：查询、添加、移除

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, Task};

/// 电源/部署操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    PowerOn,
    PowerOff,
    Reboot,
    Deploy,
    Undeploy,
}

impl PowerAction {
    /// 相对资源 href 的操作路径
    pub fn path(&self) -> &'static str {
        match self {
            PowerAction::PowerOn => "power/action/powerOn",
            PowerAction::PowerOff => "power/action/powerOff",
            PowerAction::Reboot => "power/action/reboot",
            PowerAction::Deploy => "action/deploy",
            PowerAction::Undeploy => "action/undeploy",
        }
    }

    /// 请求体（部分操作需要参数）
    pub fn body(&self) -> Option<(&'static str, serde_json::Value)> {
        match self {
            PowerAction::Deploy => Some((
                media::DEPLOY_VAPP_PARAMS,
                serde_json::json!({ "powerOn": false }),
            )),
            PowerAction::Undeploy => Some((
                media::UNDEPLOY_VAPP_PARAMS,
                serde_json::json!({ "undeployPowerAction": "default" }),
            )),
            _ => None,
        }
    }
}

/// 新建 vApp 的网络连接
#[derive(Debug, Clone, Default)]
pub struct VappNetworkSpec {
    /// 上游 VDC 网络名称
    pub network: String,

    /// 上游 VDC 网络 href
    pub network_href: String,

    /// 隔离模式：bridged / natRouted / isolated
    pub fence_mode: String,
}

/// vApp 管理 API
pub struct VappApi<'a> {
    client: &'a VcdClient,
}

impl<'a> VappApi<'a> {
    /// 创建新的 vApp API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 在 VDC 中按名称查找 vApp
    pub async fn find(&self, vdc_href: &str, name: &str) -> Result<Option<serde_json::Value>> {
        self.client.query()
            .find_one("vApp", &filter(&[("name", name), ("vdc", vdc_href)]))
            .await
    }

    /// 获取 vApp 详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 创建空 vApp
    pub async fn compose(
        &self,
        vdc_href: &str,
        name: &str,
        description: &str,
        network: Option<&VappNetworkSpec>,
    ) -> Result<Option<Task>> {
        info!("创建 vApp: {}", name);
        let mut body = serde_json::json!({
            "name": name,
            "description": description,
            "deploy": false,
            "powerOn": false,
        });
        if let Some(network) = network {
            body["instantiationParams"] = instantiation_params(network);
        }

        self.client.submit(
            Method::POST,
            &format!("{}/action/composeVApp", vdc_href),
            Some(media::COMPOSE_VAPP_PARAMS),
            Some(body),
        ).await
    }

    /// 从 vApp 模板实例化
    pub async fn instantiate(
        &self,
        vdc_href: &str,
        name: &str,
        template_href: &str,
        network: Option<&VappNetworkSpec>,
        deploy: bool,
        power_on: bool,
    ) -> Result<Option<Task>> {
        info!("从模板实例化 vApp: {} <- {}", name, template_href);
        let mut body = serde_json::json!({
            "name": name,
            "deploy": deploy,
            "powerOn": power_on,
            "allEULAsAccepted": true,
            "source": { "href": template_href },
        });
        if let Some(network) = network {
            body["instantiationParams"] = instantiation_params(network);
        }

        self.client.submit(
            Method::POST,
            &format!("{}/action/instantiateVAppTemplate", vdc_href),
            Some(media::INSTANTIATE_VAPP_TEMPLATE_PARAMS),
            Some(body),
        ).await
    }

    /// 删除 vApp
    pub async fn delete(&self, href: &str, force: bool) -> Result<Option<Task>> {
        info!("删除 vApp: {}", href);
        self.client.submit(
            Method::DELETE,
            &format!("{}?force={}", href, force),
            None,
            None,
        ).await
    }

    /// 执行电源/部署操作（vApp 与 VM 共用）
    pub async fn power(&self, href: &str, action: PowerAction) -> Result<Option<Task>> {
        info!("执行 {:?}: {}", action, href);
        let (content_type, body) = match action.body() {
            Some((content_type, body)) => (Some(content_type), Some(body)),
            None => (None, None),
        };

        self.client.submit(
            Method::POST,
            &format!("{}/{}", href.trim_end_matches('/'), action.path()),
            content_type,
            body,
        ).await
    }

    /// 查询 vApp 中的虚拟机
    pub async fn list_vms(&self, href: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询 vApp 虚拟机: {}", href);
        self.client.query()
            .records("vm", Some(&filter(&[("container", href)])))
            .await
    }

    /// 获取 vApp 网络配置
    pub async fn network_config(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &format!("{}/networkConfigSection", href),
            None::<()>,
        ).await
    }

    /// 提交 vApp 网络配置（整体替换）
    pub async fn put_network_config(&self, href: &str, section: serde_json::Value) -> Result<Option<Task>> {
        info!("更新 vApp 网络配置: {}", href);
        self.client.submit(
            Method::PUT,
            &format!("{}/networkConfigSection", href),
            Some(media::NETWORK_CONFIG_SECTION),
            Some(section),
        ).await
    }

    /// 查询 vApp 网络名称
    pub async fn list_networks(&self, href: &str) -> Result<Vec<String>> {
        let section = self.network_config(href).await?;
        Ok(network_names(&section))
    }
}

/// 网络配置段中的网络名称
pub fn network_names(section: &serde_json::Value) -> Vec<String> {
    section["networkConfig"]
        .as_array()
        .map(|configs| {
            configs
                .iter()
                .filter_map(|c| c["networkName"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn instantiation_params(network: &VappNetworkSpec) -> serde_json::Value {
    serde_json::json!({
        "networkConfigSection": {
            "networkConfig": [{
                "networkName": network.network,
                "configuration": {
                    "parentNetwork": { "href": network.network_href },
                    "fenceMode": network.fence_mode,
                },
            }],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_power_action_paths() {
        assert_eq!(PowerAction::PowerOn.path(), "power/action/powerOn");
        assert_eq!(PowerAction::Undeploy.path(), "action/undeploy");
        assert!(PowerAction::PowerOff.body().is_none());
        let (content_type, body) = PowerAction::Deploy.body().unwrap();
        assert_eq!(content_type, media::DEPLOY_VAPP_PARAMS);
        assert_eq!(body["powerOn"], false);
    }

    #[test]
    fn test_network_names() {
        let section = json!({
            "networkConfig": [
                { "networkName": "web" },
                { "networkName": "none" },
            ]
        });
        assert_eq!(network_names(&section), vec!["web", "none"]);
        assert!(network_names(&json!({})).is_empty());
    }

    #[test]
    fn test_instantiation_params() {
        let spec = VappNetworkSpec {
            network: "web".into(),
            network_href: "https://vcd/api/network/1".into(),
            fence_mode: "bridged".into(),
        };
        let params = instantiation_params(&spec);
        let config = &params["networkConfigSection"]["networkConfig"][0];
        assert_eq!(config["networkName"], "web");
        assert_eq!(config["configuration"]["fenceMode"], "bridged");
    }
}
