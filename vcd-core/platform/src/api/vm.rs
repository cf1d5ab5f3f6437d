//! 虚拟机管理 API
//!
//! 提供 vApp 内虚拟机的管理功能，包括：
//! - 添加（重组 vApp）、删除、修改 CPU/内存
//! - 电源操作
//! - 网卡（networkConnectionSection）
//! - 硬盘（virtualHardwareSection/disks）

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::api::vapp::PowerAction;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, merge, Task};

/// RASD 资源类型：硬盘
pub const RESOURCE_TYPE_DISK: &str = "17";

/// RASD 容量属性（MB）
pub const CAPACITY_ATTRIBUTE: &str = "{http://www.vmware.com/vcloud/v1.5}capacity";

/// 从模板添加虚拟机的参数
#[derive(Debug, Clone, Default)]
pub struct AddVmSpec {
    /// 源 VM href（模板内的 VM）
    pub source_href: String,

    /// 新 VM 名称
    pub name: String,

    /// 主机名
    pub hostname: Option<String>,

    /// 存储策略 href
    pub storage_profile_href: Option<String>,

    /// 连接的 vApp 网络
    pub network: Option<String>,

    /// IP 分配模式
    pub ip_allocation_mode: Option<String>,

    /// 添加后开机
    pub power_on: bool,
}

/// 虚拟机管理 API
pub struct VmApi<'a> {
    client: &'a VcdClient,
}

impl<'a> VmApi<'a> {
    /// 创建新的虚拟机 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 在 vApp 中按名称查找虚拟机
    pub async fn find(&self, vapp_href: &str, name: &str) -> Result<Option<serde_json::Value>> {
        self.client.query()
            .find_one("vm", &filter(&[("name", name), ("container", vapp_href)]))
            .await
    }

    /// 获取虚拟机详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 在 vApp 模板中查找 VM 的 href
    pub async fn find_in_template(&self, template_href: &str, vm_name: &str) -> Result<Option<String>> {
        let template: serde_json::Value = self.client.request(
            Method::GET,
            template_href,
            None::<()>,
        ).await?;

        Ok(template["children"]["vm"]
            .as_array()
            .and_then(|vms| vms.iter().find(|vm| vm["name"].as_str() == Some(vm_name)))
            .and_then(|vm| vm["href"].as_str().map(str::to_string)))
    }

    /// 向 vApp 添加虚拟机（重组 vApp）
    pub async fn add(&self, vapp_href: &str, spec: &AddVmSpec) -> Result<Option<Task>> {
        info!("添加虚拟机: {} -> {}", spec.name, vapp_href);
        self.client.submit(
            Method::POST,
            &format!("{}/action/recomposeVApp", vapp_href),
            Some(media::RECOMPOSE_VAPP_PARAMS),
            Some(recompose_params(spec)),
        ).await
    }

    /// 删除虚拟机
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        info!("删除虚拟机: {}", href);
        self.client.submit(Method::DELETE, href, None, None).await
    }

    /// 修改虚拟机配置（合并 `patch` 后调用 reconfigureVm）
    pub async fn reconfigure(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        info!("修改虚拟机配置: {}", href);
        let mut vm = self.get(href).await?;
        merge(&mut vm, patch);

        self.client.submit(
            Method::POST,
            &format!("{}/action/reconfigureVm", href),
            Some(media::VM),
            Some(vm),
        ).await
    }

    /// 执行电源操作
    pub async fn power(&self, href: &str, action: PowerAction) -> Result<Option<Task>> {
        self.client.vapp().power(href, action).await
    }

    /// 获取网卡配置段
    pub async fn network_connections(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &format!("{}/networkConnectionSection", href),
            None::<()>,
        ).await
    }

    /// 提交网卡配置段（整体替换）
    pub async fn put_network_connections(&self, href: &str, section: serde_json::Value) -> Result<Option<Task>> {
        info!("更新虚拟机网卡: {}", href);
        self.client.submit(
            Method::PUT,
            &format!("{}/networkConnectionSection", href),
            Some(media::NETWORK_CONNECTION_SECTION),
            Some(section),
        ).await
    }

    /// 获取硬盘 RASD 列表
    pub async fn disks(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &format!("{}/virtualHardwareSection/disks", href),
            None::<()>,
        ).await
    }

    /// 提交硬盘 RASD 列表（整体替换）
    pub async fn put_disks(&self, href: &str, items: serde_json::Value) -> Result<Option<Task>> {
        info!("更新虚拟机硬盘: {}", href);
        self.client.submit(
            Method::PUT,
            &format!("{}/virtualHardwareSection/disks", href),
            Some(media::RASD_ITEMS_LIST),
            Some(items),
        ).await
    }
}

/// RASD 条目的字段值（`{"value": ...}` 包装）
pub fn rasd_value(item: &serde_json::Value, field: &str) -> Option<String> {
    match &item[field]["value"] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RASD 列表中的硬盘条目
pub fn disk_items(rasd: &serde_json::Value) -> Vec<&serde_json::Value> {
    rasd["item"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|i| rasd_value(i, "resourceType").as_deref() == Some(RESOURCE_TYPE_DISK))
                .collect()
        })
        .unwrap_or_default()
}

/// 硬盘条目的容量（MB）
pub fn disk_capacity_mb(item: &serde_json::Value) -> Option<u64> {
    item["hostResource"][0]["otherAttributes"][CAPACITY_ATTRIBUTE]
        .as_str()
        .and_then(|c| c.parse().ok())
}

fn recompose_params(spec: &AddVmSpec) -> serde_json::Value {
    let mut instantiation = serde_json::json!({});
    if let Some(network) = &spec.network {
        instantiation["networkConnectionSection"] = serde_json::json!({
            "primaryNetworkConnectionIndex": 0,
            "networkConnection": [{
                "network": network,
                "networkConnectionIndex": 0,
                "isConnected": true,
                "ipAddressAllocationMode": spec.ip_allocation_mode.as_deref().unwrap_or("DHCP"),
            }],
        });
    }
    if let Some(hostname) = &spec.hostname {
        instantiation["guestCustomizationSection"] = serde_json::json!({
            "enabled": true,
            "computerName": hostname,
        });
    }

    let mut item = serde_json::json!({
        "source": { "href": spec.source_href },
        "vmGeneralParams": { "name": spec.name },
        "instantiationParams": instantiation,
    });
    if let Some(profile) = &spec.storage_profile_href {
        item["storageProfile"] = serde_json::json!({ "href": profile });
    }

    serde_json::json!({
        "sourcedItem": [item],
        "allEULAsAccepted": true,
        "powerOn": spec.power_on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rasd() -> serde_json::Value {
        json!({
            "item": [
                {
                    "instanceID": { "value": 2 },
                    "resourceType": { "value": "6" },
                    "elementName": { "value": "SCSI Controller 0" }
                },
                {
                    "instanceID": { "value": "2000" },
                    "resourceType": { "value": "17" },
                    "elementName": { "value": "Hard disk 1" },
                    "hostResource": [ { "otherAttributes": { "{http://www.vmware.com/vcloud/v1.5}capacity": "16384" } } ]
                }
            ]
        })
    }

    #[test]
    fn test_disk_items_filters_controllers() {
        let rasd = rasd();
        let disks = disk_items(&rasd);
        assert_eq!(disks.len(), 1);
        assert_eq!(rasd_value(disks[0], "instanceID").as_deref(), Some("2000"));
        assert_eq!(disk_capacity_mb(disks[0]), Some(16384));
    }

    #[test]
    fn test_recompose_params() {
        let spec = AddVmSpec {
            source_href: "https://vcd/api/vAppTemplate/vm-1".into(),
            name: "web01".into(),
            network: Some("web".into()),
            ..Default::default()
        };
        let params = recompose_params(&spec);
        let item = &params["sourcedItem"][0];
        assert_eq!(item["vmGeneralParams"]["name"], "web01");
        assert_eq!(
            item["instantiationParams"]["networkConnectionSection"]["networkConnection"][0]["ipAddressAllocationMode"],
            "DHCP"
        );
        assert!(item.get("storageProfile").is_none());
        assert_eq!(params["powerOn"], false);
    }
}
