//! 资源模块
//!
//! 每个模块对应一种 vCD 资源，入口统一为 `run(ctx, args)`：
//! 解析参数后，`state` 交给 [`Reconciler`] 收敛，`operation` 由模块自行处理。

pub mod catalog;
pub mod disk;
pub mod external_network;
pub mod firewall_rule;
pub mod gateway;
pub mod nat_rule;
pub mod org;
pub mod org_vdc;
pub mod resources;
pub mod roles;
pub mod ssl_certificate;
pub mod static_route;
pub mod user;
pub mod vapp;
pub mod vapp_network;
pub mod vapp_vm;
pub mod vapp_vm_disk;
pub mod vapp_vm_nic;
pub mod vdc_network;

use tracing::info;

use vcd_platform::{VcdClient, VcdError};

use crate::reconciler::Reconciler;
use crate::result::ModuleResult;
use crate::task_waiter::TaskWaiter;
use crate::{ExecutorError, Result};

/// 模块描述
#[derive(Debug, Clone, Copy)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// 全部模块
pub const MODULES: &[ModuleInfo] = &[
    ModuleInfo { name: "vcd_org", description: "组织" },
    ModuleInfo { name: "vcd_org_vdc", description: "组织 VDC" },
    ModuleInfo { name: "vcd_catalog", description: "目录" },
    ModuleInfo { name: "vcd_disk", description: "独立磁盘" },
    ModuleInfo { name: "vcd_vapp", description: "vApp" },
    ModuleInfo { name: "vcd_vapp_network", description: "vApp 网络" },
    ModuleInfo { name: "vcd_vapp_vm", description: "vApp 虚拟机" },
    ModuleInfo { name: "vcd_vapp_vm_nic", description: "虚拟机网卡" },
    ModuleInfo { name: "vcd_vapp_vm_disk", description: "虚拟机硬盘" },
    ModuleInfo { name: "vcd_gateway", description: "边缘网关" },
    ModuleInfo { name: "vcd_gateway_firewall_rule", description: "网关防火墙规则" },
    ModuleInfo { name: "vcd_gateway_nat_rule", description: "网关 NAT 规则" },
    ModuleInfo { name: "vcd_gateway_static_route", description: "网关静态路由" },
    ModuleInfo { name: "vcd_gateway_ssl_certificate", description: "网关 SSL 证书" },
    ModuleInfo { name: "vcd_external_network", description: "外部网络" },
    ModuleInfo { name: "vcd_vdc_network", description: "VDC 网络" },
    ModuleInfo { name: "vcd_roles", description: "角色" },
    ModuleInfo { name: "vcd_user", description: "用户" },
    ModuleInfo { name: "vcd_resources", description: "NSX-T 管理器" },
];

/// 按名称查找模块，可省略 `vcd_` 前缀
pub fn find(name: &str) -> Option<&'static ModuleInfo> {
    let full = if name.starts_with("vcd_") {
        name.to_string()
    } else {
        format!("vcd_{}", name)
    };
    MODULES.iter().find(|m| m.name == full)
}

/// 模块执行上下文
pub struct ModuleContext<'a> {
    pub client: &'a VcdClient,
    pub waiter: &'a TaskWaiter<'a>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(client: &'a VcdClient, waiter: &'a TaskWaiter<'a>) -> Self {
        Self { client, waiter }
    }

    pub fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.waiter)
    }

    /// 未显式指定时使用登录的组织
    pub async fn org_name(&self, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(org) if !org.is_empty() => Ok(org.to_string()),
            _ => Ok(self.client.current_org().await?),
        }
    }

    /// 组织 href（管理视图）
    pub async fn org_href(&self, org: &str) -> Result<String> {
        let org_value = self.client.org().get_by_name(org).await?;
        href_of(&org_value, "组织")
    }

    /// VDC href
    pub async fn vdc_href(&self, org: &str, vdc: &str) -> Result<String> {
        Ok(self.client.vdc().href(org, vdc).await?)
    }

    /// 登录组织下的 VDC href
    pub async fn login_vdc_href(&self, vdc: &str) -> Result<String> {
        let org = self.org_name(None).await?;
        self.vdc_href(&org, vdc).await
    }

    /// vApp href
    pub async fn vapp_href(&self, vdc_href: &str, vapp: &str) -> Result<String> {
        let record = self.client.vapp().find(vdc_href, vapp).await?;
        required_record(record, "vApp", vapp)
    }

    /// 虚拟机 href
    pub async fn vm_href(&self, vapp_href: &str, vm: &str) -> Result<String> {
        let record = self.client.vm().find(vapp_href, vm).await?;
        required_record(record, "虚拟机", vm)
    }

    /// 边缘网关 href
    pub async fn gateway_href(&self, vdc_href: &str, gateway: &str) -> Result<String> {
        let record = self.client.gateway().find(vdc_href, gateway).await?;
        required_record(record, "边缘网关", gateway)
    }
}

/// 执行模块
pub async fn run(name: &str, ctx: &ModuleContext<'_>, args: &serde_json::Value) -> Result<ModuleResult> {
    let module = find(name).ok_or_else(|| ExecutorError::UnknownModule(name.to_string()))?;
    info!("执行模块: {}", module.name);

    match module.name {
        "vcd_org" => org::run(ctx, args).await,
        "vcd_org_vdc" => org_vdc::run(ctx, args).await,
        "vcd_catalog" => catalog::run(ctx, args).await,
        "vcd_disk" => disk::run(ctx, args).await,
        "vcd_vapp" => vapp::run(ctx, args).await,
        "vcd_vapp_network" => vapp_network::run(ctx, args).await,
        "vcd_vapp_vm" => vapp_vm::run(ctx, args).await,
        "vcd_vapp_vm_nic" => vapp_vm_nic::run(ctx, args).await,
        "vcd_vapp_vm_disk" => vapp_vm_disk::run(ctx, args).await,
        "vcd_gateway" => gateway::run(ctx, args).await,
        "vcd_gateway_firewall_rule" => firewall_rule::run(ctx, args).await,
        "vcd_gateway_nat_rule" => nat_rule::run(ctx, args).await,
        "vcd_gateway_static_route" => static_route::run(ctx, args).await,
        "vcd_gateway_ssl_certificate" => ssl_certificate::run(ctx, args).await,
        "vcd_external_network" => external_network::run(ctx, args).await,
        "vcd_vdc_network" => vdc_network::run(ctx, args).await,
        "vcd_roles" => roles::run(ctx, args).await,
        "vcd_user" => user::run(ctx, args).await,
        "vcd_resources" => resources::run(ctx, args).await,
        other => Err(ExecutorError::UnknownModule(other.to_string())),
    }
}

/// 读取资源表示中的 href
pub(crate) fn href_of(value: &serde_json::Value, what: &str) -> Result<String> {
    value["href"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| VcdError::ParseError(format!("{} 缺少 href", what)).into())
}

/// 上级资源必须存在，缺失时报错
pub(crate) fn required_record(
    record: Option<serde_json::Value>,
    what: &str,
    name: &str,
) -> Result<String> {
    let record = record.ok_or_else(|| VcdError::NotFound(format!("{} {}", what, name)))?;
    href_of(&record, what)
}

/// 只保留调用方给出的字段
pub(crate) fn compact(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, compact(v)))
                .filter(|(_, v)| !matches!(v, serde_json::Value::Object(m) if m.is_empty()))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(compact).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_module() {
        assert_eq!(find("vcd_org").map(|m| m.name), Some("vcd_org"));
        assert_eq!(find("gateway_nat_rule").map(|m| m.name), Some("vcd_gateway_nat_rule"));
        assert!(find("vcd_unknown").is_none());
        assert_eq!(MODULES.len(), 19);
    }

    #[test]
    fn test_compact_drops_unset_fields() {
        let patch = compact(json!({
            "description": null,
            "isEnabled": false,
            "computeCapacity": { "cpu": { "limit": null } },
            "vmQuota": 10
        }));
        assert_eq!(patch, json!({ "isEnabled": false, "vmQuota": 10 }));
    }

    #[test]
    fn test_required_record() {
        let err = required_record(None, "vApp", "web").unwrap_err();
        assert!(matches!(err, ExecutorError::Platform(VcdError::NotFound(_))));

        let href = required_record(Some(json!({ "href": "https://vcd/api/vApp/vapp-1" })), "vApp", "web")
            .unwrap();
        assert_eq!(href, "https://vcd/api/vApp/vapp-1");
    }
}
