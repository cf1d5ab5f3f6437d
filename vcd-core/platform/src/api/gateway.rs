//! 边缘网关管理 API
//!
//! 提供边缘网关管理功能，包括：
//! - 网关的创建、修改、删除
//! - 防火墙规则
//! - NAT 规则
//! - 静态路由
//! - SSL 证书（信任库）
//!
//! 网关服务走 `/network/edges/<id>` 接口，请求同步完成，不产生任务。

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{id_from_href, media, merge, to_admin_href, Task};

/// 边缘网关管理 API
pub struct GatewayApi<'a> {
    client: &'a VcdClient,
}

impl<'a> GatewayApi<'a> {
    /// 创建新的网关 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    // ============================================
    // 网关
    // ============================================

    /// 在 VDC 中按名称查找网关
    pub async fn find(&self, vdc_href: &str, name: &str) -> Result<Option<serde_json::Value>> {
        self.client.query()
            .find_one("edgeGateway", &filter(&[("name", name), ("vdc", vdc_href)]))
            .await
    }

    /// 获取网关详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &to_admin_href(href),
            None::<()>,
        ).await
    }

    /// 创建网关
    pub async fn create(&self, vdc_href: &str, gateway: serde_json::Value) -> Result<Option<Task>> {
        info!("创建边缘网关: {}", gateway["name"]);
        self.client.submit(
            Method::POST,
            &format!("{}/edgeGateways", to_admin_href(vdc_href)),
            Some(media::ADMIN_EDGE_GATEWAY),
            Some(gateway),
        ).await
    }

    /// 修改网关
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("修改边缘网关: {}", admin_href);

        let mut gateway = self.get(&admin_href).await?;
        merge(&mut gateway, patch);

        self.client.submit(Method::PUT, &admin_href, Some(media::ADMIN_EDGE_GATEWAY), Some(gateway)).await
    }

    /// 删除网关
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("删除边缘网关: {}", admin_href);
        self.client.submit(Method::DELETE, &admin_href, None, None).await
    }

    // ============================================
    // 防火墙
    // ============================================

    /// 查询防火墙规则
    pub async fn firewall_rules(&self, gateway_href: &str) -> Result<Vec<serde_json::Value>> {
        let config: serde_json::Value = self.client.request(
            Method::GET,
            &edge_path(gateway_href, "firewall/config"),
            None::<()>,
        ).await?;
        Ok(array_at(&config, &["firewallRules", "firewallRules"]))
    }

    /// 添加防火墙规则
    pub async fn add_firewall_rule(&self, gateway_href: &str, rule: serde_json::Value) -> Result<Option<Task>> {
        info!("添加防火墙规则: {}", rule["name"]);
        self.client.submit(
            Method::POST,
            &edge_path(gateway_href, "firewall/config/rules"),
            None,
            Some(serde_json::json!({ "firewallRules": [rule] })),
        ).await
    }

    /// 修改防火墙规则
    pub async fn update_firewall_rule(
        &self,
        gateway_href: &str,
        rule_id: &str,
        rule: serde_json::Value,
    ) -> Result<Option<Task>> {
        info!("修改防火墙规则: {}", rule_id);
        self.client.submit(
            Method::PUT,
            &edge_path(gateway_href, &format!("firewall/config/rules/{}", rule_id)),
            None,
            Some(rule),
        ).await
    }

    /// 删除防火墙规则
    pub async fn delete_firewall_rule(&self, gateway_href: &str, rule_id: &str) -> Result<Option<Task>> {
        info!("删除防火墙规则: {}", rule_id);
        self.client.submit(
            Method::DELETE,
            &edge_path(gateway_href, &format!("firewall/config/rules/{}", rule_id)),
            None,
            None,
        ).await
    }

    // ============================================
    // NAT
    // ============================================

    /// 查询 NAT 规则
    pub async fn nat_rules(&self, gateway_href: &str) -> Result<Vec<serde_json::Value>> {
        let config: serde_json::Value = self.client.request(
            Method::GET,
            &edge_path(gateway_href, "nat/config"),
            None::<()>,
        ).await?;
        Ok(array_at(&config, &["natRules", "natRulesDtos"]))
    }

    /// 添加 NAT 规则
    pub async fn add_nat_rule(&self, gateway_href: &str, rule: serde_json::Value) -> Result<Option<Task>> {
        info!("添加 NAT 规则: {} {}", rule["action"], rule["originalAddress"]);
        self.client.submit(
            Method::POST,
            &edge_path(gateway_href, "nat/config/rules"),
            None,
            Some(serde_json::json!({ "natRules": [rule] })),
        ).await
    }

    /// 修改 NAT 规则
    pub async fn update_nat_rule(
        &self,
        gateway_href: &str,
        rule_id: &str,
        rule: serde_json::Value,
    ) -> Result<Option<Task>> {
        info!("修改 NAT 规则: {}", rule_id);
        self.client.submit(
            Method::PUT,
            &edge_path(gateway_href, &format!("nat/config/rules/{}", rule_id)),
            None,
            Some(rule),
        ).await
    }

    /// 删除 NAT 规则
    pub async fn delete_nat_rule(&self, gateway_href: &str, rule_id: &str) -> Result<Option<Task>> {
        info!("删除 NAT 规则: {}", rule_id);
        self.client.submit(
            Method::DELETE,
            &edge_path(gateway_href, &format!("nat/config/rules/{}", rule_id)),
            None,
            None,
        ).await
    }

    // ============================================
    // 静态路由
    // ============================================

    /// 获取静态路由配置
    pub async fn static_routing(&self, gateway_href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &edge_path(gateway_href, "routing/config/static"),
            None::<()>,
        ).await
    }

    /// 提交静态路由配置（整体替换）
    pub async fn put_static_routing(&self, gateway_href: &str, config: serde_json::Value) -> Result<Option<Task>> {
        info!("更新静态路由: {}", gateway_href);
        self.client.submit(
            Method::PUT,
            &edge_path(gateway_href, "routing/config/static"),
            None,
            Some(config),
        ).await
    }

    // ============================================
    // SSL 证书
    // ============================================

    /// 查询网关信任库中的证书
    pub async fn certificates(&self, gateway_href: &str) -> Result<Vec<serde_json::Value>> {
        let response: serde_json::Value = self.client.request(
            Method::GET,
            &format!("/network/services/truststore/certificate/scope/{}", id_from_href(gateway_href)),
            None::<()>,
        ).await?;
        Ok(array_at(&response, &["certificates"]))
    }

    /// 上传证书
    pub async fn add_certificate(&self, gateway_href: &str, certificate: serde_json::Value) -> Result<Option<Task>> {
        info!("上传证书: {}", certificate["name"]);
        self.client.submit(
            Method::POST,
            &format!("/network/services/truststore/certificate/{}", id_from_href(gateway_href)),
            None,
            Some(certificate),
        ).await
    }

    /// 删除证书
    pub async fn delete_certificate(&self, certificate_id: &str) -> Result<Option<Task>> {
        info!("删除证书: {}", certificate_id);
        self.client.submit(
            Method::DELETE,
            &format!("/network/services/truststore/certificate/{}", certificate_id),
            None,
            None,
        ).await
    }
}

/// 网关服务路径 `/network/edges/<id>/<suffix>`
fn edge_path(gateway_href: &str, suffix: &str) -> String {
    format!("/network/edges/{}/{}", id_from_href(gateway_href), suffix)
}

/// 沿路径读取嵌套数组，缺失时返回空列表
fn array_at(value: &serde_json::Value, path: &[&str]) -> Vec<serde_json::Value> {
    path.iter()
        .fold(value, |v, key| &v[*key])
        .as_array()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_path_uses_gateway_id() {
        assert_eq!(
            edge_path("https://vcd/api/admin/edgeGateway/e-1", "nat/config"),
            "/network/edges/e-1/nat/config"
        );
    }

    #[test]
    fn test_array_at() {
        let config = json!({ "firewallRules": { "firewallRules": [ { "name": "fw1" } ] } });
        assert_eq!(array_at(&config, &["firewallRules", "firewallRules"]).len(), 1);
        assert!(array_at(&config, &["natRules", "natRulesDtos"]).is_empty());
    }
}
