//! 网络管理 API
//!
//! 提供网络管理功能，包括：
//! - 组织 VDC 网络（routed / isolated / direct）
//! - 外部网络（系统管理员）
//!
//! 两类网络都走 CloudAPI (`/cloudapi/1.0.0`)。

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::{Result, VcdError};
use crate::models::{merge, Task};

const ORG_VDC_NETWORKS: &str = "/cloudapi/1.0.0/orgVdcNetworks";
const EXTERNAL_NETWORKS: &str = "/cloudapi/1.0.0/externalNetworks";

/// 网络管理 API
pub struct NetworkApi<'a> {
    client: &'a VcdClient,
}

impl<'a> NetworkApi<'a> {
    /// 创建新的网络 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    // ============================================
    // 组织 VDC 网络
    // ============================================

    /// 查询 VDC 下的网络
    pub async fn list_vdc_networks(&self, vdc_urn: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询 VDC 网络: {}", vdc_urn);
        self.list(ORG_VDC_NETWORKS, &format!("orgVdc.id=={}", vdc_urn)).await
    }

    /// 在 VDC 中按名称查找网络
    pub async fn find_vdc_network(&self, vdc_urn: &str, name: &str) -> Result<Option<serde_json::Value>> {
        let networks = self
            .list(ORG_VDC_NETWORKS, &format!("name=={};orgVdc.id=={}", name, vdc_urn))
            .await?;
        Ok(networks.into_iter().find(|n| n["name"].as_str() == Some(name)))
    }

    /// 创建 VDC 网络
    pub async fn create_vdc_network(&self, network: serde_json::Value) -> Result<Option<Task>> {
        info!("创建 VDC 网络: {}", network["name"]);
        self.client.submit(Method::POST, ORG_VDC_NETWORKS, None, Some(network)).await
    }

    /// 修改 VDC 网络
    pub async fn update_vdc_network(&self, id: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        self.update(ORG_VDC_NETWORKS, id, patch).await
    }

    /// 删除 VDC 网络
    pub async fn delete_vdc_network(&self, id: &str) -> Result<Option<Task>> {
        info!("删除 VDC 网络: {}", id);
        self.client.submit(Method::DELETE, &format!("{}/{}", ORG_VDC_NETWORKS, id), None, None).await
    }

    // ============================================
    // 外部网络
    // ============================================

    /// 查询全部外部网络
    pub async fn list_external_networks(&self) -> Result<Vec<serde_json::Value>> {
        info!("查询外部网络");
        self.list(EXTERNAL_NETWORKS, "").await
    }

    /// 按名称查找外部网络
    pub async fn find_external_network(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let networks = self.list(EXTERNAL_NETWORKS, &format!("name=={}", name)).await?;
        Ok(networks.into_iter().find(|n| n["name"].as_str() == Some(name)))
    }

    /// 创建外部网络
    pub async fn create_external_network(&self, network: serde_json::Value) -> Result<Option<Task>> {
        info!("创建外部网络: {}", network["name"]);
        self.client.submit(Method::POST, EXTERNAL_NETWORKS, None, Some(network)).await
    }

    /// 修改外部网络
    pub async fn update_external_network(&self, id: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        self.update(EXTERNAL_NETWORKS, id, patch).await
    }

    /// 删除外部网络
    pub async fn delete_external_network(&self, id: &str) -> Result<Option<Task>> {
        info!("删除外部网络: {}", id);
        self.client.submit(Method::DELETE, &format!("{}/{}", EXTERNAL_NETWORKS, id), None, None).await
    }

    // ============================================
    // 引用解析
    // ============================================

    /// 获取 VDC 网络的旧版 href（用于 vApp 网络的上游引用）
    pub async fn vdc_network_href(&self, vdc_href: &str, name: &str) -> Result<String> {
        let record = self.client.query()
            .find_one("orgVdcNetwork", &filter(&[("name", name), ("vdc", vdc_href)]))
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("VDC 网络 {}", name)))?;

        record["href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VcdError::ParseError("VDC 网络记录缺少 href".to_string()))
    }

    /// 获取外部网络的旧版 href（用于网关上联口）
    pub async fn external_network_href(&self, name: &str) -> Result<String> {
        let record = self.client.query()
            .find_one("externalNetwork", &filter(&[("name", name)]))
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("外部网络 {}", name)))?;

        record["href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VcdError::ParseError("外部网络记录缺少 href".to_string()))
    }

    /// 按名称获取 vCenter 的 URN
    pub async fn vcenter_id(&self, name: &str) -> Result<String> {
        let centers = self
            .list("/cloudapi/1.0.0/virtualCenters", &format!("name=={}", name))
            .await?;

        centers
            .iter()
            .find(|c| c["name"].as_str() == Some(name))
            .and_then(|c| c["vcId"].as_str())
            .map(str::to_string)
            .ok_or_else(|| VcdError::NotFound(format!("vCenter {}", name)))
    }

    // ============================================
    // CloudAPI 通用
    // ============================================

    /// 分页读取 CloudAPI 集合
    async fn list(&self, collection: &str, filter: &str) -> Result<Vec<serde_json::Value>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut url = format!("{}?page={}&pageSize=128", collection, page);
            if !filter.is_empty() {
                url.push_str(&format!("&filter={}", urlencoding::encode(filter)));
            }

            let response: serde_json::Value = self.client.request(
                Method::GET,
                &url,
                None::<()>,
            ).await?;

            all.extend(response["values"].as_array().cloned().unwrap_or_default());

            let page_count = response["pageCount"].as_u64().unwrap_or(1);
            if page as u64 >= page_count {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    async fn update(&self, collection: &str, id: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let url = format!("{}/{}", collection, id);
        info!("修改网络: {}", url);

        let mut network: serde_json::Value = self.client.request(
            Method::GET,
            &url,
            None::<()>,
        ).await?;
        merge(&mut network, patch);

        self.client.submit(Method::PUT, &url, None, Some(network)).await
    }
}
