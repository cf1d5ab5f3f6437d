//! 虚拟数据中心管理 API

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::{Result, VcdError};
use crate::models::{media, merge, to_admin_href, Task};

/// 虚拟数据中心管理 API
pub struct VdcApi<'a> {
    client: &'a VcdClient,
}

impl<'a> VdcApi<'a> {
    /// 创建新的 VDC API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 按组织和名称查找 VDC 的 query 记录
    pub async fn find(&self, org_name: &str, vdc_name: &str) -> Result<Option<serde_json::Value>> {
        self.client.query()
            .find_one("adminOrgVdc", &filter(&[("name", vdc_name), ("orgName", org_name)]))
            .await
    }

    /// 按组织和名称获取 VDC 的租户视图 href
    pub async fn href(&self, org_name: &str, vdc_name: &str) -> Result<String> {
        let record = self.find(org_name, vdc_name)
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("VDC {}/{}", org_name, vdc_name)))?;

        record["href"]
            .as_str()
            .map(|h| h.replacen("/api/admin/", "/api/", 1))
            .ok_or_else(|| VcdError::ParseError("VDC 记录缺少 href".to_string()))
    }

    /// 获取 VDC 详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 创建 VDC
    ///
    /// # Arguments
    /// * `org_href` - 所属组织 href
    /// * `params` - `CreateVdcParams` 表示
    pub async fn create(&self, org_href: &str, params: serde_json::Value) -> Result<Option<Task>> {
        info!("创建 VDC: {}", params["name"]);
        self.client.submit(
            Method::POST,
            &format!("{}/vdcsparams", to_admin_href(org_href)),
            Some(media::CREATE_VDC_PARAMS),
            Some(params),
        ).await
    }

    /// 修改 VDC，将 `patch` 中的字段合并到当前表示后整体提交
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("修改 VDC: {}", admin_href);

        let mut vdc = self.get(&admin_href).await?;
        merge(&mut vdc, patch);

        self.client.submit(Method::PUT, &admin_href, Some(media::ADMIN_VDC), Some(vdc)).await
    }

    /// 删除 VDC（强制、递归）
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("删除 VDC: {}", admin_href);
        self.client.submit(
            Method::DELETE,
            &format!("{}?force=true&recursive=true", admin_href),
            None,
            None,
        ).await
    }

    // ============================================
    // 创建 VDC 所需的系统资源
    // ============================================

    /// 按名称获取 Provider VDC href
    pub async fn provider_vdc_href(&self, name: &str) -> Result<String> {
        self.record_href("providerVdc", &filter(&[("name", name)]), "Provider VDC", name).await
    }

    /// 按名称获取网络池 href
    pub async fn network_pool_href(&self, name: &str) -> Result<String> {
        self.record_href("networkPool", &filter(&[("name", name)]), "网络池", name).await
    }

    /// 获取 Provider VDC 下存储策略的 href
    pub async fn provider_storage_profile_href(&self, provider_vdc_href: &str, name: &str) -> Result<String> {
        self.record_href(
            "providerVdcStorageProfile",
            &filter(&[("name", name), ("providerVdc", provider_vdc_href)]),
            "存储策略",
            name,
        ).await
    }

    /// 获取 VDC 下存储策略的 href
    pub async fn storage_profile_href(&self, vdc_href: &str, name: &str) -> Result<String> {
        self.record_href(
            "orgVdcStorageProfile",
            &filter(&[("name", name), ("vdc", vdc_href)]),
            "存储策略",
            name,
        ).await
    }

    async fn record_href(&self, query_type: &str, filter: &str, what: &str, name: &str) -> Result<String> {
        let record = self.client.query()
            .find_one(query_type, filter)
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("{} {}", what, name)))?;

        record["href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VcdError::ParseError(format!("{} 记录缺少 href", what)))
    }
}
