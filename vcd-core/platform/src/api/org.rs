//! 组织管理 API
//!
//! 提供组织的查询、创建、修改、删除。所有变更走管理视图 (`/api/admin/org`)。

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::{Result, VcdError};
use crate::models::{media, to_admin_href, Task};

/// 组织管理 API
pub struct OrgApi<'a> {
    client: &'a VcdClient,
}

impl<'a> OrgApi<'a> {
    /// 创建新的组织 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 按名称查找组织，返回管理视图表示
    pub async fn find(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let record = self.client.query()
            .find_one("organization", &filter(&[("name", name)]))
            .await?;

        match record.as_ref().and_then(|r| r["href"].as_str()) {
            Some(href) => self.get(&to_admin_href(href)).await.map(Some),
            None => Ok(None),
        }
    }

    /// 按名称获取组织，不存在时返回 `NotFound`
    pub async fn get_by_name(&self, name: &str) -> Result<serde_json::Value> {
        self.find(name)
            .await?
            .ok_or_else(|| VcdError::NotFound(format!("组织 {}", name)))
    }

    /// 获取组织详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 查询全部组织
    pub async fn list(&self) -> Result<Vec<serde_json::Value>> {
        self.client.query().records("organization", None).await
    }

    /// 查询组织下的虚拟数据中心
    pub async fn list_vdcs(&self, org_name: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询组织虚拟数据中心: {}", org_name);
        self.client.query()
            .records("adminOrgVdc", Some(&filter(&[("orgName", org_name)])))
            .await
    }

    /// 创建组织
    pub async fn create(&self, name: &str, full_name: &str, is_enabled: bool) -> Result<Option<Task>> {
        info!("创建组织: {}", name);
        self.client.submit(
            Method::POST,
            "/api/admin/orgs",
            Some(media::ADMIN_ORG),
            Some(serde_json::json!({
                "name": name,
                "fullName": full_name,
                "isEnabled": is_enabled,
                "settings": {},
            })),
        ).await
    }

    /// 修改组织（仅修改传入的字段）
    pub async fn update(
        &self,
        href: &str,
        full_name: Option<&str>,
        is_enabled: Option<bool>,
    ) -> Result<Option<Task>> {
        info!("修改组织: {}", href);
        let mut org = self.get(href).await?;

        if let Some(full_name) = full_name {
            org["fullName"] = serde_json::json!(full_name);
        }
        if let Some(is_enabled) = is_enabled {
            org["isEnabled"] = serde_json::json!(is_enabled);
        }

        self.client.submit(Method::PUT, href, Some(media::ADMIN_ORG), Some(org)).await
    }

    /// 删除组织
    ///
    /// # Arguments
    /// * `force` - 同时删除组织下仍在运行的对象
    /// * `recursive` - 同时删除组织下的全部子对象
    pub async fn delete(&self, href: &str, force: bool, recursive: bool) -> Result<Option<Task>> {
        info!("删除组织: {}", href);
        self.client.submit(
            Method::DELETE,
            &format!("{}?force={}&recursive={}", href, force, recursive),
            None,
            None,
        ).await
    }
}
