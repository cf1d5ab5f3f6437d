//! 角色管理 API

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::{Result, VcdError};
use crate::models::{media, merge, to_admin_href, Task};

/// 角色管理 API
pub struct RoleApi<'a> {
    client: &'a VcdClient,
}

impl<'a> RoleApi<'a> {
    /// 创建新的角色 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 在组织中按名称查找角色，返回管理视图表示
    pub async fn find(&self, org_href: &str, name: &str) -> Result<Option<serde_json::Value>> {
        let record = self.client.query()
            .find_one("adminRole", &filter(&[("name", name), ("org", org_href)]))
            .await?;

        match record.as_ref().and_then(|r| r["href"].as_str()) {
            Some(href) => self.get(href).await.map(Some),
            None => Ok(None),
        }
    }

    /// 获取角色详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &to_admin_href(href),
            None::<()>,
        ).await
    }

    /// 查询组织中的角色
    pub async fn list(&self, org_href: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询角色: {}", org_href);
        self.client.query()
            .records("adminRole", Some(&filter(&[("org", org_href)])))
            .await
    }

    /// 查询全部权限
    pub async fn list_rights(&self) -> Result<Vec<serde_json::Value>> {
        info!("查询权限");
        self.client.query().records("right", None).await
    }

    /// 解析权限名称为引用，任何一个不存在都返回 `NotFound`
    pub async fn right_references(&self, names: &[String]) -> Result<Vec<serde_json::Value>> {
        let mut references = Vec::with_capacity(names.len());
        for name in names {
            let record = self.client.query()
                .find_one("right", &filter(&[("name", name)]))
                .await?
                .ok_or_else(|| VcdError::NotFound(format!("权限 {}", name)))?;

            references.push(serde_json::json!({
                "href": record["href"],
                "name": name,
            }));
        }
        Ok(references)
    }

    /// 创建角色
    pub async fn create(
        &self,
        org_href: &str,
        name: &str,
        description: &str,
        rights: Vec<serde_json::Value>,
    ) -> Result<Option<Task>> {
        info!("创建角色: {}", name);
        self.client.submit(
            Method::POST,
            &format!("{}/roles", to_admin_href(org_href)),
            Some(media::ADMIN_ROLE),
            Some(serde_json::json!({
                "name": name,
                "description": description,
                "rightReferences": { "rightReference": rights },
            })),
        ).await
    }

    /// 修改角色
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("修改角色: {}", admin_href);

        let mut role = self.get(&admin_href).await?;
        merge(&mut role, patch);

        self.client.submit(Method::PUT, &admin_href, Some(media::ADMIN_ROLE), Some(role)).await
    }

    /// 删除角色
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("删除角色: {}", admin_href);
        self.client.submit(Method::DELETE, &admin_href, None, None).await
    }
}

/// 角色中已有的权限名称
pub fn right_names(role: &serde_json::Value) -> Vec<String> {
    role["rightReferences"]["rightReference"]
        .as_array()
        .map(|rights| {
            rights
                .iter()
                .filter_map(|r| r["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
