//! 目录管理 API

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, merge, to_admin_href, Task};

/// 目录管理 API
pub struct CatalogApi<'a> {
    client: &'a VcdClient,
}

impl<'a> CatalogApi<'a> {
    /// 创建新的目录 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 按组织和名称查找目录，返回管理视图表示
    pub async fn find(&self, org_name: &str, name: &str) -> Result<Option<serde_json::Value>> {
        let record = self.client.query()
            .find_one("adminCatalog", &filter(&[("name", name), ("orgName", org_name)]))
            .await?;

        match record.as_ref().and_then(|r| r["href"].as_str()) {
            Some(href) => self.get(&to_admin_href(href)).await.map(Some),
            None => Ok(None),
        }
    }

    /// 获取目录详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 创建目录
    pub async fn create(&self, org_href: &str, name: &str, description: &str) -> Result<Option<Task>> {
        info!("创建目录: {}", name);
        self.client.submit(
            Method::POST,
            &format!("{}/catalogs", to_admin_href(org_href)),
            Some(media::ADMIN_CATALOG),
            Some(serde_json::json!({
                "name": name,
                "description": description,
            })),
        ).await
    }

    /// 修改目录名称/描述
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("修改目录: {}", admin_href);

        let mut catalog = self.get(&admin_href).await?;
        merge(&mut catalog, patch);

        self.client.submit(Method::PUT, &admin_href, Some(media::ADMIN_CATALOG), Some(catalog)).await
    }

    /// 删除目录（强制、递归）
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("删除目录: {}", admin_href);
        self.client.submit(
            Method::DELETE,
            &format!("{}?force=true&recursive=true", admin_href),
            None,
            None,
        ).await
    }

    /// 共享/取消共享目录给组织内所有用户
    pub async fn publish(&self, href: &str, shared: bool) -> Result<Option<Task>> {
        info!("设置目录共享: {} -> {}", href, shared);
        self.client.submit(
            Method::POST,
            &format!("{}/action/publish", to_admin_href(href)),
            Some(media::PUBLISH_CATALOG_PARAMS),
            Some(serde_json::json!({ "isPublished": shared })),
        ).await
    }

    /// 查询目录项
    pub async fn list_items(&self, href: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询目录项: {}", href);
        let catalog_href = href.replacen("/api/admin/", "/api/", 1);
        self.client.query()
            .records("catalogItem", Some(&filter(&[("catalog", &catalog_href)])))
            .await
    }

    /// 在目录中查找 vApp 模板的 href
    pub async fn find_template(&self, catalog_name: &str, template_name: &str) -> Result<Option<String>> {
        let record = self.client.query()
            .find_one(
                "vAppTemplate",
                &filter(&[("name", template_name), ("catalogName", catalog_name)]),
            )
            .await?;

        Ok(record.and_then(|r| r["href"].as_str().map(str::to_string)))
    }
}
