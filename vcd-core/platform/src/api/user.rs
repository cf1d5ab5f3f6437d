//! 用户管理 API

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, merge, to_admin_href, Task};

/// 用户管理 API
pub struct UserApi<'a> {
    client: &'a VcdClient,
}

impl<'a> UserApi<'a> {
    /// 创建新的用户 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 在组织中按用户名查找用户
    pub async fn find(&self, org_href: &str, username: &str) -> Result<Option<serde_json::Value>> {
        let record = self.client.query()
            .find_one("adminUser", &filter(&[("name", username), ("org", org_href)]))
            .await?;

        match record.as_ref().and_then(|r| r["href"].as_str()) {
            Some(href) => self.get(href).await.map(Some),
            None => Ok(None),
        }
    }

    /// 获取用户详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            &to_admin_href(href),
            None::<()>,
        ).await
    }

    /// 查询组织中的用户
    pub async fn list(&self, org_href: &str) -> Result<Vec<serde_json::Value>> {
        info!("查询用户: {}", org_href);
        self.client.query()
            .records("adminUser", Some(&filter(&[("org", org_href)])))
            .await
    }

    /// 创建用户
    pub async fn create(&self, org_href: &str, user: serde_json::Value) -> Result<Option<Task>> {
        info!("创建用户: {}", user["name"]);
        self.client.submit(
            Method::POST,
            &format!("{}/users", to_admin_href(org_href)),
            Some(media::ADMIN_USER),
            Some(user),
        ).await
    }

    /// 修改用户
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("修改用户: {}", admin_href);

        let mut user = self.get(&admin_href).await?;
        merge(&mut user, patch);

        self.client.submit(Method::PUT, &admin_href, Some(media::ADMIN_USER), Some(user)).await
    }

    /// 删除用户
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        let admin_href = to_admin_href(href);
        info!("删除用户: {}", admin_href);
        self.client.submit(Method::DELETE, &admin_href, None, None).await
    }
}
