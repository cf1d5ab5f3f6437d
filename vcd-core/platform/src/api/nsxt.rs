//! NSX-T 管理器 API
//!
//! 系统管理员注册/注销 NSX-T 管理器。

use reqwest::Method;
use tracing::info;

use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, Task};

const NSXT_MANAGERS: &str = "/api/admin/extension/nsxtManagers";

/// NSX-T 管理器 API
pub struct NsxtApi<'a> {
    client: &'a VcdClient,
}

impl<'a> NsxtApi<'a> {
    /// 创建新的 NSX-T API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 查询已注册的 NSX-T 管理器
    pub async fn list(&self) -> Result<Vec<serde_json::Value>> {
        info!("查询 NSX-T 管理器");
        let response: serde_json::Value = self.client.request(
            Method::GET,
            NSXT_MANAGERS,
            None::<()>,
        ).await?;
        Ok(response["nsxTManager"].as_array().cloned().unwrap_or_default())
    }

    /// 按名称查找 NSX-T 管理器
    pub async fn find(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let managers = self.list().await?;
        Ok(managers.into_iter().find(|m| m["name"].as_str() == Some(name)))
    }

    /// 注册 NSX-T 管理器
    pub async fn register(&self, manager: serde_json::Value) -> Result<Option<Task>> {
        info!("注册 NSX-T 管理器: {}", manager["name"]);
        self.client.submit(
            Method::POST,
            NSXT_MANAGERS,
            Some(media::NSXT_MANAGER),
            Some(manager),
        ).await
    }

    /// 注销 NSX-T 管理器
    pub async fn unregister(&self, href: &str) -> Result<Option<Task>> {
        info!("注销 NSX-T 管理器: {}", href);
        self.client.submit(Method::DELETE, href, None, None).await
    }
}
