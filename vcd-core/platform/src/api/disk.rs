//! 独立磁盘管理 API

use reqwest::Method;
use tracing::info;

use crate::api::query::filter;
use crate::client::VcdClient;
use crate::error::Result;
use crate::models::{media, merge, Task};

/// 独立磁盘管理 API
pub struct DiskApi<'a> {
    client: &'a VcdClient,
}

impl<'a> DiskApi<'a> {
    /// 创建新的磁盘 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 在 VDC 中按名称查找磁盘
    pub async fn find(&self, vdc_href: &str, name: &str) -> Result<Option<serde_json::Value>> {
        self.client.query()
            .find_one("disk", &filter(&[("name", name), ("vdc", vdc_href)]))
            .await
    }

    /// 查询 VDC 中的全部磁盘
    pub async fn list(&self, vdc_href: &str) -> Result<Vec<serde_json::Value>> {
        self.client.query()
            .records("disk", Some(&filter(&[("vdc", vdc_href)])))
            .await
    }

    /// 获取磁盘详情
    pub async fn get(&self, href: &str) -> Result<serde_json::Value> {
        self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await
    }

    /// 创建磁盘
    ///
    /// # Arguments
    /// * `vdc_href` - 所在 VDC
    /// * `disk` - `Disk` 表示（名称、容量、总线类型、存储策略等）
    pub async fn create(&self, vdc_href: &str, disk: serde_json::Value) -> Result<Option<Task>> {
        info!("创建磁盘: {}", disk["name"]);
        self.client.submit(
            Method::POST,
            &format!("{}/disk", vdc_href),
            Some(media::DISK_CREATE_PARAMS),
            Some(serde_json::json!({ "disk": disk })),
        ).await
    }

    /// 修改磁盘（名称、容量、描述、存储策略）
    pub async fn update(&self, href: &str, patch: serde_json::Value) -> Result<Option<Task>> {
        info!("修改磁盘: {}", href);
        let mut disk = self.get(href).await?;
        merge(&mut disk, patch);

        self.client.submit(Method::PUT, href, Some(media::DISK), Some(disk)).await
    }

    /// 删除磁盘
    pub async fn delete(&self, href: &str) -> Result<Option<Task>> {
        info!("删除磁盘: {}", href);
        self.client.submit(Method::DELETE, href, None, None).await
    }
}
