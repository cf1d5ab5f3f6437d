//! 任务 API
//!
//! 提供异步任务状态跟踪与取消。

use reqwest::Method;
use tracing::{debug, info};

use crate::client::VcdClient;
use crate::error::Result;
use crate::models::Task;

/// 任务 API
pub struct TaskApi<'a> {
    client: &'a VcdClient,
}

impl<'a> TaskApi<'a> {
    /// 创建新的任务 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 获取任务当前状态
    pub async fn get(&self, href: &str) -> Result<Task> {
        debug!("获取任务状态: {}", href);
        let value: serde_json::Value = self.client.request(
            Method::GET,
            href,
            None::<()>,
        ).await?;
        Task::parse(value)
    }

    /// 取消任务
    pub async fn cancel(&self, href: &str) -> Result<()> {
        info!("取消任务: {}", href);
        self.client.request(
            Method::POST,
            &format!("{}/action/cancel", href.trim_end_matches('/')),
            None::<()>,
        ).await
    }
}
