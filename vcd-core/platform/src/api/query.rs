//! 查询服务 API
//!
//! vCD 的 typed query 接口 (`/api/query`) 是按名称查找资源的统一入口。

use reqwest::Method;
use tracing::{debug, info};

use crate::client::VcdClient;
use crate::error::Result;

/// 每页记录数
const PAGE_SIZE: usize = 128;

/// 查询服务 API
pub struct QueryApi<'a> {
    client: &'a VcdClient,
}

impl<'a> QueryApi<'a> {
    /// 创建新的查询 API 实例
    pub(crate) fn new(client: &'a VcdClient) -> Self {
        Self { client }
    }

    /// 查询记录（自动翻页）
    ///
    /// # Arguments
    /// * `query_type` - 记录类型，如 `orgVdc`、`vApp`、`adminUser`
    /// * `filter` - FIQL 过滤条件，如 `name==vdc1;orgName==org1`
    pub async fn records(&self, query_type: &str, filter: Option<&str>) -> Result<Vec<serde_json::Value>> {
        info!("查询记录: type={} filter={:?}", query_type, filter);

        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut url = format!(
                "/api/query?type={}&format=records&page={}&pageSize={}",
                query_type, page, PAGE_SIZE
            );
            if let Some(f) = filter {
                url.push_str(&format!("&filter={}", urlencoding::encode(f)));
            }

            let response: serde_json::Value = self.client.request(
                Method::GET,
                &url,
                None::<()>,
            ).await?;

            let records = response["record"].as_array().cloned().unwrap_or_default();
            let count = records.len();
            all.extend(records);

            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!("查询到 {} 条 {} 记录", all.len(), query_type);
        Ok(all)
    }

    /// 查询单条记录，没有匹配时返回 `None`
    pub async fn find_one(&self, query_type: &str, filter: &str) -> Result<Option<serde_json::Value>> {
        let records = self.records(query_type, Some(filter)).await?;
        Ok(records.into_iter().next())
    }
}

/// 拼接 FIQL 过滤条件（`;` 表示与）
pub fn filter(conditions: &[(&str, &str)]) -> String {
    conditions
        .iter()
        .map(|(k, v)| format!("{}=={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_join() {
        assert_eq!(filter(&[("name", "vm1")]), "name==vm1");
        assert_eq!(
            filter(&[("name", "vdc1"), ("orgName", "org1")]),
            "name==vdc1;orgName==org1"
        );
    }
}
