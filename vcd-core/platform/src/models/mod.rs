//! vCD 数据模型
//!
//! vCD 的资源表示体量很大且随 API 版本变化，这里只对任务做强类型建模，
//! 其余资源直接以 `serde_json::Value` 传递，由各 API 模块按需读取字段。

pub mod media;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VcdError};

/// 任务状态
///
/// 状态机: `queued/preRunning/running -> success | error | aborted | canceled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Aborted,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Error | TaskStatus::Aborted | TaskStatus::Canceled
        )
    }

    /// 状态字符串（与服务端一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::PreRunning => "preRunning",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::Aborted => "aborted",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 异步任务
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// 任务 href
    pub href: String,

    /// 任务 URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// 操作名称，如 `vdcCreateVdc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// 操作描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// 当前状态
    #[serde(default = "default_task_status")]
    pub status: TaskStatus,

    /// 进度 (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,

    /// 失败时服务端返回的错误详情
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

fn default_task_status() -> TaskStatus {
    TaskStatus::Queued
}

impl Task {
    /// 仅知道 href 的新任务（通常来自 `Location` 响应头）
    pub fn queued(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            id: None,
            operation_name: None,
            operation: None,
            status: TaskStatus::Queued,
            progress: None,
            error: None,
        }
    }

    /// 从变更请求的响应中提取任务
    ///
    /// 依次尝试：
    /// 1. 响应体本身就是任务
    /// 2. 响应体为实体，任务挂在 `tasks.task[0]`
    /// 3. `Location` 响应头指向任务
    ///
    /// 都没有时返回 `None`，表示服务端已同步完成。
    pub fn find_in(body: &serde_json::Value, location: Option<&str>) -> Result<Option<Task>> {
        if is_task_href(body["href"].as_str()) {
            return Self::parse(body.clone()).map(Some);
        }

        if let Some(first) = body["tasks"]["task"].as_array().and_then(|t| t.first()) {
            return Self::parse(first.clone()).map(Some);
        }

        match location {
            Some(href) if is_task_href(Some(href)) => Ok(Some(Task::queued(href))),
            _ => Ok(None),
        }
    }

    /// 解析任务表示
    pub fn parse(value: serde_json::Value) -> Result<Task> {
        serde_json::from_value(value).map_err(|e| VcdError::ParseError(format!("任务解析失败: {}", e)))
    }

    /// 服务端错误信息（如果有）
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e["message"].as_str())
    }
}

fn is_task_href(href: Option<&str>) -> bool {
    href.map(|h| h.contains("/task/")).unwrap_or(false)
}

/// 登录凭据
#[derive(Clone)]
pub enum Credentials {
    /// 用户名 + 密码
    Password {
        user: String,
        password: String,
        org: String,
    },

    /// 长期 API Token（通过 OAuth 刷新令牌换取访问令牌）
    ApiToken { token: String, org: String },
}

impl Credentials {
    /// 凭据所属组织
    pub fn org(&self) -> &str {
        match self {
            Credentials::Password { org, .. } => org,
            Credentials::ApiToken { org, .. } => org,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { user, org, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("org", org)
                .finish_non_exhaustive(),
            Credentials::ApiToken { org, .. } => f
                .debug_struct("ApiToken")
                .field("org", org)
                .finish_non_exhaustive(),
        }
    }
}

/// 将租户视图 href 转换为管理视图 href
///
/// `/api/org/<id>` -> `/api/admin/org/<id>`，已是管理视图时原样返回。
pub fn to_admin_href(href: &str) -> String {
    if href.contains("/api/admin/") {
        return href.to_string();
    }
    href.replacen("/api/", "/api/admin/", 1)
}

/// 从 href 中取出末尾的 UUID
pub fn id_from_href(href: &str) -> &str {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href)
}

/// 由 href 构造 URN，如 `urn:vcloud:vdc:<uuid>`
pub fn urn_from_href(kind: &str, href: &str) -> String {
    format!("urn:vcloud:{}:{}", kind, id_from_href(href))
}

/// 将 `patch` 合并进 `target`
///
/// 嵌套对象递归合并，其余值直接覆盖。更新请求只携带调用方给出的字段，
/// 由它合并到服务端当前表示上再整体提交。
pub fn merge(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, patch) => *target = patch,
    }
}

/// 读取 query 记录列表中的名称字段
pub fn record_names(records: &[serde_json::Value]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r["name"].as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(TaskStatus::Aborted.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::PreRunning.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_parse_task_body() {
        let body = json!({
            "href": "https://vcd.local/api/task/1234",
            "operationName": "vdcCreateVdc",
            "status": "preRunning",
        });
        let task = Task::find_in(&body, None).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::PreRunning);
        assert_eq!(task.operation_name.as_deref(), Some("vdcCreateVdc"));
    }

    #[test]
    fn test_unknown_status_is_not_an_error() {
        let task = Task::parse(json!({"href": "h/task/1", "status": "somethingNew"})).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
    }

    #[test]
    fn test_task_embedded_in_entity() {
        let body = json!({
            "href": "https://vcd.local/api/admin/vdc/abcd",
            "name": "vdc1",
            "tasks": { "task": [ { "href": "https://vcd.local/api/task/99", "status": "running" } ] }
        });
        let task = Task::find_in(&body, None).unwrap().unwrap();
        assert_eq!(task.href, "https://vcd.local/api/task/99");
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[test]
    fn test_task_from_location_header() {
        let task = Task::find_in(&serde_json::Value::Null, Some("https://vcd.local/api/task/7"))
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
    }

    #[test]
    fn test_synchronous_response_has_no_task() {
        let body = json!({ "href": "https://vcd.local/api/admin/org/1", "name": "org1" });
        assert!(Task::find_in(&body, Some("https://vcd.local/network/edges/x/nat/config/rules/1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_error_message() {
        let task = Task::parse(json!({
            "href": "h/task/1",
            "status": "error",
            "error": { "majorErrorCode": 400, "message": "invalid name" }
        }))
        .unwrap();
        assert_eq!(task.error_message(), Some("invalid name"));
    }

    #[test]
    fn test_merge_nested() {
        let mut vdc = json!({
            "name": "vdc1",
            "isEnabled": true,
            "computeCapacity": { "cpu": { "allocated": 1000, "limit": 2000 } }
        });
        merge(&mut vdc, json!({
            "isEnabled": false,
            "computeCapacity": { "cpu": { "limit": 4000 } }
        }));

        assert_eq!(vdc["name"], "vdc1");
        assert_eq!(vdc["isEnabled"], false);
        assert_eq!(vdc["computeCapacity"]["cpu"]["allocated"], 1000);
        assert_eq!(vdc["computeCapacity"]["cpu"]["limit"], 4000);
    }

    #[test]
    fn test_href_helpers() {
        assert_eq!(
            to_admin_href("https://vcd.local/api/org/abc"),
            "https://vcd.local/api/admin/org/abc"
        );
        assert_eq!(
            to_admin_href("https://vcd.local/api/admin/vdc/abc"),
            "https://vcd.local/api/admin/vdc/abc"
        );
        assert_eq!(id_from_href("https://vcd.local/api/vdc/abc-1/"), "abc-1");
        assert_eq!(urn_from_href("vdc", "https://vcd.local/api/vdc/abc"), "urn:vcloud:vdc:abc");
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials::Password {
            user: "admin".into(),
            password: "s3cret".into(),
            org: "System".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("s3cret"));
        assert_eq!(creds.org(), "System");
    }
}
