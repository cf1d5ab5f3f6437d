//! vCD 客户端核心实现

use std::sync::Arc;
use tokio::sync::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{VcdError, Result};
use crate::models::{Credentials, Task};
use crate::api::{
    QueryApi, TaskApi, OrgApi, VdcApi, CatalogApi, DiskApi, VappApi, VmApi,
    NetworkApi, GatewayApi, RoleApi, UserApi, NsxtApi,
};

/// 新版访问令牌响应头
const ACCESS_TOKEN_HEADER: &str = "X-VMWARE-VCLOUD-ACCESS-TOKEN";

/// 旧版会话令牌响应头
const LEGACY_TOKEN_HEADER: &str = "x-vcloud-authorization";

/// vCD 客户端配置
#[derive(Debug, Clone)]
pub struct VcdConfig {
    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 请求超时（秒）
    pub request_timeout: u64,

    /// 是否验证 SSL 证书
    pub verify_ssl: bool,

    /// API 版本，如 "30.0"
    pub api_version: String,
}

impl Default for VcdConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            request_timeout: 60,
            verify_ssl: true,
            api_version: "30.0".to_string(),
        }
    }
}

/// 会话令牌
#[derive(Debug, Clone)]
enum SessionToken {
    /// `Authorization: Bearer <token>`
    Bearer(String),

    /// `x-vcloud-authorization: <token>`
    Legacy(String),
}

/// vCD 客户端
///
/// 一次模块调用只创建一个客户端，登录后以只读方式传给各个资源 API。
pub struct VcdClient {
    /// API 基础 URL，如 `https://vcd.example.com`
    base_url: String,

    /// HTTP 客户端
    http_client: Client,

    /// 会话令牌
    session: Arc<RwLock<Option<SessionToken>>>,

    /// 登录的组织
    org: Arc<RwLock<Option<String>>>,

    /// 配置
    config: VcdConfig,
}

impl VcdClient {
    /// 创建新的 vCD 客户端
    ///
    /// `host` 可以是裸主机名（默认 https），也可以是完整 URL。
    pub fn new(host: &str, config: VcdConfig) -> Result<Self> {
        let base_url = normalize_base_url(host)?;

        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| VcdError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url,
            http_client,
            session: Arc::new(RwLock::new(None)),
            org: Arc::new(RwLock::new(None)),
            config,
        })
    }

    /// 认证登录
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let token = match credentials {
            Credentials::Password { user, password, org } => {
                info!("vCD 登录: {}@{}", user, org);
                self.login_password(user, password, org).await?
            }
            Credentials::ApiToken { token, org } => {
                info!("vCD API Token 登录: {}", org);
                self.login_api_token(token, org).await?
            }
        };

        *self.session.write().await = Some(token);
        *self.org.write().await = Some(credentials.org().to_string());

        info!("vCD 登录成功");
        Ok(())
    }

    async fn login_password(&self, user: &str, password: &str, org: &str) -> Result<SessionToken> {
        let url = format!("{}/api/sessions", self.base_url);

        let response = self.http_client
            .post(&url)
            .basic_auth(format!("{}@{}", user, org), Some(password))
            .header("Accept", self.accept_header(&url))
            .send()
            .await
            .map_err(|e| VcdError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VcdError::AuthError(format!("登录被拒绝: HTTP {}", status.as_u16())));
        }

        let headers = response.headers();
        if let Some(token) = headers.get(ACCESS_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            return Ok(SessionToken::Bearer(token.to_string()));
        }
        if let Some(token) = headers.get(LEGACY_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            return Ok(SessionToken::Legacy(token.to_string()));
        }

        Err(VcdError::AuthError("未获取到会话令牌".to_string()))
    }

    async fn login_api_token(&self, token: &str, org: &str) -> Result<SessionToken> {
        let url = if org.eq_ignore_ascii_case("system") {
            format!("{}/oauth/provider/token", self.base_url)
        } else {
            format!("{}/oauth/tenant/{}/token", self.base_url, urlencoding::encode(org))
        };

        let response = self.http_client
            .post(&url)
            .header("Accept", "application/json")
            .form(&[("grant_type", "refresh_token"), ("refresh_token", token)])
            .send()
            .await
            .map_err(|e| VcdError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VcdError::AuthError(format!("令牌交换失败: HTTP {}", status.as_u16())));
        }

        let body: serde_json::Value = response.json().await
            .map_err(|e| VcdError::ParseError(e.to_string()))?;

        body["access_token"]
            .as_str()
            .map(|t| SessionToken::Bearer(t.to_string()))
            .ok_or_else(|| VcdError::AuthError("未获取到 access_token".to_string()))
    }

    /// 注销登出
    pub async fn logout(&mut self) -> Result<()> {
        if self.session.read().await.is_none() {
            return Ok(());
        }

        info!("vCD 登出");
        let result: Result<()> = self.request(Method::DELETE, "/api/session", None::<()>).await;
        if let Err(e) = result {
            warn!("注销会话失败: {}", e);
        }

        *self.session.write().await = None;
        Ok(())
    }

    /// 当前登录的组织
    pub async fn current_org(&self) -> Result<String> {
        self.org.read().await
            .clone()
            .ok_or_else(|| VcdError::AuthError("未认证，请先登录".to_string()))
    }

    /// 获取 query 服务 API
    pub fn query(&self) -> QueryApi<'_> {
        QueryApi::new(self)
    }

    /// 获取任务 API
    pub fn task(&self) -> TaskApi<'_> {
        TaskApi::new(self)
    }

    /// 获取组织管理 API
    pub fn org(&self) -> OrgApi<'_> {
        OrgApi::new(self)
    }

    /// 获取虚拟数据中心管理 API
    pub fn vdc(&self) -> VdcApi<'_> {
        VdcApi::new(self)
    }

    /// 获取目录管理 API
    pub fn catalog(&self) -> CatalogApi<'_> {
        CatalogApi::new(self)
    }

    /// 获取独立磁盘管理 API
    pub fn disk(&self) -> DiskApi<'_> {
        DiskApi::new(self)
    }

    /// 获取 vApp 管理 API
    pub fn vapp(&self) -> VappApi<'_> {
        VappApi::new(self)
    }

    /// 获取虚拟机管理 API
    pub fn vm(&self) -> VmApi<'_> {
        VmApi::new(self)
    }

    /// 获取网络管理 API
    pub fn network(&self) -> NetworkApi<'_> {
        NetworkApi::new(self)
    }

    /// 获取边缘网关管理 API
    pub fn gateway(&self) -> GatewayApi<'_> {
        GatewayApi::new(self)
    }

    /// 获取角色管理 API
    pub fn role(&self) -> RoleApi<'_> {
        RoleApi::new(self)
    }

    /// 获取用户管理 API
    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    /// 获取 NSX-T 管理器 API
    pub fn nsxt(&self) -> NsxtApi<'_> {
        NsxtApi::new(self)
    }

    /// 发送 HTTP 请求并解析 JSON 响应
    ///
    /// 空响应体按 `null` 解析，因此 `R = ()` / `Option<_>` 可用于 204 响应。
    pub(crate) async fn request<T: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<T>,
    ) -> Result<R> {
        let body = body
            .map(|b| serde_json::to_value(b).map_err(|e| VcdError::ParseError(e.to_string())))
            .transpose()?;

        let response = self.send(method, path, None, body).await?;
        let (_, value) = read_body(response).await?;

        serde_json::from_value(value).map_err(|e| VcdError::ParseError(e.to_string()))
    }

    /// 发送变更请求，返回服务端创建的任务
    ///
    /// 同步完成的接口（如边缘网关服务）返回 `None`。
    pub(crate) async fn submit(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<Option<Task>> {
        let response = self.send(method, path, content_type, body).await?;
        let (location, value) = read_body(response).await?;

        let task = Task::find_in(&value, location.as_deref())?;
        if let Some(task) = &task {
            debug!("vCD 任务已提交: {} ({})", task.href, task.status);
        }
        Ok(task)
    }

    /// 发送请求（附带认证与版本头）
    async fn send(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let url = self.url(path);
        debug!("vCD API 请求: {} {}", method, url);

        let mut request = self.http_client
            .request(method, &url)
            .header("Accept", self.accept_header(&url));
        request = self.authorize(request).await?;

        if let Some(body) = body {
            let content_type = content_type.unwrap_or(crate::models::media::JSON);
            request = request.header("Content-Type", content_type).json(&body);
        }

        let response = request.send().await
            .map_err(|e| VcdError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await
            .unwrap_or_else(|_| "无法读取错误响应".to_string());
        warn!("API 请求失败: {} {} - {}", status, url, error_text);

        Err(match status.as_u16() {
            400 => VcdError::BadRequest(error_text),
            401 | 403 => VcdError::AuthError(error_text),
            404 => VcdError::NotFound(url),
            code => VcdError::ApiError(code, error_text),
        })
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let session = self.session.read().await;
        match session.as_ref() {
            Some(SessionToken::Bearer(token)) => Ok(request.bearer_auth(token)),
            Some(SessionToken::Legacy(token)) => Ok(request.header(LEGACY_TOKEN_HEADER, token)),
            None => Err(VcdError::AuthError("未认证，请先登录".to_string())),
        }
    }

    /// 将相对路径或完整 href 转为 URL
    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// 根据接口类型选择 Accept 头
    fn accept_header(&self, url: &str) -> String {
        if url.contains("/cloudapi/") || url.contains("/network/") {
            format!("application/json;version={}", self.config.api_version)
        } else {
            format!("application/*+json;version={}", self.config.api_version)
        }
    }

    /// 获取基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// 读取响应的 `Location` 头和 JSON 体
async fn read_body(response: Response) -> Result<(Option<String>, serde_json::Value)> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let text = response.text().await
        .map_err(|e| VcdError::HttpError(e.to_string()))?;

    if text.trim().is_empty() {
        return Ok((location, serde_json::Value::Null));
    }

    let value = serde_json::from_str(&text)
        .map_err(|e| VcdError::ParseError(e.to_string()))?;
    Ok((location, value))
}

/// 规范化主机地址
fn normalize_base_url(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(VcdError::ConfigError("host 不能为空".to_string()));
    }

    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| VcdError::ConfigError(format!("无效的 host {}: {}", host, e)))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcd_client_creation() {
        let client = VcdClient::new("vcd.example.com", VcdConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://vcd.example.com");
    }

    #[test]
    fn test_base_url_keeps_scheme_and_port() {
        assert_eq!(
            normalize_base_url("http://10.0.0.5:8443/").unwrap(),
            "http://10.0.0.5:8443"
        );
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(matches!(normalize_base_url("  "), Err(VcdError::ConfigError(_))));
    }

    #[test]
    fn test_accept_header_by_endpoint() {
        let client = VcdClient::new("vcd.example.com", VcdConfig::default()).unwrap();
        assert_eq!(
            client.accept_header("https://vcd.example.com/api/query"),
            "application/*+json;version=30.0"
        );
        assert_eq!(
            client.accept_header("https://vcd.example.com/cloudapi/1.0.0/roles"),
            "application/json;version=30.0"
        );
    }

    #[test]
    fn test_url_accepts_absolute_href() {
        let client = VcdClient::new("vcd.example.com", VcdConfig::default()).unwrap();
        assert_eq!(client.url("/api/org"), "https://vcd.example.com/api/org");
        assert_eq!(
            client.url("https://other.example.com/api/task/1"),
            "https://other.example.com/api/task/1"
        );
    }

    #[tokio::test]
    async fn test_request_requires_login() {
        let client = VcdClient::new("vcd.example.com", VcdConfig::default()).unwrap();
        let result: Result<serde_json::Value> =
            client.request(Method::GET, "/api/org", None::<()>).await;
        assert!(matches!(result, Err(VcdError::AuthError(_))));
        assert!(matches!(client.current_org().await, Err(VcdError::AuthError(_))));
    }
}
