//! vCD 客户端错误定义

use thiserror::Error;

/// vCD 客户端错误类型
#[derive(Error, Debug)]
pub enum VcdError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("认证错误: {0}")]
    AuthError(String),

    #[error("请求被拒绝 [400]: {0}")]
    BadRequest(String),

    #[error("API 错误 [{0}]: {1}")]
    ApiError(u16, String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("资源不存在: {0}")]
    NotFound(String),
}

impl VcdError {
    /// 是否为 "资源不存在" 类错误
    ///
    /// 调用方在查找资源时用它区分预期的缺失和真正的失败。
    pub fn is_not_found(&self) -> bool {
        matches!(self, VcdError::NotFound(_))
    }
}

/// vCD 客户端结果类型
pub type Result<T> = std::result::Result<T, VcdError>;
