//! 连接参数
//!
//! 每个连接参数按以下优先级取值：
//! 1. 模块参数
//! 2. 环境变量 (`VCD_USER`、`VCD_PASSWORD`、`VCD_ORG`、`VCD_HOST`、
//!    `VCD_API_VERSION`、`VCD_SSL_VERIFY`、`VCD_API_TOKEN`)
//! 3. 配置档案
//! 4. 默认值（API 版本 `30.0`，不校验证书）

use std::env;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vcd_platform::{Credentials, VcdClient, VcdConfig};

use crate::params::{lenient_bool, lenient_string, parse_bool};
use crate::{ExecutorError, Result};

/// 默认 API 版本
pub const DEFAULT_API_VERSION: &str = "30.0";

/// 模块参数中的连接部分
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub org: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub verify_ssl_certs: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_token: Option<String>,
}

/// 配置文件中的连接档案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_ssl_certs: Option<bool>,
}

/// 解析完成的连接参数
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub credentials: Credentials,
    pub api_version: String,
    pub verify_ssl: bool,
}

impl AuthParams {
    /// 使用进程环境变量解析
    pub fn resolve(&self, profile: &ConnectionProfile) -> Result<ConnectionSettings> {
        self.resolve_with(profile, |name| env::var(name).ok())
    }

    /// 使用给定的环境变量读取函数解析
    pub fn resolve_with<F>(&self, profile: &ConnectionProfile, env: F) -> Result<ConnectionSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |arg: &Option<String>, var: &str, fallback: &Option<String>| {
            arg.clone()
                .filter(|v| !v.is_empty())
                .or_else(|| env(var).filter(|v| !v.is_empty()))
                .or_else(|| fallback.clone())
        };

        let host = pick(&self.host, "VCD_HOST", &profile.host)
            .ok_or_else(|| ExecutorError::MissingParam("host".to_string()))?;
        let org = pick(&self.org, "VCD_ORG", &profile.org)
            .ok_or_else(|| ExecutorError::MissingParam("org".to_string()))?;
        let api_version = pick(&self.api_version, "VCD_API_VERSION", &profile.api_version)
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let verify_ssl = match self.verify_ssl_certs {
            Some(verify) => verify,
            None => match env("VCD_SSL_VERIFY") {
                Some(raw) => parse_bool(&raw).ok_or_else(|| {
                    ExecutorError::InvalidParams(format!("VCD_SSL_VERIFY 取值无效: {}", raw))
                })?,
                None => profile.verify_ssl_certs.unwrap_or(false),
            },
        };

        let credentials = match pick(&self.api_token, "VCD_API_TOKEN", &profile.api_token) {
            Some(token) => Credentials::ApiToken { token, org },
            None => Credentials::Password {
                user: pick(&self.user, "VCD_USER", &profile.user)
                    .ok_or_else(|| ExecutorError::MissingParam("user".to_string()))?,
                password: pick(&self.password, "VCD_PASSWORD", &profile.password)
                    .ok_or_else(|| ExecutorError::MissingParam("password".to_string()))?,
                org,
            },
        };

        Ok(ConnectionSettings {
            host,
            credentials,
            api_version,
            verify_ssl,
        })
    }
}

impl ConnectionSettings {
    /// 建立会话
    ///
    /// 登录失败统一报告为 `LoginFailed`，具体原因只写入调试日志。
    pub async fn connect(&self) -> Result<VcdClient> {
        let config = VcdConfig {
            verify_ssl: self.verify_ssl,
            api_version: self.api_version.clone(),
            ..Default::default()
        };

        info!("连接 vCD: {} (API {})", self.host, self.api_version);
        let mut client = VcdClient::new(&self.host, config)?;

        if let Err(e) = client.login(&self.credentials).await {
            debug!("登录失败原因: {}", e);
            return Err(ExecutorError::LoginFailed {
                user: self.user_label().to_string(),
                org: self.credentials.org().to_string(),
            });
        }
        Ok(client)
    }

    fn user_label(&self) -> &str {
        match &self.credentials {
            Credentials::Password { user, .. } => user,
            Credentials::ApiToken { .. } => "<api token>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_module_args_win_over_env() {
        let params = AuthParams {
            user: Some("admin".into()),
            password: Some("secret".into()),
            org: Some("acme".into()),
            host: Some("vcd.example.com".into()),
            ..Default::default()
        };
        let env = env_from(&[("VCD_USER", "other"), ("VCD_HOST", "other.example.com")]);

        let settings = params.resolve_with(&ConnectionProfile::default(), env).unwrap();
        assert_eq!(settings.host, "vcd.example.com");
        match settings.credentials {
            Credentials::Password { user, org, .. } => {
                assert_eq!(user, "admin");
                assert_eq!(org, "acme");
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_args_are_text() {
        let params: AuthParams = crate::params::parse(&serde_json::json!({
            "user": "admin",
            "password": 123456,
            "org": "acme",
            "host": "vcd.example.com",
            "api_version": 36.0
        }))
        .unwrap();

        let settings = params.resolve_with(&ConnectionProfile::default(), env_from(&[])).unwrap();
        assert_eq!(settings.api_version, "36.0");
        match settings.credentials {
            Credentials::Password { password, .. } => assert_eq!(password, "123456"),
            other => panic!("unexpected credentials: {:?}", other),
        }
    }

    #[test]
    fn test_env_and_defaults() {
        let env = env_from(&[
            ("VCD_USER", "admin"),
            ("VCD_PASSWORD", "secret"),
            ("VCD_ORG", "System"),
            ("VCD_HOST", "vcd.example.com"),
        ]);

        let settings = AuthParams::default()
            .resolve_with(&ConnectionProfile::default(), env)
            .unwrap();
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert!(!settings.verify_ssl);
        assert_eq!(settings.credentials.org(), "System");
    }

    #[test]
    fn test_profile_is_last_resort() {
        let profile = ConnectionProfile {
            host: Some("profile.example.com".into()),
            org: Some("acme".into()),
            user: Some("ops".into()),
            password: Some("pw".into()),
            api_version: Some("36.0".into()),
            verify_ssl_certs: Some(true),
            ..Default::default()
        };
        let env = env_from(&[("VCD_ORG", "from-env"), ("VCD_SSL_VERIFY", "no")]);

        let settings = AuthParams::default().resolve_with(&profile, env).unwrap();
        assert_eq!(settings.host, "profile.example.com");
        assert_eq!(settings.api_version, "36.0");
        assert_eq!(settings.credentials.org(), "from-env");
        assert!(!settings.verify_ssl);
    }

    #[test]
    fn test_api_token_replaces_password() {
        let env = env_from(&[
            ("VCD_API_TOKEN", "tok"),
            ("VCD_ORG", "acme"),
            ("VCD_HOST", "vcd.example.com"),
        ]);

        let settings = AuthParams::default()
            .resolve_with(&ConnectionProfile::default(), env)
            .unwrap();
        assert!(matches!(settings.credentials, Credentials::ApiToken { .. }));
    }

    #[test]
    fn test_missing_host() {
        let err = AuthParams::default()
            .resolve_with(&ConnectionProfile::default(), env_from(&[]))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::MissingParam(p) if p == "host"));
    }

    #[test]
    fn test_invalid_ssl_verify_env() {
        let env = env_from(&[
            ("VCD_USER", "admin"),
            ("VCD_PASSWORD", "secret"),
            ("VCD_ORG", "System"),
            ("VCD_HOST", "vcd.example.com"),
            ("VCD_SSL_VERIFY", "sometimes"),
        ]);
        let err = AuthParams::default()
            .resolve_with(&ConnectionProfile::default(), env)
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidParams(_)));
    }
}
