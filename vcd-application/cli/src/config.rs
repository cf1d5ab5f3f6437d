//! CLI 配置管理
//!
//! **数据存储方式**: TOML 文件 (~/.config/vcd/config.toml，可用 `VCD_CONFIG` 指定)
//!
//! 配置文件中的连接档案只补充模块参数和环境变量都未给出的连接参数。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vcd_executor::{ConnectionProfile, ModuleRunner, WaitConfig};

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// 连接档案
    #[serde(default)]
    pub profiles: BTreeMap<String, ConnectionProfile>,

    /// 默认档案名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// 任务等待时限（秒）
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,

    /// 任务轮询间隔（秒）
    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval: u64,

    /// 配置版本
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_task_timeout() -> u64 {
    WaitConfig::default().timeout.as_secs()
}

fn default_task_poll_interval() -> u64 {
    WaitConfig::default().poll_interval.as_secs()
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            default_profile: None,
            task_timeout: default_task_timeout(),
            task_poll_interval: default_task_poll_interval(),
            version: default_version(),
        }
    }
}

impl CliConfig {
    /// 获取配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("VCD_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("vcd").join("config.toml"))
    }

    /// 加载配置，文件不存在时使用默认配置
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 保存配置
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .context("序列化配置失败")?;

        fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }

    /// 选择连接档案
    ///
    /// 显式指定的档案必须存在；未指定时使用默认档案，没有默认档案则为空档案。
    pub fn profile(&self, name: Option<&str>) -> Result<ConnectionProfile> {
        match name.or(self.default_profile.as_deref()) {
            Some(name) => self
                .profiles
                .get(name)
                .cloned()
                .with_context(|| format!("连接档案 {} 不存在", name)),
            None => Ok(ConnectionProfile::default()),
        }
    }

    /// 任务等待配置
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_secs(self.task_timeout),
            poll_interval: Duration::from_secs(self.task_poll_interval.max(1)),
        }
    }

    /// 按档案构建模块运行器
    pub fn runner(&self, profile: Option<&str>) -> Result<ModuleRunner> {
        Ok(ModuleRunner::new(self.profile(profile)?, self.wait_config()))
    }

    /// 隐藏密码和令牌后的副本，用于显示
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for profile in config.profiles.values_mut() {
            if profile.password.is_some() {
                profile.password = Some("******".to_string());
            }
            if profile.api_token.is_some() {
                profile.api_token = Some("******".to_string());
            }
        }
        config
    }

    /// 配置模板
    pub fn template() -> Self {
        let mut config = Self::default();
        config.profiles.insert(
            "default".to_string(),
            ConnectionProfile {
                host: Some("https://vcd.example.com".to_string()),
                org: Some("System".to_string()),
                user: Some("administrator".to_string()),
                api_version: Some(vcd_executor::connection::DEFAULT_API_VERSION.to_string()),
                verify_ssl_certs: Some(false),
                ..Default::default()
            },
        );
        config.default_profile = Some("default".to_string());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(host: &str) -> ConnectionProfile {
        ConnectionProfile {
            host: Some(host.to_string()),
            org: Some("acme".to_string()),
            user: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.profiles.is_empty());
        assert_eq!(config.task_timeout, 60);
        assert_eq!(config.task_poll_interval, 2);
        assert_eq!(config.wait_config(), WaitConfig::default());
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vcd").join("config.toml");

        let mut config = CliConfig::default();
        config.profiles.insert("lab".to_string(), profile("https://lab.example.com"));
        config.default_profile = Some("lab".to_string());
        config.task_timeout = 300;
        config.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.wait_config().timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[profiles.prod]\nhost = \"https://vcd.prod\"\norg = \"ops\"\n").unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.task_poll_interval, 2);
        assert_eq!(
            config.profile(Some("prod")).unwrap().host.as_deref(),
            Some("https://vcd.prod")
        );
    }

    #[test]
    fn test_profile_selection() {
        let mut config = CliConfig::default();
        assert_eq!(config.profile(None).unwrap(), ConnectionProfile::default());

        config.profiles.insert("lab".to_string(), profile("https://lab.example.com"));
        assert!(config.profile(Some("prod")).is_err());

        config.default_profile = Some("lab".to_string());
        assert_eq!(
            config.profile(None).unwrap().host.as_deref(),
            Some("https://lab.example.com")
        );
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = CliConfig::default();
        config.profiles.insert("lab".to_string(), profile("https://lab.example.com"));

        let shown = config.redacted();
        assert_eq!(shown.profiles["lab"].password.as_deref(), Some("******"));
        assert_eq!(config.profiles["lab"].password.as_deref(), Some("secret"));
    }
}
