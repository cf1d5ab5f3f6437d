//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能，包括：
//! - 模块参数的读取与合并
//! - 按配置档案执行模块

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use vcd_executor::ModuleResult;

use crate::config::CliConfig;

/// Ansible 包装参数时使用的键
const ANSIBLE_ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// 读取参数文件
///
/// 先按 JSON 解析，失败再按 YAML 解析；`{"ANSIBLE_MODULE_ARGS": {...}}` 会被展开。
pub fn load_args(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取参数文件失败: {:?}", path))?;
    parse_args(&content).with_context(|| format!("解析参数文件失败: {:?}", path))
}

pub fn parse_args(content: &str) -> Result<serde_json::Value> {
    let args: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(_) => serde_yaml::from_str(content).context("参数既不是 JSON 也不是 YAML")?,
    };

    let args = match args {
        serde_json::Value::Object(mut map) if map.contains_key(ANSIBLE_ARGS_KEY) => {
            map.remove(ANSIBLE_ARGS_KEY).unwrap_or_default()
        }
        other => other,
    };

    if !args.is_object() {
        bail!("模块参数必须是键值对象");
    }
    Ok(args)
}

/// 解析 `key=value`
///
/// 值能按 JSON 解析时使用解析结果（数字、布尔、列表），否则作为字符串。
pub fn parse_param(param: &str) -> Result<(String, serde_json::Value)> {
    let (key, raw) = param
        .split_once('=')
        .with_context(|| format!("参数格式应为 key=value: {}", param))?;

    let key = key.trim();
    if key.is_empty() {
        bail!("参数名为空: {}", param);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// 按配置档案执行模块
pub async fn execute(name: &str, args: &serde_json::Value, profile: Option<&str>) -> Result<ModuleResult> {
    let config = CliConfig::load()?;
    let runner = config.runner(profile)?;

    info!("执行模块: {}", name);
    Ok(runner.run(name, args).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_json() {
        let args = parse_args(r#"{"org_name": "acme", "state": "present"}"#).unwrap();
        assert_eq!(args["org_name"], "acme");
    }

    #[test]
    fn test_parse_ansible_wrapped() {
        let args = parse_args(r#"{"ANSIBLE_MODULE_ARGS": {"org_name": "acme"}}"#).unwrap();
        assert_eq!(args, json!({ "org_name": "acme" }));
    }

    #[test]
    fn test_parse_yaml() {
        let args = parse_args("org_name: acme\nis_enabled: true\n").unwrap();
        assert_eq!(args, json!({ "org_name": "acme", "is_enabled": true }));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_args("[1, 2]").is_err());
    }

    #[test]
    fn test_load_args_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.json");
        fs::write(&path, r#"{"vdc_name": "vdc1", "state": "absent"}"#).unwrap();

        let args = load_args(&path).unwrap();
        assert_eq!(args["state"], "absent");
        assert!(load_args(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("org_name=acme").unwrap(), ("org_name".to_string(), json!("acme")));
        assert_eq!(parse_param("cpu_limit=2000").unwrap().1, json!(2000));
        assert_eq!(parse_param("is_enabled=false").unwrap().1, json!(false));
        assert_eq!(parse_param("rights=[\"a\",\"b\"]").unwrap().1, json!(["a", "b"]));
        assert_eq!(parse_param("description=a=b").unwrap().1, json!("a=b"));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }
}
