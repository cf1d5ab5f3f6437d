//! 以命令行参数执行模块

use anyhow::{Context, Result};
use tracing::error;

use super::common::{execute, parse_param};
use super::output::{failure, render};

pub async fn handle(
    name: &str,
    params: &[String],
    args_json: Option<&str>,
    format: &str,
    profile: Option<&str>,
) -> Result<()> {
    // 先校验格式，避免执行完成后才发现无法输出
    render(&serde_json::Value::Null, format)?;

    let args = build_args(params, args_json)?;

    match execute(name, &args, profile).await {
        Ok(result) => {
            println!("{}", render(&result, format)?);
            Ok(())
        }
        Err(e) => {
            error!("模块 {} 执行失败: {:#}", name, e);
            println!("{}", render(&failure(&format!("{:#}", e)), format)?);
            std::process::exit(1);
        }
    }
}

/// 合并 --args-json 与 --param，--param 优先
fn build_args(params: &[String], args_json: Option<&str>) -> Result<serde_json::Value> {
    let mut args = match args_json {
        Some(raw) => serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw)
            .context("--args-json 必须是 JSON 对象")?,
        None => serde_json::Map::new(),
    };

    for param in params {
        let (key, value) = parse_param(param)?;
        args.insert(key, value);
    }
    Ok(serde_json::Value::Object(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_override_json() {
        let args = build_args(
            &["state=absent".to_string(), "force=true".to_string()],
            Some(r#"{"org_name": "acme", "state": "present"}"#),
        )
        .unwrap();
        assert_eq!(args, json!({ "org_name": "acme", "state": "absent", "force": true }));
    }

    #[test]
    fn test_invalid_args_json() {
        assert!(build_args(&[], Some("[1]")).is_err());
        assert_eq!(build_args(&[], None).unwrap(), json!({}));
    }
}
