//! Ansible 模块约定
//!
//! 参数来自文件，结果以 JSON 写到 stdout；失败时输出
//! `{"failed": true, "msg": "..."}` 并以状态码 1 退出。

use anyhow::Result;
use std::path::Path;
use tracing::error;

use super::common::{execute, load_args};
use super::output::{failure, render};

pub async fn handle(name: &str, args_file: &str, profile: Option<&str>) -> Result<()> {
    let outcome = async {
        let args = load_args(Path::new(args_file))?;
        execute(name, &args, profile).await
    }
    .await;

    match outcome {
        Ok(result) => {
            println!("{}", render(&result, "json")?);
            Ok(())
        }
        Err(e) => {
            error!("模块 {} 执行失败: {:#}", name, e);
            println!("{}", render(&failure(&format!("{:#}", e)), "json")?);
            std::process::exit(1);
        }
    }
}
