//! 模块运行器
//!
//! 一次模块调用的完整过程：解析连接参数、登录、执行模块、注销。

use tracing::{info, warn};

use crate::connection::{AuthParams, ConnectionProfile};
use crate::modules::{self, ModuleContext};
use crate::params;
use crate::result::ModuleResult;
use crate::task_waiter::{TaskWaiter, WaitConfig};
use crate::{ExecutorError, Result};

/// 模块运行器
#[derive(Debug, Clone, Default)]
pub struct ModuleRunner {
    /// 连接档案，补充模块参数和环境变量都未给出的连接参数
    profile: ConnectionProfile,

    /// 任务等待配置
    wait: WaitConfig,
}

impl ModuleRunner {
    pub fn new(profile: ConnectionProfile, wait: WaitConfig) -> Self {
        Self { profile, wait }
    }

    /// 执行模块
    ///
    /// 注销失败不影响模块结果，只记录警告。
    pub async fn run(&self, name: &str, args: &serde_json::Value) -> Result<ModuleResult> {
        let module = modules::find(name).ok_or_else(|| ExecutorError::UnknownModule(name.to_string()))?;

        let auth: AuthParams = params::parse(args)?;
        let settings = auth.resolve(&self.profile)?;
        let mut client = settings.connect().await?;
        info!("已登录 {}，执行 {}", settings.host, module.name);

        let result = {
            let waiter = TaskWaiter::new(&client, self.wait);
            let ctx = ModuleContext::new(&client, &waiter);
            modules::run(module.name, &ctx, args).await
        };

        if let Err(e) = client.logout().await {
            warn!("注销失败: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_module_fails_before_connecting() {
        let runner = ModuleRunner::default();
        let err = runner.run("vcd_nothing", &json!({})).await.unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownModule(name) if name == "vcd_nothing"));
    }

    #[tokio::test]
    async fn test_missing_host_is_reported() {
        let runner = ModuleRunner::new(ConnectionProfile::default(), WaitConfig::default());
        let args = json!({ "org": "acme", "user": "admin", "password": "x", "host": "" });
        // 环境变量里可能配置了 VCD_HOST，只在未配置时断言
        if std::env::var("VCD_HOST").is_err() {
            let err = runner.run("vcd_org", &args).await.unwrap_err();
            assert!(matches!(err, ExecutorError::MissingParam(p) if p == "host"));
        }
    }
}
