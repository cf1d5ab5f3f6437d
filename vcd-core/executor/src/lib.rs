//! vCD 模块执行器
//!
//! 把声明式的模块参数收敛成对 vCloud Director 的最少变更：
//!
//! - **状态收敛** (`Reconciler`): present / update / absent 三态，先查后改，保证幂等
//! - **任务等待** (`TaskWaiter`): 轮询异步任务直到终止状态或超时
//! - **连接** (`AuthParams`): 参数 > 环境变量 > 配置档案 > 默认值
//! - **模块** (`modules`): 每种资源一个适配器，按名称分发
//! - **运行器** (`ModuleRunner`): 登录、执行模块、注销

pub mod connection;
pub mod modules;
pub mod params;
pub mod reconciler;
pub mod result;
pub mod runner;
pub mod task_waiter;

pub use connection::{AuthParams, ConnectionProfile, ConnectionSettings};
pub use modules::{ModuleContext, ModuleInfo, MODULES};
pub use params::{Action, State};
pub use reconciler::{Lookup, Outcome, Reconciler, ResourceOps, RollbackPolicy, Submitted};
pub use result::ModuleResult;
pub use runner::ModuleRunner;
pub use task_waiter::{TaskOutcome, TaskSource, TaskWaiter, WaitConfig};

use std::time::Duration;

use thiserror::Error;
use vcd_platform::{TaskStatus, VcdError};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("无效的 state '{0}'，可选值: present, update, absent")]
    InvalidMode(String),

    #[error("参数错误: {0}")]
    InvalidParams(String),

    #[error("缺少参数: {0}")]
    MissingParam(String),

    #[error("不支持的操作: {0}")]
    Unsupported(String),

    #[error("未知模块: {0}")]
    UnknownModule(String),

    #[error("任务以 {status} 结束: {detail}")]
    TaskFailed { status: TaskStatus, detail: String },

    #[error("任务 {href} 在 {timeout:?} 内未完成")]
    TaskTimeout { href: String, timeout: Duration },

    #[error("Login failed for user {user} to org {org}")]
    LoginFailed { user: String, org: String },

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Platform(#[from] VcdError),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
