//! 状态收敛
//!
//! 所有资源模块共用同一套收敛逻辑：
//!
//! | 期望状态 | 已存在 | 不存在 |
//! |----------|--------|--------|
//! | present  | 不变   | 创建   |
//! | update   | 修改   | 不变   |
//! | absent   | 删除   | 不变   |
//!
//! 每个目标最多发起一次变更，变更产生的任务等待结束后才返回。
//! 资源模块只需实现 [`ResourceOps`]。

use async_trait::async_trait;
use tracing::{debug, info, warn};

use vcd_platform::Task;

use crate::params::State;
use crate::result::ModuleResult;
use crate::task_waiter::TaskWaiter;
use crate::{ExecutorError, Result};

/// 查找结果
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<H> {
    Found(H),
    NotFound,
}

impl<H> From<Option<H>> for Lookup<H> {
    fn from(value: Option<H>) -> Self {
        match value {
            Some(handle) => Lookup::Found(handle),
            None => Lookup::NotFound,
        }
    }
}

/// 变更请求的提交结果
#[derive(Debug, Clone)]
pub enum Submitted {
    /// 服务端返回了需要等待的任务
    Task(Task),
    /// 服务端已同步完成
    Done,
}

impl From<Option<Task>> for Submitted {
    fn from(value: Option<Task>) -> Self {
        match value {
            Some(task) => Submitted::Task(task),
            None => Submitted::Done,
        }
    }
}

/// 创建失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// 保留现场
    #[default]
    None,
    /// 删除可能已部分创建的资源，再返回原始错误
    DeleteOnFailure,
}

/// 收敛结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Deleted,
    AlreadyPresent,
    NotPresent,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated | Outcome::Deleted)
    }

    fn verb(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Deleted => "deleted",
            Outcome::AlreadyPresent => "already present",
            Outcome::NotPresent => "not present",
        }
    }

    /// 单个目标的消息，如 `VDC vdc1 has been created`
    pub fn message(&self, kind: &str, key: &str) -> String {
        if self.changed() {
            format!("{} {} has been {}", kind, key, self.verb())
        } else {
            format!("{} {} is {}", kind, key, self.verb())
        }
    }

    /// 多个目标的消息，如 `Firewall rule(s) fw1, fw2 have been created`
    pub fn batch_message(&self, kind: &str, keys: &[String]) -> String {
        if self.changed() {
            format!("{} {} have been {}", kind, keys.join(", "), self.verb())
        } else {
            format!("{} {} are {}", kind, keys.join(", "), self.verb())
        }
    }
}

/// 资源适配器
#[async_trait]
pub trait ResourceOps: Send + Sync {
    /// 期望状态的描述（通常就是模块参数）
    type Descriptor: Send + Sync;

    /// 已存在资源的句柄
    type Handle: Send + Sync;

    /// 资源类别，用于结果消息
    fn kind(&self) -> &str;

    /// 目标的标识，用于结果消息
    fn key(&self, descriptor: &Self::Descriptor) -> String;

    /// 查找目标；只读，不能产生变更
    async fn lookup(&self, descriptor: &Self::Descriptor) -> Result<Lookup<Self::Handle>>;

    async fn create(&self, descriptor: &Self::Descriptor) -> Result<Submitted>;

    async fn update(&self, _handle: &Self::Handle, _descriptor: &Self::Descriptor) -> Result<Submitted> {
        Err(ExecutorError::Unsupported(format!("{} 不支持 update", self.kind())))
    }

    async fn delete(&self, handle: &Self::Handle, descriptor: &Self::Descriptor) -> Result<Submitted>;

    fn rollback_policy(&self) -> RollbackPolicy {
        RollbackPolicy::None
    }
}

/// 状态收敛器
pub struct Reconciler<'a> {
    waiter: &'a TaskWaiter<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(waiter: &'a TaskWaiter<'a>) -> Self {
        Self { waiter }
    }

    /// 把单个目标收敛到期望状态
    pub async fn reconcile<R: ResourceOps>(
        &self,
        ops: &R,
        descriptor: &R::Descriptor,
        state: State,
    ) -> Result<Outcome> {
        let key = ops.key(descriptor);
        debug!("收敛 {} {} -> {}", ops.kind(), key, state.as_str());

        let outcome = match (state, ops.lookup(descriptor).await?) {
            (State::Present, Lookup::Found(_)) => Outcome::AlreadyPresent,
            (State::Present, Lookup::NotFound) => {
                self.create(ops, descriptor).await?;
                Outcome::Created
            }
            (State::Update, Lookup::Found(handle)) => {
                let submitted = ops.update(&handle, descriptor).await?;
                self.waiter.complete(submitted).await?;
                Outcome::Updated
            }
            (State::Update, Lookup::NotFound) => Outcome::NotPresent,
            (State::Absent, Lookup::Found(handle)) => {
                let submitted = ops.delete(&handle, descriptor).await?;
                self.waiter.complete(submitted).await?;
                Outcome::Deleted
            }
            (State::Absent, Lookup::NotFound) => Outcome::NotPresent,
        };

        if outcome.changed() {
            info!("{}", outcome.message(ops.kind(), &key));
        }
        Ok(outcome)
    }

    /// 收敛单个目标并生成模块结果
    pub async fn apply<R: ResourceOps>(
        &self,
        ops: &R,
        descriptor: &R::Descriptor,
        state: State,
    ) -> Result<ModuleResult> {
        let outcome = self.reconcile(ops, descriptor, state).await?;
        let message = outcome.message(ops.kind(), &ops.key(descriptor));
        if outcome.changed() {
            Ok(ModuleResult::message(true, message))
        } else {
            Ok(ModuleResult::unchanged(message))
        }
    }

    /// 依次收敛一组同类目标
    ///
    /// 任一目标失败立即返回错误，之前已完成的变更保留。
    /// 变更的目标汇总为 `msg`，未变更的目标汇总为一条警告。
    pub async fn apply_all<R: ResourceOps>(
        &self,
        ops: &R,
        descriptors: &[R::Descriptor],
        state: State,
    ) -> Result<ModuleResult> {
        if descriptors.is_empty() {
            return Ok(ModuleResult::unchanged(format!("No {} given", ops.kind())));
        }

        let mut changed = Vec::new();
        let mut unchanged = Vec::new();
        let mut changed_outcome = None;
        let mut unchanged_outcome = None;

        for descriptor in descriptors {
            let outcome = self.reconcile(ops, descriptor, state).await?;
            let key = ops.key(descriptor);
            if outcome.changed() {
                changed.push(key);
                changed_outcome = Some(outcome);
            } else {
                unchanged.push(key);
                unchanged_outcome = Some(outcome);
            }
        }

        let mut result = match changed_outcome {
            Some(outcome) => ModuleResult::message(true, outcome.batch_message(ops.kind(), &changed)),
            None => ModuleResult::default(),
        };
        if let Some(outcome) = unchanged_outcome {
            result = result.with_warning(outcome.batch_message(ops.kind(), &unchanged));
        }
        Ok(result)
    }

    async fn create<R: ResourceOps>(&self, ops: &R, descriptor: &R::Descriptor) -> Result<()> {
        let result = async {
            let submitted = ops.create(descriptor).await?;
            self.waiter.complete(submitted).await
        }
        .await;

        if let Err(err) = result {
            if ops.rollback_policy() == RollbackPolicy::DeleteOnFailure {
                self.rollback(ops, descriptor).await;
            }
            return Err(err);
        }
        Ok(())
    }

    /// 尽力删除创建失败后残留的资源，自身的失败只记录日志
    async fn rollback<R: ResourceOps>(&self, ops: &R, descriptor: &R::Descriptor) {
        let key = ops.key(descriptor);
        warn!("创建 {} {} 失败，尝试回滚", ops.kind(), key);

        let handle = match ops.lookup(descriptor).await {
            Ok(Lookup::Found(handle)) => handle,
            Ok(Lookup::NotFound) => {
                debug!("{} {} 未残留，无需回滚", ops.kind(), key);
                return;
            }
            Err(e) => {
                warn!("回滚时查找 {} {} 失败: {}", ops.kind(), key, e);
                return;
            }
        };

        let result = async {
            let submitted = ops.delete(&handle, descriptor).await?;
            self.waiter.complete(submitted).await
        }
        .await;

        match result {
            Ok(()) => info!("已回滚 {} {}", ops.kind(), key),
            Err(e) => warn!("回滚 {} {} 失败: {}", ops.kind(), key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_messages() {
        assert_eq!(Outcome::Created.message("Org", "acme"), "Org acme has been created");
        assert_eq!(Outcome::AlreadyPresent.message("Org", "acme"), "Org acme is already present");
        assert_eq!(Outcome::NotPresent.message("Org", "acme"), "Org acme is not present");
    }

    #[test]
    fn test_batch_messages() {
        let keys = vec!["fw1".to_string(), "fw2".to_string()];
        assert_eq!(
            Outcome::Deleted.batch_message("Firewall rule(s)", &keys),
            "Firewall rule(s) fw1, fw2 have been deleted"
        );
        assert_eq!(
            Outcome::AlreadyPresent.batch_message("Firewall rule(s)", &keys[..1]),
            "Firewall rule(s) fw1 are already present"
        );
    }

    #[test]
    fn test_submitted_from_option() {
        assert!(matches!(Submitted::from(None), Submitted::Done));
        assert!(matches!(
            Submitted::from(Some(Task::queued("https://vcd.local/api/task/1"))),
            Submitted::Task(_)
        ));
    }
}
