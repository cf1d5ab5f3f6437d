//! 异步任务等待
//!
//! vCD 的变更请求大多返回一个任务。这里按固定间隔轮询任务状态，
//! 直到进入终止状态 (`success` / `error` / `aborted` / `canceled`) 或超过时限。

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use vcd_platform::{Task, TaskStatus, VcdClient};

use crate::reconciler::Submitted;
use crate::{ExecutorError, Result};

/// 任务状态来源
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// 读取任务的最新状态
    async fn task_status(&self, task: &Task) -> vcd_platform::Result<Task>;
}

#[async_trait]
impl TaskSource for VcdClient {
    async fn task_status(&self, task: &Task) -> vcd_platform::Result<Task> {
        self.task().get(&task.href).await
    }
}

/// 等待参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// 总时限
    pub timeout: Duration,

    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// 成功结束的任务
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// 任务的最终表示
    pub task: Task,

    /// 轮询次数
    pub polls: u32,
}

impl TaskOutcome {
    /// 成功标记
    pub const SUCCESS: i32 = 1;

    pub fn code(&self) -> i32 {
        Self::SUCCESS
    }
}

/// 任务等待器
pub struct TaskWaiter<'a> {
    source: &'a dyn TaskSource,
    config: WaitConfig,
}

impl<'a> TaskWaiter<'a> {
    pub fn new(source: &'a dyn TaskSource, config: WaitConfig) -> Self {
        Self { source, config }
    }

    /// 等待任务结束
    ///
    /// 已处于终止状态的任务不再轮询。
    pub async fn wait(&self, task: Task) -> Result<TaskOutcome> {
        if task.status.is_terminal() {
            return finish(task, 0);
        }

        info!("等待任务: {}", task.href);
        let started = Instant::now();
        let mut polls = 0;
        let mut current = task;

        loop {
            current = self.source.task_status(&current).await?;
            polls += 1;
            debug!(
                "任务 {} 状态: {} (第 {} 次轮询)",
                current.href, current.status, polls
            );

            if current.status.is_terminal() {
                return finish(current, polls);
            }

            if started.elapsed() >= self.config.timeout {
                warn!("任务等待超时: {}", current.href);
                return Err(ExecutorError::TaskTimeout {
                    href: current.href,
                    timeout: self.config.timeout,
                });
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// 等待变更请求完成，同步完成的请求直接返回
    pub async fn complete(&self, submitted: Submitted) -> Result<()> {
        match submitted {
            Submitted::Task(task) => self.wait(task).await.map(|_| ()),
            Submitted::Done => Ok(()),
        }
    }
}

fn finish(task: Task, polls: u32) -> Result<TaskOutcome> {
    if task.status == TaskStatus::Success {
        info!("任务完成: {}", task.href);
        return Ok(TaskOutcome { task, polls });
    }

    warn!(
        "任务失败: {} ({}) {}",
        task.href,
        task.status,
        task.error_message().unwrap_or_default()
    );
    Err(ExecutorError::TaskFailed {
        status: task.status,
        detail: serde_json::to_string_pretty(&task).unwrap_or_else(|_| task.href.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::Sequence;

    mock! {
        pub Source {}

        #[async_trait]
        impl TaskSource for Source {
            async fn task_status(&self, task: &Task) -> vcd_platform::Result<Task>;
        }
    }

    fn task_with(status: TaskStatus) -> Task {
        let mut task = Task::queued("https://vcd.local/api/task/1");
        task.status = status;
        task
    }

    fn source_returning(statuses: Vec<TaskStatus>) -> MockSource {
        let mut source = MockSource::new();
        let mut seq = Sequence::new();
        for status in statuses {
            source
                .expect_task_status()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Ok(task_with(status)));
        }
        source
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_three_polls() {
        let source = source_returning(vec![
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Success,
        ]);
        let waiter = TaskWaiter::new(&source, WaitConfig::default());

        let outcome = waiter.wait(Task::queued("https://vcd.local/api/task/1")).await.unwrap();
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.code(), TaskOutcome::SUCCESS);
        assert_eq!(outcome.task.status, TaskStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_fails_with_task_detail() {
        let source = source_returning(vec![TaskStatus::Running, TaskStatus::Error]);
        let waiter = TaskWaiter::new(&source, WaitConfig::default());

        let err = waiter.wait(Task::queued("https://vcd.local/api/task/1")).await.unwrap_err();
        match err {
            ExecutorError::TaskFailed { status, detail } => {
                assert_eq!(status, TaskStatus::Error);
                assert!(detail.contains("https://vcd.local/api/task/1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_and_canceled_are_failures() {
        for status in [TaskStatus::Aborted, TaskStatus::Canceled] {
            let source = source_returning(vec![status]);
            let waiter = TaskWaiter::new(&source, WaitConfig::default());
            let err = waiter.wait(Task::queued("https://vcd.local/api/task/1")).await.unwrap_err();
            assert!(matches!(err, ExecutorError::TaskFailed { status: s, .. } if s == status));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_terminal() {
        let mut source = MockSource::new();
        source
            .expect_task_status()
            .returning(|_| Ok(task_with(TaskStatus::Running)));
        let config = WaitConfig {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
        };
        let waiter = TaskWaiter::new(&source, config);

        let started = Instant::now();
        let err = waiter.wait(Task::queued("https://vcd.local/api/task/1")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::TaskTimeout { timeout, .. } if timeout == config.timeout));
        assert!(started.elapsed() >= config.timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_task_is_not_polled() {
        let mut source = MockSource::new();
        source.expect_task_status().never();
        let waiter = TaskWaiter::new(&source, WaitConfig::default());

        let outcome = waiter.wait(task_with(TaskStatus::Success)).await.unwrap();
        assert_eq!(outcome.polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_propagates() {
        let mut source = MockSource::new();
        source
            .expect_task_status()
            .times(1)
            .returning(|_| Err(vcd_platform::VcdError::AuthError("会话过期".into())));
        let waiter = TaskWaiter::new(&source, WaitConfig::default());

        let err = waiter.wait(Task::queued("https://vcd.local/api/task/1")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Platform(vcd_platform::VcdError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_complete_without_task() {
        let mut source = MockSource::new();
        source.expect_task_status().never();
        let waiter = TaskWaiter::new(&source, WaitConfig::default());
        waiter.complete(Submitted::Done).await.unwrap();
    }
}
