// ==========================================
// 热处理仿真核心 - 作业执行器契约
// ==========================================
// 职责: 按作业类型分派到对应执行器 (穷尽匹配, 不按字符串分派)
// 红线: 执行器自行负责成功/失败状态写回; 返回 Err 由调度器兜底置 failed
// ==========================================

use crate::domain::job::{JobRef, SimulationId, WeldProjectId};
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 作业执行错误
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Runner(String),

    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("计算错误: {0}")]
    Engine(#[from] EngineError),

    #[error("执行任务异常退出: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        JobError::Join(err.to_string())
    }
}

pub type JobResult<T> = Result<T, JobError>;

/// 单一类型作业的执行器
#[async_trait]
pub trait JobRunner<Id>: Send + Sync
where
    Id: Send + 'static,
{
    async fn run(&self, id: Id) -> JobResult<()>;
}

/// 未接入的执行器: 一律返回错误, 作业由调度器置为 failed
pub struct UnconfiguredRunner {
    label: &'static str,
}

impl UnconfiguredRunner {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

#[async_trait]
impl<Id> JobRunner<Id> for UnconfiguredRunner
where
    Id: Into<JobRef> + Send + 'static,
{
    async fn run(&self, id: Id) -> JobResult<()> {
        let job_ref: JobRef = id.into();
        Err(JobError::Runner(format!("未配置{}执行器: {}", self.label, job_ref)))
    }
}

// ==========================================
// RunnerRegistry - 作业类型 → 执行器
// ==========================================
#[derive(Clone)]
pub struct RunnerRegistry {
    simulation: Arc<dyn JobRunner<SimulationId>>,
    weld_project: Arc<dyn JobRunner<WeldProjectId>>,
}

impl RunnerRegistry {
    pub fn new(
        simulation: Arc<dyn JobRunner<SimulationId>>,
        weld_project: Arc<dyn JobRunner<WeldProjectId>>,
    ) -> Self {
        Self {
            simulation,
            weld_project,
        }
    }

    pub async fn dispatch(&self, job: JobRef) -> JobResult<()> {
        match job {
            JobRef::Simulation(id) => self.simulation.run(id).await,
            JobRef::WeldProject(id) => self.weld_project.run(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobRunner<SimulationId> for CountingRunner {
        async fn run(&self, _id: SimulationId) -> JobResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let sim = Arc::new(CountingRunner::default());
        let registry = RunnerRegistry::new(sim.clone(), Arc::new(UnconfiguredRunner::new("焊接仿真")));

        registry
            .dispatch(JobRef::Simulation(SimulationId(1)))
            .await
            .unwrap();
        assert_eq!(sim.calls.load(Ordering::SeqCst), 1);

        let err = registry
            .dispatch(JobRef::WeldProject(WeldProjectId(2)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "未配置焊接仿真执行器: weld#2");
        assert_eq!(sim.calls.load(Ordering::SeqCst), 1);
    }
}
