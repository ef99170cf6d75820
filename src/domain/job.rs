// ==========================================
// 热处理仿真核心 - 作业领域模型
// ==========================================
// 职责: 仿真作业 / 焊接项目作业的统一视图
// 红线: 作业由外部请求创建, 仅由调度器变更状态, 核心从不删除作业
// ==========================================

use crate::domain::types::{JobKind, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 热处理仿真作业 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimulationId(pub i64);

/// 焊接项目作业 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeldProjectId(pub i64);

// ==========================================
// JobRef - 按类型区分的作业引用
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum JobRef {
    Simulation(SimulationId),
    WeldProject(WeldProjectId),
}

impl JobRef {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRef::Simulation(_) => JobKind::Simulation,
            JobRef::WeldProject(_) => JobKind::WeldProject,
        }
    }

    /// 所在作业表中的行 ID
    pub fn row_id(&self) -> i64 {
        match self {
            JobRef::Simulation(SimulationId(id)) => *id,
            JobRef::WeldProject(WeldProjectId(id)) => *id,
        }
    }

    pub fn from_parts(kind: JobKind, row_id: i64) -> Self {
        match kind {
            JobKind::Simulation => JobRef::Simulation(SimulationId(row_id)),
            JobKind::WeldProject => JobRef::WeldProject(WeldProjectId(row_id)),
        }
    }
}

impl From<SimulationId> for JobRef {
    fn from(id: SimulationId) -> Self {
        JobRef::Simulation(id)
    }
}

impl From<WeldProjectId> for JobRef {
    fn from(id: WeldProjectId) -> Self {
        JobRef::WeldProject(id)
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.row_id())
    }
}

// ==========================================
// Job - 作业记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_ref: JobRef,
    pub name: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        self.job_ref.kind()
    }

    /// FIFO 排序键: (创建时间, 类型 rank, 行 ID)
    pub fn fifo_key(&self) -> (DateTime<Utc>, JobKind, i64) {
        (self.created_at, self.kind(), self.job_ref.row_id())
    }
}

/// 排队作业 (带 1 起始的队列位置)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job: Job,
    pub position: usize,
}

/// 队列状态快照 (每次调用实时计算)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub running: Option<Job>,
    pub queued: Vec<QueuedJob>,
}

impl QueueStatus {
    pub fn queue_length(&self) -> usize {
        self.queued.len()
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_none() && self.queued.is_empty()
    }

    /// 排队位置 (1 起始); 未排队返回 None
    pub fn position_of(&self, job_ref: JobRef) -> Option<usize> {
        self.queued
            .iter()
            .find(|q| q.job.job_ref == job_ref)
            .map(|q| q.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(job_ref: JobRef, secs: i64) -> Job {
        Job {
            job_ref,
            name: "t".to_string(),
            status: JobStatus::Queued,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    #[test]
    fn test_fifo_key_orders_by_time_then_kind_then_id() {
        let a = job(JobRef::WeldProject(WeldProjectId(1)), 100);
        let b = job(JobRef::Simulation(SimulationId(9)), 100);
        let c = job(JobRef::Simulation(SimulationId(1)), 50);

        let mut jobs = vec![a.clone(), b.clone(), c.clone()];
        jobs.sort_by_key(|j| j.fifo_key());
        assert_eq!(jobs, vec![c, b, a]);
    }

    #[test]
    fn test_job_ref_display_and_parts() {
        let r = JobRef::from_parts(JobKind::WeldProject, 7);
        assert_eq!(r, JobRef::WeldProject(WeldProjectId(7)));
        assert_eq!(r.to_string(), "weld#7");
        assert_eq!(r.row_id(), 7);
    }
}
