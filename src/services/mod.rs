// ==========================================
// 热处理仿真核心 - 服务层
// ==========================================
// 职责: 作业调度 (单工作者 FIFO) 与作业执行器
// ==========================================

pub mod heat_treatment_runner;
pub mod job_queue;
pub mod runner;

pub use heat_treatment_runner::HeatTreatmentRunner;
pub use job_queue::{JobScheduler, TickOutcome, UNEXPECTED_RUNNER_ERROR};
pub use runner::{JobError, JobResult, JobRunner, RunnerRegistry, UnconfiguredRunner};
