// ==========================================
// 热处理仿真核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供作业存储与仿真工况/结果的数据访问接口
// 约束: 所有值使用参数化查询; 表名只来自 JobKind::table_name
// ==========================================

pub mod error;
pub mod job_repo;
pub mod simulation_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use job_repo::{JobStore, SqliteJobStore};
pub use simulation_repo::SimulationRepository;
