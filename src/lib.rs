// ==========================================
// 热处理仿真核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 相变动力学 / 硬度预测引擎 + 单工作者作业队列
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 相变与硬度计算
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 服务层 - 作业调度与执行
pub mod services;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BFunctionFamily, JobKind, JobStatus, Phase, ToughnessRating};

// 领域实体
pub use domain::{
    Composition, CoolingPath, CriticalTemperatures, HardnessResult, Job, JobRef,
    KineticsParameters, PhaseFractions, SimulationCase, SteelGrade, TemperingSpec,
};

// 引擎
pub use engine::{
    EngineError, HardnessPredictor, JmakModel, KoistinenMarburgerModel, PhasePredictor,
    ScheilIntegrator, TttDiagram,
};

// 服务
pub use services::{HeatTreatmentRunner, JobScheduler, RunnerRegistry};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "热处理仿真核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
