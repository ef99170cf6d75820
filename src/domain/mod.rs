// ==========================================
// 热处理仿真核心 - 领域模型层
// ==========================================
// 职责: 定义成分、动力学参数、冷却路径、相分数、硬度结果、作业、仿真工况
// 红线: 不含数据访问逻辑, 不含物理计算
// ==========================================

pub mod composition;
pub mod cooling;
pub mod hardness;
pub mod job;
pub mod kinetics;
pub mod phase;
pub mod simulation;
pub mod types;

// 重导出核心类型
pub use composition::{Composition, SteelGrade, DEFAULT_HOLLOMON_JAFFE_C};
pub use cooling::{CoolingPath, CoolingPathError, CoolingSample};
pub use hardness::{HardnessResult, TemperingSpec};
pub use job::{Job, JobRef, QueueStatus, QueuedJob, SimulationId, WeldProjectId};
pub use kinetics::{
    BFunction, CriticalTemperatureOverrides, CriticalTemperatures, JmakParameters,
    KineticsParameters, MartensiteParameters, TemperatureRange, DEFAULT_KM_ALPHA,
};
pub use phase::{PhaseFractions, TransformationHistory, TransformationPoint};
pub use simulation::SimulationCase;
pub use types::{BFunctionFamily, JobKind, JobStatus, Phase, ToughnessRating};
