// ==========================================
// 热处理仿真核心 - 领域类型定义
// ==========================================
// 职责: 相名称、b(T) 函数族、作业状态/类型等枚举
// 序列化格式: snake_case (与 JSON 结果、数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 相 (Phase)
// ==========================================
// 扩散型相的评估顺序固定: 铁素体 → 珠光体 → 贝氏体
// 剩余奥氏体预算按此顺序先到先得
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ferrite,           // 铁素体
    Pearlite,          // 珠光体
    Bainite,           // 贝氏体
    Martensite,        // 马氏体
    RetainedAustenite, // 残余奥氏体
}

impl Phase {
    /// 扩散型相 (按评估顺序)
    pub const DIFFUSIONAL: [Phase; 3] = [Phase::Ferrite, Phase::Pearlite, Phase::Bainite];

    /// 全部相 (输出顺序)
    pub const ALL: [Phase; 5] = [
        Phase::Ferrite,
        Phase::Pearlite,
        Phase::Bainite,
        Phase::Martensite,
        Phase::RetainedAustenite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ferrite => "ferrite",
            Phase::Pearlite => "pearlite",
            Phase::Bainite => "bainite",
            Phase::Martensite => "martensite",
            Phase::RetainedAustenite => "retained_austenite",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ferrite" => Some(Phase::Ferrite),
            "pearlite" => Some(Phase::Pearlite),
            "bainite" => Some(Phase::Bainite),
            "martensite" => Some(Phase::Martensite),
            "retained_austenite" => Some(Phase::RetainedAustenite),
            _ => None,
        }
    }

    /// 是否为扩散型相 (由 JMAK 动力学描述)
    pub fn is_diffusional(&self) -> bool {
        matches!(self, Phase::Ferrite | Phase::Pearlite | Phase::Bainite)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// b(T) 函数族 (B-Function Family)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BFunctionFamily {
    Gaussian,   // 高斯 C 曲线
    Arrhenius,  // 热激活
    Polynomial, // 多项式
}

impl fmt::Display for BFunctionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BFunctionFamily::Gaussian => write!(f, "gaussian"),
            BFunctionFamily::Arrhenius => write!(f, "arrhenius"),
            BFunctionFamily::Polynomial => write!(f, "polynomial"),
        }
    }
}

// ==========================================
// 作业状态 (Job Status)
// ==========================================
// 状态机: queued → running → {completed, failed}
// 红线: 状态单调推进，不允许 running → queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,    // 排队中
    Running,   // 执行中
    Completed, // 已完成
    Failed,    // 失败
}

impl JobStatus {
    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 状态转换是否合法
    ///
    /// queued 可直接进入 failed (兜底失败)，终态不可再变
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 作业类型 (Job Kind)
// ==========================================
// 时间戳完全相同时按 rank 排序: 热处理仿真优先于焊接项目
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Simulation,  // 热处理仿真
    WeldProject, // 焊接仿真项目
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Simulation, JobKind::WeldProject];

    /// 对应的作业表名
    pub fn table_name(&self) -> &'static str {
        match self {
            JobKind::Simulation => "simulation",
            JobKind::WeldProject => "weld_project",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Simulation => write!(f, "simulation"),
            JobKind::WeldProject => write!(f, "weld"),
        }
    }
}

// ==========================================
// 韧性等级 (Toughness Rating)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToughnessRating {
    Good,       // 贝氏体/铁素体为主
    Acceptable, // 混合组织
    Poor,       // 未回火马氏体 > 80%
}

impl fmt::Display for ToughnessRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToughnessRating::Good => write!(f, "good"),
            ToughnessRating::Acceptable => write!(f, "acceptable"),
            ToughnessRating::Poor => write!(f, "poor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_transitions_are_monotonic() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn test_job_status_db_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.to_db_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("paused"), None);
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::RetainedAustenite).unwrap();
        assert_eq!(json, "\"retained_austenite\"");
        assert_eq!(Phase::from_str("Bainite"), Some(Phase::Bainite));
    }
}
