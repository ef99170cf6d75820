// ==========================================
// 热处理仿真核心 - 引擎层错误类型
// ==========================================
// 约定: 数值退化 (b(T)=0、分数越界) 用 Option 表达, 不属于错误
// ==========================================

use crate::domain::cooling::CoolingPathError;
use crate::domain::types::Phase;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("冷却路径无效: {0}")]
    CoolingPath(#[from] CoolingPathError),

    #[error("Avrami 指数必须为正有限数: n={0}")]
    InvalidAvramiExponent(f64),

    #[error("温度区间无效: [{min}, {max}]")]
    InvalidTemperatureRange { min: f64, max: f64 },

    #[error("拟合数据不足: {0}")]
    InsufficientData(String),

    #[error("输入数据无效: {0}")]
    InvalidInput(String),

    #[error("缺少相动力学参数: {0}")]
    MissingPhase(Phase),
}

pub type EngineResult<T> = Result<T, EngineError>;
