// ==========================================
// 热处理仿真核心 - 引擎层
// ==========================================
// 职责: 相变动力学与硬度计算, 纯函数式, 不访问数据库
// 红线: Engine 不拼 SQL, 不持有调度状态
// ==========================================

pub mod calibration;
pub mod cct;
pub mod critical_temperatures;
pub mod error;
pub mod hardness;
pub mod jmak;
pub mod martensite;
pub mod phase_predictor;
pub mod scheil;
pub mod ttt;

// 重导出核心引擎
pub use calibration::{fit_jmak_parameters, select_model_family, JmakFit};
pub use cct::{
    default_cooling_rates, generate_cct_from_ttt, generate_cct_phase_fractions, CctCurve,
    CctDiagram, CctOptions, CoolingRateFractions,
};
pub use error::{EngineError, EngineResult};
pub use hardness::{
    hollomon_jaffe_parameter, hv_to_hrc, predict_hardness_profile, predict_profile_with,
    HardnessPredictor, TemperedHardness,
};
pub use jmak::JmakModel;
pub use martensite::KoistinenMarburgerModel;
pub use phase_predictor::{
    empirical_fractions, t8_5, PhasePrediction, PhasePredictor, PredictionTier,
};
pub use scheil::{scheil_onset, ScheilIntegrator};
pub use ttt::{generate_ttt_diagram, Contour, TttDiagram, TttIter, TttPoint};
