// ==========================================
// 热处理仿真核心 - 仿真工况
// ==========================================
// 存储于 simulation.case_json, 由外部请求处理方写入
// ==========================================

use crate::domain::composition::SteelGrade;
use crate::domain::cooling::CoolingPath;
use crate::domain::hardness::TemperingSpec;
use crate::domain::kinetics::KineticsParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationCase {
    pub grade: SteelGrade,
    /// 无 JMAK 参数时走经验预测
    #[serde(default)]
    pub kinetics: Option<KineticsParameters>,
    /// 位置键 (center / surface ...) → 冷却路径
    pub cooling_paths: BTreeMap<String, CoolingPath>,
    #[serde(default)]
    pub tempering: Option<TemperingSpec>,
}

impl SimulationCase {
    pub fn new(grade: SteelGrade, cooling_paths: BTreeMap<String, CoolingPath>) -> Self {
        Self {
            grade,
            kinetics: None,
            cooling_paths,
            tempering: None,
        }
    }

    pub fn with_kinetics(mut self, kinetics: KineticsParameters) -> Self {
        self.kinetics = Some(kinetics);
        self
    }

    pub fn with_tempering(mut self, tempering: TemperingSpec) -> Self {
        self.tempering = Some(tempering);
        self
    }
}
