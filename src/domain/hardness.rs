// ==========================================
// 热处理仿真核心 - 硬度预测结果
// ==========================================
// 红线: 结果生成后不可变
// 红线: 未回火时 tempered_hardness_hv / tempered_hardness_hrc 序列化为空映射,
//       hollomon_jaffe_parameter = 0, 不允许 null 或缺失键
// ==========================================

use crate::domain::phase::PhaseFractions;
use crate::domain::types::ToughnessRating;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 典型截面位置键
pub mod positions {
    pub const CENTER: &str = "center";
    pub const ONE_THIRD: &str = "one_third";
    pub const TWO_THIRDS: &str = "two_thirds";
    pub const SURFACE: &str = "surface";
}

// ==========================================
// TemperingSpec - 回火工艺
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperingSpec {
    /// 回火温度 (°C)
    pub temperature_c: f64,
    /// 保温时间 (min)
    pub hold_min: f64,
}

impl TemperingSpec {
    pub fn new(temperature_c: f64, hold_min: f64) -> Self {
        Self {
            temperature_c,
            hold_min,
        }
    }

    /// 保温时间 ≤ 0 视为未回火
    pub fn is_effective(&self) -> bool {
        self.hold_min > 0.0 && self.temperature_c.is_finite()
    }
}

// ==========================================
// HardnessResult - 每个截面位置的硬度/性能预测
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardnessResult {
    // ===== 淬火态 =====
    pub hardness_hv: BTreeMap<String, f64>,
    /// < 200 HV 时 HRC 无定义 (null)
    pub hardness_hrc: BTreeMap<String, Option<f64>>,
    pub t8_5_values: BTreeMap<String, f64>,
    pub phase_fractions: BTreeMap<String, PhaseFractions>,

    // ===== 成分派生指标 =====
    /// CE(IIW)
    #[serde(default)]
    pub carbon_equivalent: f64,
    /// Grossmann DI (英寸)
    #[serde(default)]
    pub ideal_diameter: f64,
    /// 预测所用成分 (元素符号 → wt%)
    #[serde(default)]
    pub composition: BTreeMap<String, f64>,

    // ===== 力学性能估算 =====
    pub uts_mpa: BTreeMap<String, f64>,
    pub ys_mpa: BTreeMap<String, f64>,
    pub elongation_pct: BTreeMap<String, f64>,
    pub toughness_rating: BTreeMap<String, ToughnessRating>,

    // ===== 回火态 =====
    #[serde(default)]
    pub tempered_hardness_hv: BTreeMap<String, f64>,
    #[serde(default)]
    pub tempered_hardness_hrc: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub hollomon_jaffe_parameter: f64,
    #[serde(default)]
    pub tempering_temperature: Option<f64>,
    /// 回火保温时间 (min)
    #[serde(default)]
    pub tempering_time: Option<f64>,
}

impl HardnessResult {
    pub fn is_tempered(&self) -> bool {
        !self.tempered_hardness_hv.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.hardness_hv.keys().map(String::as_str)
    }

    /// 某位置的最终硬度 (有回火取回火值)
    pub fn final_hardness_hv(&self, position: &str) -> Option<f64> {
        self.tempered_hardness_hv
            .get(position)
            .or_else(|| self.hardness_hv.get(position))
            .copied()
    }

    /// 转换为 JSON 值 (下游报表/导出消费)
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untempered_serializes_empty_maps_and_zero_hjp() {
        let mut result = HardnessResult::default();
        result.hardness_hv.insert("center".to_string(), 480.0);

        let value = result.to_value().unwrap();
        assert_eq!(value["tempered_hardness_hv"], serde_json::json!({}));
        assert_eq!(value["tempered_hardness_hrc"], serde_json::json!({}));
        assert_eq!(value["hollomon_jaffe_parameter"], serde_json::json!(0.0));
        assert!(!result.is_tempered());
    }

    #[test]
    fn test_final_hardness_prefers_tempered() {
        let mut result = HardnessResult::default();
        result.hardness_hv.insert("surface".to_string(), 600.0);
        assert_eq!(result.final_hardness_hv("surface"), Some(600.0));
        result.tempered_hardness_hv.insert("surface".to_string(), 420.0);
        assert_eq!(result.final_hardness_hv("surface"), Some(420.0));
        assert_eq!(result.final_hardness_hv("center"), None);
    }

    #[test]
    fn test_tempering_spec_effective() {
        assert!(TemperingSpec::new(600.0, 60.0).is_effective());
        assert!(!TemperingSpec::new(600.0, 0.0).is_effective());
    }
}
