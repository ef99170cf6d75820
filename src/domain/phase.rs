// ==========================================
// 热处理仿真核心 - 相分数结果
// ==========================================
// 红线: 含残余奥氏体在内的各相分数之和 = 1 (数值容差内)
// ==========================================

use crate::domain::types::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 相分数和校验容差
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-9;

// ==========================================
// PhaseFractions - 某时刻/某位置的相分数向量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseFractions {
    pub ferrite: f64,
    pub pearlite: f64,
    pub bainite: f64,
    pub martensite: f64,
    pub retained_austenite: f64,
}

impl Default for PhaseFractions {
    /// 初始状态: 全奥氏体
    fn default() -> Self {
        Self {
            ferrite: 0.0,
            pearlite: 0.0,
            bainite: 0.0,
            martensite: 0.0,
            retained_austenite: 1.0,
        }
    }
}

impl PhaseFractions {
    /// 各相均为 0 (用于逐项构造)
    pub const fn zero() -> Self {
        Self {
            ferrite: 0.0,
            pearlite: 0.0,
            bainite: 0.0,
            martensite: 0.0,
            retained_austenite: 0.0,
        }
    }

    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Ferrite => self.ferrite,
            Phase::Pearlite => self.pearlite,
            Phase::Bainite => self.bainite,
            Phase::Martensite => self.martensite,
            Phase::RetainedAustenite => self.retained_austenite,
        }
    }

    pub fn set(&mut self, phase: Phase, value: f64) {
        match phase {
            Phase::Ferrite => self.ferrite = value,
            Phase::Pearlite => self.pearlite = value,
            Phase::Bainite => self.bainite = value,
            Phase::Martensite => self.martensite = value,
            Phase::RetainedAustenite => self.retained_austenite = value,
        }
    }

    /// 扩散型相分数之和
    pub fn diffusional_total(&self) -> f64 {
        self.ferrite + self.pearlite + self.bainite
    }

    /// 已转变 (非奥氏体) 分数之和
    pub fn transformed_total(&self) -> f64 {
        self.diffusional_total() + self.martensite
    }

    pub fn total(&self) -> f64 {
        self.transformed_total() + self.retained_austenite
    }

    /// 归一化使各相之和为 1
    pub fn normalize(mut self) -> Self {
        let total = self.total();
        if total > 0.0 {
            for phase in Phase::ALL {
                self.set(phase, self.get(phase) / total);
            }
        } else {
            self = PhaseFractions::default();
        }
        self
    }

    /// 转换为 相名 → 分数 映射
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Phase::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), self.get(*p)))
            .collect()
    }
}

/// 相变点 (时间, 温度)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformationPoint {
    pub time: f64,
    pub temperature: f64,
}

// ==========================================
// TransformationHistory - 连续冷却相变历程
// ==========================================
// 每个冷却路径采样点对应一个相分数向量
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationHistory {
    pub times: Vec<f64>,
    pub temperatures: Vec<f64>,
    pub fractions: Vec<PhaseFractions>,
    /// Scheil 积分达到 1 的孕育结束点 (扩散型相)
    pub onset: BTreeMap<Phase, TransformationPoint>,
    /// 达到终态分数 1% 的点
    pub transformation_start: BTreeMap<Phase, TransformationPoint>,
    /// 达到终态分数 99% 的点
    pub transformation_finish: BTreeMap<Phase, TransformationPoint>,
}

impl TransformationHistory {
    /// 冷却结束时的相分数
    pub fn final_fractions(&self) -> PhaseFractions {
        self.fractions.last().copied().unwrap_or_default()
    }

    /// 单相分数时间序列
    pub fn series(&self, phase: Phase) -> Vec<f64> {
        self.fractions.iter().map(|f| f.get(phase)).collect()
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_austenite() {
        let f = PhaseFractions::default();
        assert_eq!(f.retained_austenite, 1.0);
        assert_eq!(f.transformed_total(), 0.0);
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let f = PhaseFractions {
            ferrite: 0.5,
            pearlite: 0.5,
            bainite: 0.5,
            martensite: 0.0,
            retained_austenite: 0.5,
        }
        .normalize();
        assert!((f.total() - 1.0).abs() < FRACTION_SUM_TOLERANCE);
        assert!((f.ferrite - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_to_map_uses_snake_case_names() {
        let map = PhaseFractions::default().to_map();
        assert_eq!(map.get("retained_austenite"), Some(&1.0));
        assert_eq!(map.len(), 5);
    }
}
