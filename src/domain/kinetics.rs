// ==========================================
// 热处理仿真核心 - 相变动力学参数
// ==========================================
// 职责: 临界温度、JMAK 参数、马氏体参数的数据定义
// 红线: 只含数据，不含计算逻辑 (计算见 engine 层)
// ==========================================

use crate::domain::types::{BFunctionFamily, Phase};
use serde::{Deserialize, Serialize};

// ==========================================
// CriticalTemperatures - 临界温度 (°C)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalTemperatures {
    #[serde(rename = "Ae1")]
    pub ae1: f64,
    #[serde(rename = "Ae3")]
    pub ae3: f64,
    #[serde(rename = "Bs")]
    pub bs: f64,
    #[serde(rename = "Ms")]
    pub ms: f64,
    #[serde(rename = "Mf")]
    pub mf: f64,
}

/// 临界温度人工覆写
///
/// 存在覆写的字段直接采用覆写值，公式结果不再参与
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalTemperatureOverrides {
    #[serde(rename = "Ae1", default, skip_serializing_if = "Option::is_none")]
    pub ae1: Option<f64>,
    #[serde(rename = "Ae3", default, skip_serializing_if = "Option::is_none")]
    pub ae3: Option<f64>,
    #[serde(rename = "Bs", default, skip_serializing_if = "Option::is_none")]
    pub bs: Option<f64>,
    #[serde(rename = "Ms", default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<f64>,
    #[serde(rename = "Mf", default, skip_serializing_if = "Option::is_none")]
    pub mf: Option<f64>,
}

impl CriticalTemperatureOverrides {
    pub fn is_empty(&self) -> bool {
        self.ae1.is_none()
            && self.ae3.is_none()
            && self.bs.is_none()
            && self.ms.is_none()
            && self.mf.is_none()
    }
}

// ==========================================
// BFunction - 速率参数 b(T)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum BFunction {
    /// b = b_max·exp(-½((T - T_nose)/σ)²)
    Gaussian { b_max: f64, t_nose: f64, sigma: f64 },
    /// b = b0·exp(-Q/(R·T_K))
    Arrhenius { b0: f64, activation_energy: f64 },
    /// b = Σ aᵢ·Tⁱ
    Polynomial { coefficients: Vec<f64> },
}

impl BFunction {
    pub fn family(&self) -> BFunctionFamily {
        match self {
            BFunction::Gaussian { .. } => BFunctionFamily::Gaussian,
            BFunction::Arrhenius { .. } => BFunctionFamily::Arrhenius,
            BFunction::Polynomial { .. } => BFunctionFamily::Polynomial,
        }
    }
}

// ==========================================
// TemperatureRange - 有效温度区间 [T_min, T_max]
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

impl TemperatureRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// 闭区间包含判断
    pub fn contains(&self, temperature: f64) -> bool {
        temperature >= self.min && temperature <= self.max
    }

    /// 区间求交，空交集返回 None
    pub fn intersect(&self, other: &TemperatureRange) -> Option<TemperatureRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if max >= min {
            Some(TemperatureRange { min, max })
        } else {
            None
        }
    }
}

// ==========================================
// JmakParameters - 单相 JMAK 参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JmakParameters {
    pub phase: Phase,
    /// Avrami 指数 (> 0)
    pub n: f64,
    pub b_function: BFunction,
    /// 有效温度区间 (None 表示不限)
    #[serde(default)]
    pub temp_range: Option<TemperatureRange>,
}

// ==========================================
// MartensiteParameters - Koistinen-Marburger 参数
// ==========================================
/// 低合金钢典型 K-M 系数 (1/°C)
pub const DEFAULT_KM_ALPHA: f64 = 0.011;

fn default_alpha() -> f64 {
    DEFAULT_KM_ALPHA
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MartensiteParameters {
    pub ms: f64,
    pub mf: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

// ==========================================
// KineticsParameters - 钢种的 TTT 参数集
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KineticsParameters {
    #[serde(default)]
    pub jmak: Vec<JmakParameters>,
    #[serde(default)]
    pub martensite: Option<MartensiteParameters>,
    /// 奥氏体化温度 (°C)
    #[serde(default)]
    pub austenitizing_temperature: Option<f64>,
}

impl KineticsParameters {
    pub fn for_phase(&self, phase: Phase) -> Option<&JmakParameters> {
        self.jmak.iter().find(|p| p.phase == phase)
    }

    pub fn has_jmak(&self) -> bool {
        !self.jmak.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b_function_tagged_json() {
        let json = r#"{"model_type":"gaussian","b_max":0.001,"t_nose":650.0,"sigma":60.0}"#;
        let b: BFunction = serde_json::from_str(json).unwrap();
        assert_eq!(b.family(), BFunctionFamily::Gaussian);

        let json = r#"{"model_type":"arrhenius","b0":1e9,"activation_energy":200000.0}"#;
        let b: BFunction = serde_json::from_str(json).unwrap();
        assert_eq!(b.family(), BFunctionFamily::Arrhenius);
    }

    #[test]
    fn test_temperature_range_intersection() {
        let a = TemperatureRange::new(400.0, 727.0);
        let b = TemperatureRange::new(550.0, 800.0);
        assert_eq!(a.intersect(&b), Some(TemperatureRange::new(550.0, 727.0)));
        assert!(a.intersect(&TemperatureRange::new(800.0, 900.0)).is_none());
    }

    #[test]
    fn test_overrides_omit_absent_fields() {
        let o = CriticalTemperatureOverrides {
            ms: Some(310.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&o).unwrap(), r#"{"Ms":310.0}"#);
        assert!(!o.is_empty());
    }
}
