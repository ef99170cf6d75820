// ==========================================
// 热处理仿真核心 - 相组成预测编排
// ==========================================
// 分级:
//   Tier 1 (jmak): 钢种有 JMAK 参数 → Scheil 积分
//   Tier 2 (empirical): 无参数或冷却路径无效 → 按 t8/5 冷速经验分档
// ==========================================

use crate::domain::composition::SteelGrade;
use crate::domain::cooling::CoolingPath;
use crate::domain::kinetics::{CriticalTemperatures, KineticsParameters};
use crate::domain::phase::{PhaseFractions, TransformationHistory};
use crate::domain::types::Phase;
use crate::engine::cct::{generate_cct_from_ttt, CctDiagram, CctOptions};
use crate::engine::error::EngineResult;
use crate::engine::jmak::JmakModel;
use crate::engine::scheil::ScheilIntegrator;
use crate::engine::ttt::TttDiagram;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 无法从路径估算时的缺省 t8/5 (s)
pub const DEFAULT_T8_5: f64 = 10.0;
/// t8/5 下限 (s)
pub const MIN_T8_5: f64 = 0.1;
/// 800 → 500 °C 温差 (K)
const T8_5_SPAN: f64 = 300.0;
const T_800: f64 = 800.0;
const T_500: f64 = 500.0;

/// 预测所用层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionTier {
    Jmak,
    Empirical,
}

impl fmt::Display for PredictionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionTier::Jmak => write!(f, "jmak"),
            PredictionTier::Empirical => write!(f, "empirical"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhasePrediction {
    pub fractions: PhaseFractions,
    pub tier: PredictionTier,
    pub t8_5: f64,
    /// 仅 Scheil 预测时给出
    pub history: Option<TransformationHistory>,
}

/// t8/5 冷却时间 (800 → 500 °C)
///
/// 优先用首次下穿 800 与随后下穿 500 的线性插值时刻;
/// 否则取最接近 800/500 的采样点; 仍无法估算返回缺省 10 s
pub fn t8_5(path: &CoolingPath) -> f64 {
    let samples = path.samples();

    let crossing = |level: f64, from: usize| {
        (from.max(1)..samples.len()).find_map(|i| {
            let (prev, cur) = (samples[i - 1], samples[i]);
            if prev.temperature > level && cur.temperature <= level {
                let frac = (level - cur.temperature) / (prev.temperature - cur.temperature);
                Some((i, cur.time - frac * (cur.time - prev.time)))
            } else {
                None
            }
        })
    };

    if let Some((i800, t800)) = crossing(T_800, 1) {
        if let Some((_, t500)) = crossing(T_500, i800) {
            return (t500 - t800).max(MIN_T8_5);
        }
    }

    if path.max_temperature() > T_800 && path.min_temperature() < T_500 {
        let nearest = |level: f64| {
            samples
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    (a.1.temperature - level)
                        .abs()
                        .total_cmp(&(b.1.temperature - level).abs())
                })
                .map(|(i, s)| (i, s.time))
        };
        if let (Some((i800, t800)), Some((i500, t500))) = (nearest(T_800), nearest(T_500)) {
            if i500 > i800 {
                return (t500 - t800).max(MIN_T8_5);
            }
        }
    }

    DEFAULT_T8_5
}

/// 按冷速 (K/s) 的经验相组成
pub fn empirical_fractions(cooling_rate: f64) -> PhaseFractions {
    let (ferrite, pearlite, bainite, martensite, retained_austenite) = if cooling_rate > 100.0 {
        (0.0, 0.0, 0.0, 0.95, 0.05)
    } else if cooling_rate > 30.0 {
        (0.0, 0.0, 0.15, 0.80, 0.05)
    } else if cooling_rate > 10.0 {
        (0.0, 0.0, 0.40, 0.50, 0.10)
    } else if cooling_rate > 1.0 {
        (0.10, 0.05, 0.70, 0.10, 0.05)
    } else {
        (0.50, 0.45, 0.05, 0.0, 0.0)
    };
    PhaseFractions {
        ferrite,
        pearlite,
        bainite,
        martensite,
        retained_austenite,
    }
    .normalize()
}

// ==========================================
// PhasePredictor
// ==========================================
#[derive(Debug, Clone)]
pub struct PhasePredictor {
    critical: CriticalTemperatures,
    /// 未限制窗口的原始模型 (TTT 图用)
    models: Vec<(Phase, JmakModel)>,
    integrator: Option<ScheilIntegrator>,
}

impl PhasePredictor {
    /// 构建预测器; 动力学参数无法建模时降级为经验分档
    pub fn new(grade: &SteelGrade, kinetics: Option<&KineticsParameters>) -> Self {
        let critical = grade.critical_temperatures();
        let mut models = Vec::new();
        let mut integrator = None;

        if let Some(params) = kinetics.filter(|k| k.has_jmak()) {
            for jmak in &params.jmak {
                match JmakModel::from_parameters(jmak) {
                    Ok(model) if jmak.phase.is_diffusional() => models.push((jmak.phase, model)),
                    Ok(_) => tracing::warn!("相 {} 不是扩散型相, 忽略其 JMAK 参数", jmak.phase),
                    Err(e) => tracing::warn!("相 {} 的 JMAK 参数无效: {}", jmak.phase, e),
                }
            }
            match ScheilIntegrator::new(params, &critical) {
                Ok(s) => integrator = Some(s),
                Err(e) => tracing::warn!(
                    "钢种 {} 的 Scheil 积分器构建失败, 降级为经验预测: {}",
                    grade.designation,
                    e
                ),
            }
        }

        Self {
            critical,
            models,
            integrator,
        }
    }

    pub fn with_thresholds(mut self, start_fraction: f64, finish_fraction: f64) -> Self {
        self.integrator = self
            .integrator
            .map(|s| s.with_thresholds(start_fraction, finish_fraction));
        self
    }

    pub fn tier(&self) -> PredictionTier {
        if self.integrator.is_some() {
            PredictionTier::Jmak
        } else {
            PredictionTier::Empirical
        }
    }

    pub fn critical_temperatures(&self) -> CriticalTemperatures {
        self.critical
    }

    /// 预测冷却结束时的相组成
    pub fn predict(&self, path: &CoolingPath, t8_5_override: Option<f64>) -> PhasePrediction {
        let t8_5_value = t8_5_override
            .filter(|t| *t > 0.0)
            .unwrap_or_else(|| t8_5(path));

        match &self.integrator {
            Some(integrator) => {
                let history = integrator.integrate(path);
                PhasePrediction {
                    fractions: history.final_fractions().normalize(),
                    tier: PredictionTier::Jmak,
                    t8_5: t8_5_value,
                    history: Some(history),
                }
            }
            None => Self::empirical(t8_5_value),
        }
    }

    /// 由并列数组预测; 路径无效时记录告警并走经验分档
    pub fn predict_arrays(
        &self,
        times: &[f64],
        temperatures: &[f64],
        t8_5_override: Option<f64>,
    ) -> PhasePrediction {
        match CoolingPath::from_arrays(times, temperatures) {
            Ok(path) if times.len() == temperatures.len() => self.predict(&path, t8_5_override),
            Ok(_) => {
                tracing::warn!(
                    "时间/温度数组长度不一致 ({} vs {}), 降级为经验预测",
                    times.len(),
                    temperatures.len()
                );
                Self::empirical(t8_5_override.filter(|t| *t > 0.0).unwrap_or(DEFAULT_T8_5))
            }
            Err(e) => {
                tracing::warn!("冷却路径无效, 降级为经验预测: {}", e);
                Self::empirical(t8_5_override.filter(|t| *t > 0.0).unwrap_or(DEFAULT_T8_5))
            }
        }
    }

    fn empirical(t8_5_value: f64) -> PhasePrediction {
        PhasePrediction {
            fractions: empirical_fractions(T8_5_SPAN / t8_5_value.max(MIN_T8_5)),
            tier: PredictionTier::Empirical,
            t8_5: t8_5_value,
            history: None,
        }
    }

    /// TTT 图 (仅 Tier 1 可用)
    pub fn ttt_diagram(&self, n_temperatures: usize) -> Option<EngineResult<TttDiagram>> {
        if self.models.is_empty() {
            return None;
        }
        Some(TttDiagram::from_critical_temperatures(
            self.models.clone(),
            &self.critical,
            n_temperatures,
        ))
    }

    /// CCT 曲线族 (仅 Tier 1 可用)
    pub fn cct_diagram(&self, options: &CctOptions) -> Option<EngineResult<CctDiagram>> {
        self.integrator
            .as_ref()
            .map(|integrator| generate_cct_from_ttt(integrator, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::composition::Composition;
    use crate::domain::kinetics::{BFunction, JmakParameters, TemperatureRange};
    use crate::domain::phase::FRACTION_SUM_TOLERANCE;

    fn grade() -> SteelGrade {
        SteelGrade::new(
            "4340",
            Composition {
                c: 0.40,
                mn: 0.70,
                si: 0.25,
                cr: 0.80,
                ni: 1.80,
                mo: 0.25,
                ..Composition::default()
            },
        )
    }

    fn kinetics() -> KineticsParameters {
        KineticsParameters {
            jmak: vec![JmakParameters {
                phase: Phase::Bainite,
                n: 2.5,
                b_function: BFunction::Gaussian {
                    b_max: 0.005,
                    t_nose: 420.0,
                    sigma: 50.0,
                },
                temp_range: Some(TemperatureRange::new(300.0, 520.0)),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_t8_5_interpolated_on_linear_path() {
        let path = CoolingPath::linear(900.0, 25.0, 20.0, 876).unwrap();
        assert!((t8_5(&path) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_t8_5_default_when_range_not_crossed() {
        let path = CoolingPath::linear(700.0, 25.0, 20.0, 100).unwrap();
        assert_eq!(t8_5(&path), DEFAULT_T8_5);
    }

    #[test]
    fn test_empirical_bands() {
        assert!((empirical_fractions(200.0).martensite - 0.95).abs() < 1e-9);
        assert!((empirical_fractions(50.0).bainite - 0.15).abs() < 1e-9);
        assert!((empirical_fractions(0.5).ferrite - 0.50).abs() < 1e-9);
        for rate in [0.1, 5.0, 20.0, 50.0, 500.0] {
            assert!((empirical_fractions(rate).total() - 1.0).abs() < FRACTION_SUM_TOLERANCE);
        }
    }

    #[test]
    fn test_tier_selection() {
        assert_eq!(PhasePredictor::new(&grade(), None).tier(), PredictionTier::Empirical);
        assert_eq!(
            PhasePredictor::new(&grade(), Some(&kinetics())).tier(),
            PredictionTier::Jmak
        );
    }

    #[test]
    fn test_jmak_prediction_carries_history() {
        let predictor = PhasePredictor::new(&grade(), Some(&kinetics()));
        let path = CoolingPath::linear(850.0, 25.0, 30.0, 1000).unwrap();
        let prediction = predictor.predict(&path, None);
        assert_eq!(prediction.tier, PredictionTier::Jmak);
        assert!(prediction.history.is_some());
        assert!((prediction.fractions.total() - 1.0).abs() < FRACTION_SUM_TOLERANCE);
    }

    #[test]
    fn test_invalid_arrays_fall_back_to_empirical() {
        let predictor = PhasePredictor::new(&grade(), Some(&kinetics()));
        let prediction = predictor.predict_arrays(&[0.0, 2.0, 1.0], &[900.0, 800.0, 700.0], None);
        assert_eq!(prediction.tier, PredictionTier::Empirical);
        assert_eq!(prediction.t8_5, DEFAULT_T8_5);
    }

    #[test]
    fn test_diagrams_only_for_jmak_tier() {
        let empirical = PhasePredictor::new(&grade(), None);
        assert!(empirical.ttt_diagram(20).is_none());
        assert!(empirical.cct_diagram(&CctOptions::default()).is_none());

        let jmak = PhasePredictor::new(&grade(), Some(&kinetics()));
        let ttt = jmak.ttt_diagram(20).unwrap().unwrap();
        assert!(!ttt.is_empty());
    }
}
