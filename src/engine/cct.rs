// ==========================================
// 热处理仿真核心 - CCT 图生成
// ==========================================
// 职责: 一组恒定冷速下的线性冷却 → Scheil 积分 → 各相起始/终止点
// 红线: 终态分数 < 0.5% 的相不记录; 每条曲线至少 2 点; 点按温度降序
// ==========================================

use crate::domain::cooling::CoolingPath;
use crate::domain::phase::{PhaseFractions, TransformationPoint};
use crate::domain::types::Phase;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::scheil::{ScheilIntegrator, DEFAULT_FINISH_FRACTION, DEFAULT_START_FRACTION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

/// 记录曲线点的最小终态分数
const MIN_RECORDED_FRACTION: f64 = 0.005;
const MIN_CURVE_POINTS: usize = 2;

/// 缺省冷速范围 10^-1 .. 10^2.3 K/s
const RATE_LOG_MIN: f64 = -1.0;
const RATE_LOG_MAX: f64 = 2.3;
pub const DEFAULT_RATE_COUNT: usize = 30;

/// 对数等距冷速
pub fn default_cooling_rates(count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![10f64.powf(RATE_LOG_MIN)],
        _ => {
            let step = (RATE_LOG_MAX - RATE_LOG_MIN) / (count - 1) as f64;
            (0..count)
                .map(|i| 10f64.powf(RATE_LOG_MIN + step * i as f64))
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CctOptions {
    /// 冷速 (K/s)
    pub cooling_rates: Vec<f64>,
    pub austenitizing_temp: f64,
    pub end_temp: f64,
    pub start_fraction: f64,
    pub finish_fraction: f64,
}

impl Default for CctOptions {
    fn default() -> Self {
        Self {
            cooling_rates: default_cooling_rates(DEFAULT_RATE_COUNT),
            austenitizing_temp: 900.0,
            end_temp: 25.0,
            start_fraction: DEFAULT_START_FRACTION,
            finish_fraction: DEFAULT_FINISH_FRACTION,
        }
    }
}

impl CctOptions {
    fn validate(&self) -> EngineResult<()> {
        if let Some(rate) = self.cooling_rates.iter().find(|r| !(**r > 0.0) || !r.is_finite()) {
            return Err(EngineError::InvalidInput(format!("冷速必须为正: {}", rate)));
        }
        if !(self.austenitizing_temp > self.end_temp) {
            return Err(EngineError::InvalidInput(format!(
                "奥氏体化温度 {} 必须高于终冷温度 {}",
                self.austenitizing_temp, self.end_temp
            )));
        }
        Ok(())
    }

    fn sorted_rates(&self) -> Vec<f64> {
        let mut rates = self.cooling_rates.clone();
        rates.sort_by(f64::total_cmp);
        rates
    }
}

/// 单相 CCT 曲线
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CctCurve {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start: Vec<TransformationPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finish: Vec<TransformationPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CctDiagram {
    pub curves: BTreeMap<Phase, CctCurve>,
}

impl CctDiagram {
    pub fn curve(&self, phase: Phase) -> Option<&CctCurve> {
        self.curves.get(&phase)
    }
}

/// 某冷速下的终态相分数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoolingRateFractions {
    pub cooling_rate: f64,
    pub fractions: PhaseFractions,
}

/// 线性冷却路径采样数: 约 0.1 s 分辨率, 限制在 [min, max]
fn sample_count(total_time: f64, per_second: f64, min: usize, max: usize) -> usize {
    let wanted = (total_time * per_second).floor();
    if wanted.is_finite() && wanted > 0.0 {
        (wanted as usize).clamp(min, max)
    } else {
        min
    }
}

/// 由 TTT 动力学 (含相窗口与马氏体模型) 在多冷速下生成 CCT 曲线族
#[instrument(skip(ttt_kinetics, options), fields(rates = options.cooling_rates.len()))]
pub fn generate_cct_from_ttt(
    ttt_kinetics: &ScheilIntegrator,
    options: &CctOptions,
) -> EngineResult<CctDiagram> {
    options.validate()?;
    let integrator = ttt_kinetics
        .clone()
        .with_thresholds(options.start_fraction, options.finish_fraction);

    let mut starts: BTreeMap<Phase, Vec<TransformationPoint>> = BTreeMap::new();
    let mut finishes: BTreeMap<Phase, Vec<TransformationPoint>> = BTreeMap::new();

    for rate in options.sorted_rates() {
        let total_time = (options.austenitizing_temp - options.end_temp) / rate;
        let n = sample_count(total_time, 10.0, 500, 5000);
        let path = CoolingPath::linear(options.austenitizing_temp, options.end_temp, rate, n)?;
        let history = integrator.integrate(&path);
        let final_fractions = history.final_fractions();

        for phase in [Phase::Ferrite, Phase::Pearlite, Phase::Bainite, Phase::Martensite] {
            let final_value = final_fractions.get(phase);
            if final_value < MIN_RECORDED_FRACTION {
                continue;
            }
            let series = history.series(phase);
            let first_at_least = |level: f64| {
                series.iter().position(|f| *f >= level).map(|idx| TransformationPoint {
                    time: history.times[idx],
                    temperature: history.temperatures[idx],
                })
            };
            if let Some(p) = first_at_least(options.start_fraction * final_value) {
                starts.entry(phase).or_default().push(p);
            }
            if let Some(p) = first_at_least(options.finish_fraction * final_value) {
                finishes.entry(phase).or_default().push(p);
            }
        }
    }

    let mut diagram = CctDiagram::default();
    for phase in Phase::ALL {
        let curve = CctCurve {
            start: finalize_points(starts.remove(&phase)),
            finish: finalize_points(finishes.remove(&phase)),
        };
        if !curve.start.is_empty() || !curve.finish.is_empty() {
            diagram.curves.insert(phase, curve);
        }
    }

    tracing::info!("CCT 曲线生成完成: 相数={}", diagram.curves.len());
    Ok(diagram)
}

/// 各冷速下的终态相分数
#[instrument(skip(ttt_kinetics, options), fields(rates = options.cooling_rates.len()))]
pub fn generate_cct_phase_fractions(
    ttt_kinetics: &ScheilIntegrator,
    options: &CctOptions,
) -> EngineResult<Vec<CoolingRateFractions>> {
    options.validate()?;
    let mut out = Vec::with_capacity(options.cooling_rates.len());
    for rate in options.sorted_rates() {
        let total_time = (options.austenitizing_temp - options.end_temp) / rate;
        let n = sample_count(total_time, 5.0, 200, 3000);
        let path = CoolingPath::linear(options.austenitizing_temp, options.end_temp, rate, n)?;
        out.push(CoolingRateFractions {
            cooling_rate: rate,
            fractions: ttt_kinetics.integrate(&path).final_fractions(),
        });
    }
    Ok(out)
}

fn finalize_points(points: Option<Vec<TransformationPoint>>) -> Vec<TransformationPoint> {
    let mut points = points.unwrap_or_default();
    if points.len() < MIN_CURVE_POINTS {
        return Vec::new();
    }
    points.sort_by(|a, b| b.temperature.total_cmp(&a.temperature));
    points
}
