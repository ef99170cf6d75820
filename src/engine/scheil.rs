// ==========================================
// 热处理仿真核心 - Scheil 可加性积分
// ==========================================
// 职责: 连续冷却路径 + 各相 JMAK 参数 → 逐采样点相分数
// 算法:
//   孕育期: 累加 Σ Δt/τ(T_i), τ 为起始阈值对应的孕育时间, 达到 1 即开始相变
//   相变期: 等效等温时间 t_eq 使当前温度下等温曲线恰好给出已累积进度,
//           每步 t_eq += Δt 后读取 fraction_transformed(t_eq, T_i)
// 红线: 各相共享剩余奥氏体, Σ 分数 ≤ 1; 超出时按 铁素体 → 珠光体 → 贝氏体 顺序先到先得
// ==========================================

use crate::domain::cooling::CoolingPath;
use crate::domain::kinetics::{CriticalTemperatures, KineticsParameters, TemperatureRange, DEFAULT_KM_ALPHA};
use crate::domain::phase::{PhaseFractions, TransformationHistory, TransformationPoint};
use crate::domain::types::Phase;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::jmak::JmakModel;
use crate::engine::martensite::KoistinenMarburgerModel;
use std::collections::BTreeMap;
use tracing::instrument;

/// 缺省起始/终止阈值
pub const DEFAULT_START_FRACTION: f64 = 0.01;
pub const DEFAULT_FINISH_FRACTION: f64 = 0.99;

/// 低于此值视为该相未形成
const NEGLIGIBLE_FRACTION: f64 = 1e-3;
/// 铁素体窗口下限相对 Bs 的抬升 (°C)
const FERRITE_ABOVE_BS: f64 = 20.0;

/// 扩散型相在连续冷却中的温度窗口
pub fn phase_window(phase: Phase, temps: &CriticalTemperatures) -> Option<TemperatureRange> {
    let (min, max) = match phase {
        Phase::Ferrite => (temps.bs + FERRITE_ABOVE_BS, temps.ae3),
        Phase::Pearlite => (temps.bs, temps.ae1),
        Phase::Bainite => (temps.ms, temps.bs),
        Phase::Martensite | Phase::RetainedAustenite => return None,
    };
    if min <= max {
        Some(TemperatureRange::new(min, max))
    } else {
        None
    }
}

/// Scheil 积分达到 1 的 (时间, 温度); 路径上始终未孕育完成返回 None
pub fn scheil_onset(
    path: &CoolingPath,
    model: &JmakModel,
    threshold: f64,
) -> Option<TransformationPoint> {
    let samples = path.samples();
    let mut consumed = 0.0;
    for pair in samples.windows(2) {
        let dt = pair[1].time - pair[0].time;
        let temperature = pair[1].temperature;
        if let Some(tau) = model.incubation_time(temperature, threshold) {
            if tau > 0.0 {
                consumed += dt / tau;
                if consumed >= 1.0 {
                    return Some(TransformationPoint {
                        time: pair[1].time,
                        temperature,
                    });
                }
            }
        }
    }
    None
}

// ==========================================
// ScheilIntegrator
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheilIntegrator {
    /// 按评估顺序排列, 已限制在相窗口内
    phases: Vec<(Phase, JmakModel)>,
    martensite: Option<KoistinenMarburgerModel>,
    start_fraction: f64,
    finish_fraction: f64,
}

/// 单相积分状态
#[derive(Debug, Clone, Copy, Default)]
struct PhaseProgress {
    consumed: f64,
    started: bool,
    /// JMAK 归一化进度 X ∈ [0, 1)
    progress: f64,
    /// 相变开始时可用的奥氏体 (绝对分数)
    pool: f64,
}

impl ScheilIntegrator {
    /// 由钢种动力学参数与临界温度构建
    ///
    /// 未给出马氏体参数时由 Ms/Mf 与缺省 alpha 构造 K-M 模型
    pub fn new(params: &KineticsParameters, temps: &CriticalTemperatures) -> EngineResult<Self> {
        let mut phases = Vec::new();
        for phase in Phase::DIFFUSIONAL {
            let Some(jmak) = params.for_phase(phase) else {
                continue;
            };
            let model = JmakModel::from_parameters(jmak)?;
            match phase_window(phase, temps).and_then(|w| model.restricted_to(w)) {
                Some(restricted) => phases.push((phase, restricted)),
                None => tracing::debug!("相 {} 的温度窗口为空, 不参与积分", phase),
            }
        }

        let martensite = match &params.martensite {
            Some(m) => KoistinenMarburgerModel::from_parameters(m)?,
            None => KoistinenMarburgerModel::from_critical_temperatures(temps, DEFAULT_KM_ALPHA)?,
        };

        Ok(Self {
            phases,
            martensite: Some(martensite),
            start_fraction: DEFAULT_START_FRACTION,
            finish_fraction: DEFAULT_FINISH_FRACTION,
        })
    }

    /// 直接由模型构建 (顺序按扩散型相评估顺序重排)
    pub fn from_models(
        mut phases: Vec<(Phase, JmakModel)>,
        martensite: Option<KoistinenMarburgerModel>,
    ) -> EngineResult<Self> {
        if let Some((phase, _)) = phases.iter().find(|(p, _)| !p.is_diffusional()) {
            return Err(EngineError::InvalidInput(format!("{} 不是扩散型相", phase)));
        }
        phases.sort_by_key(|(p, _)| *p);
        Ok(Self {
            phases,
            martensite,
            start_fraction: DEFAULT_START_FRACTION,
            finish_fraction: DEFAULT_FINISH_FRACTION,
        })
    }

    /// 设置起始/终止阈值, 非法值保持原设置
    pub fn with_thresholds(mut self, start_fraction: f64, finish_fraction: f64) -> Self {
        if start_fraction > 0.0 && start_fraction < finish_fraction && finish_fraction < 1.0 {
            self.start_fraction = start_fraction;
            self.finish_fraction = finish_fraction;
        } else {
            tracing::warn!(
                "相变阈值无效 (start={}, finish={}), 保持缺省",
                start_fraction,
                finish_fraction
            );
        }
        self
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().map(|(p, _)| *p)
    }

    pub fn model(&self, phase: Phase) -> Option<&JmakModel> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, m)| m)
    }

    pub fn martensite(&self) -> Option<&KoistinenMarburgerModel> {
        self.martensite.as_ref()
    }

    /// 由并列数组积分 (先校验冷却路径)
    pub fn integrate_arrays(&self, times: &[f64], temperatures: &[f64]) -> EngineResult<TransformationHistory> {
        if times.len() != temperatures.len() {
            return Err(EngineError::InvalidInput(format!(
                "时间/温度数组长度不一致: {} vs {}",
                times.len(),
                temperatures.len()
            )));
        }
        let path = CoolingPath::from_arrays(times, temperatures)?;
        Ok(self.integrate(&path))
    }

    /// 沿冷却路径积分, 每个采样点输出一个相分数向量
    #[instrument(skip(self, path), fields(samples = path.len(), phases = self.phases.len()))]
    pub fn integrate(&self, path: &CoolingPath) -> TransformationHistory {
        let samples = path.samples();
        let mut progress = vec![PhaseProgress::default(); self.phases.len()];
        let mut current = PhaseFractions::default();
        let mut min_temperature = f64::INFINITY;
        let mut onset = BTreeMap::new();
        let mut fractions = Vec::with_capacity(samples.len());

        for (i, sample) in samples.iter().enumerate() {
            let temperature = sample.temperature;
            min_temperature = min_temperature.min(temperature);

            if i > 0 {
                let dt = sample.time - samples[i - 1].time;
                for ((phase, model), state) in self.phases.iter().zip(progress.iter_mut()) {
                    let budget = 1.0 - current.transformed_total();
                    let increment = self.advance_phase(model, state, dt, temperature, budget);
                    if state.started && !onset.contains_key(phase) {
                        onset.insert(*phase, TransformationPoint { time: sample.time, temperature });
                    }
                    if increment > 0.0 {
                        current.set(*phase, current.get(*phase) + increment);
                    }
                }
            }

            if let Some(km) = &self.martensite {
                let diffusional = current.diffusional_total();
                let target = km.transformed_fraction(min_temperature) * (1.0 - diffusional);
                current.martensite = current.martensite.max(target.min(1.0 - diffusional));
            }
            current.retained_austenite = (1.0 - current.transformed_total()).max(0.0);
            fractions.push(current);
        }

        let mut history = TransformationHistory {
            times: path.times(),
            temperatures: path.temperatures(),
            fractions,
            onset,
            ..Default::default()
        };
        self.mark_start_finish(&mut history);

        tracing::debug!(
            "Scheil 积分完成: 最终 F={:.3} P={:.3} B={:.3} M={:.3} RA={:.3}",
            current.ferrite,
            current.pearlite,
            current.bainite,
            current.martensite,
            current.retained_austenite
        );
        history
    }

    /// 推进单相一步, 返回本步新增的绝对分数 (不超过 budget)
    fn advance_phase(
        &self,
        model: &JmakModel,
        state: &mut PhaseProgress,
        dt: f64,
        temperature: f64,
        budget: f64,
    ) -> f64 {
        if budget <= 0.0 || !model.in_range(temperature) {
            return 0.0;
        }

        if !state.started {
            let Some(tau) = model.incubation_time(temperature, self.start_fraction) else {
                return 0.0;
            };
            if tau <= 0.0 {
                return 0.0;
            }
            state.consumed += dt / tau;
            if state.consumed < 1.0 {
                return 0.0;
            }
            state.started = true;
            state.pool = budget;
            state.progress = self.start_fraction;
            return (self.start_fraction * state.pool).min(budget);
        }

        if state.progress >= 1.0 {
            return 0.0;
        }
        let Some(t_eq) = model.time_to_fraction(state.progress, temperature) else {
            return 0.0;
        };
        let next = model.fraction_transformed(t_eq + dt, temperature);
        if next <= state.progress {
            return 0.0;
        }
        let increment = ((next - state.progress) * state.pool).min(budget);
        state.progress = next;
        increment.max(0.0)
    }

    /// 各相首次超过终态 1% / 99% 的采样点
    fn mark_start_finish(&self, history: &mut TransformationHistory) {
        let final_fractions = history.final_fractions();
        let tracked = self.phases().chain(std::iter::once(Phase::Martensite));

        for phase in tracked {
            let final_value = final_fractions.get(phase);
            if final_value < NEGLIGIBLE_FRACTION {
                continue;
            }
            let start_level = self.start_fraction * final_value;
            let finish_level = self.finish_fraction * final_value;

            let start = first_above(history, phase, start_level);
            let finish = first_above(history, phase, finish_level);

            if let Some(point) = start {
                history.transformation_start.insert(phase, point);
            }
            if let Some(point) = finish {
                history.transformation_finish.insert(phase, point);
            }
        }
    }
}

fn first_above(history: &TransformationHistory, phase: Phase, level: f64) -> Option<TransformationPoint> {
    history
        .fractions
        .iter()
        .position(|f| f.get(phase) > level)
        .map(|idx| TransformationPoint {
            time: history.times[idx],
            temperature: history.temperatures[idx],
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kinetics::{BFunction, JmakParameters, MartensiteParameters};
    use crate::domain::phase::FRACTION_SUM_TOLERANCE;

    fn critical() -> CriticalTemperatures {
        CriticalTemperatures {
            ae1: 727.0,
            ae3: 800.0,
            bs: 550.0,
            ms: 320.0,
            mf: 120.0,
        }
    }

    fn kinetics() -> KineticsParameters {
        KineticsParameters {
            jmak: vec![
                JmakParameters {
                    phase: Phase::Bainite,
                    n: 2.5,
                    b_function: BFunction::Gaussian {
                        b_max: 0.005,
                        t_nose: 450.0,
                        sigma: 50.0,
                    },
                    temp_range: Some(TemperatureRange::new(250.0, 550.0)),
                },
                JmakParameters {
                    phase: Phase::Ferrite,
                    n: 1.0,
                    b_function: BFunction::Gaussian {
                        b_max: 0.05,
                        t_nose: 700.0,
                        sigma: 50.0,
                    },
                    temp_range: Some(TemperatureRange::new(570.0, 800.0)),
                },
                JmakParameters {
                    phase: Phase::Pearlite,
                    n: 1.5,
                    b_function: BFunction::Gaussian {
                        b_max: 0.001,
                        t_nose: 650.0,
                        sigma: 60.0,
                    },
                    temp_range: Some(TemperatureRange::new(400.0, 727.0)),
                },
            ],
            martensite: Some(MartensiteParameters {
                ms: 320.0,
                mf: 120.0,
                alpha: 0.011,
            }),
            austenitizing_temperature: Some(900.0),
        }
    }

    fn integrator() -> ScheilIntegrator {
        ScheilIntegrator::new(&kinetics(), &critical()).unwrap()
    }

    #[test]
    fn test_phase_order_is_fixed() {
        let order: Vec<Phase> = integrator().phases().collect();
        assert_eq!(order, vec![Phase::Ferrite, Phase::Pearlite, Phase::Bainite]);
    }

    #[test]
    fn test_phase_windows() {
        let w = phase_window(Phase::Ferrite, &critical()).unwrap();
        assert_eq!(w, TemperatureRange::new(570.0, 800.0));
        assert_eq!(
            phase_window(Phase::Bainite, &critical()),
            Some(TemperatureRange::new(320.0, 550.0))
        );
        assert_eq!(phase_window(Phase::Martensite, &critical()), None);
    }

    #[test]
    fn test_fractions_sum_to_one_at_every_sample() {
        let s = integrator();
        for rate in [0.1, 1.0, 10.0, 100.0] {
            let path = CoolingPath::linear(900.0, 25.0, rate, 2000).unwrap();
            let history = s.integrate(&path);
            assert_eq!(history.len(), path.len());
            for f in &history.fractions {
                assert!((f.total() - 1.0).abs() < FRACTION_SUM_TOLERANCE, "sum={}", f.total());
                for phase in Phase::ALL {
                    assert!(f.get(phase) >= -1e-12 && f.get(phase) <= 1.0 + 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_fast_quench_gives_martensite() {
        let path = CoolingPath::linear(900.0, 25.0, 500.0, 2000).unwrap();
        let final_f = integrator().integrate(&path).final_fractions();
        assert!(final_f.martensite > 0.8, "M={}", final_f.martensite);
        assert!(final_f.diffusional_total() < 0.05);
    }

    #[test]
    fn test_slow_cooling_gives_diffusional_phases() {
        let path = CoolingPath::linear(900.0, 25.0, 0.1, 3000).unwrap();
        let history = integrator().integrate(&path);
        let final_f = history.final_fractions();
        assert!(final_f.diffusional_total() > 0.9, "D={}", final_f.diffusional_total());
        assert!(final_f.martensite < 0.1);
        assert!(history.onset.contains_key(&Phase::Ferrite));
        assert!(history.transformation_start.contains_key(&Phase::Ferrite));
    }

    #[test]
    fn test_fractions_monotonic_along_path() {
        let path = CoolingPath::linear(900.0, 25.0, 5.0, 2000).unwrap();
        let history = integrator().integrate(&path);
        for phase in [Phase::Ferrite, Phase::Pearlite, Phase::Bainite, Phase::Martensite] {
            let series = history.series(phase);
            for pair in series.windows(2) {
                assert!(pair[1] >= pair[0] - 1e-15);
            }
        }
    }

    #[test]
    fn test_scheil_onset_matches_history() {
        let s = integrator();
        let path = CoolingPath::linear(900.0, 25.0, 0.5, 3000).unwrap();
        let model = s.model(Phase::Ferrite).unwrap();
        let onset = scheil_onset(&path, model, DEFAULT_START_FRACTION).unwrap();
        let history = s.integrate(&path);
        assert_eq!(history.onset.get(&Phase::Ferrite), Some(&onset));
        assert!(onset.temperature <= 800.0 && onset.temperature >= 570.0);
    }

    #[test]
    fn test_single_sample_path_is_austenite() {
        let path = CoolingPath::from_arrays(&[0.0], &[900.0]).unwrap();
        let history = integrator().integrate(&path);
        assert_eq!(history.final_fractions(), PhaseFractions::default());
    }

    #[test]
    fn test_integrate_arrays_rejects_bad_input() {
        let s = integrator();
        assert!(matches!(
            s.integrate_arrays(&[], &[]),
            Err(EngineError::CoolingPath(_))
        ));
        assert!(matches!(
            s.integrate_arrays(&[0.0, 1.0, 0.5], &[900.0, 800.0, 700.0]),
            Err(EngineError::CoolingPath(_))
        ));
        assert!(matches!(
            s.integrate_arrays(&[0.0, 1.0], &[900.0]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_models_rejects_martensite_jmak() {
        let m = JmakModel::new(
            1.0,
            BFunction::Polynomial {
                coefficients: vec![0.1],
            },
            None,
        )
        .unwrap();
        assert!(ScheilIntegrator::from_models(vec![(Phase::Martensite, m)], None).is_err());
    }
}
