// ==========================================
// 热处理仿真核心 - TTT 图生成
// ==========================================
// 职责: 各相在采样温度上的起始 (1%) / 终止 (99%) 等温时间
// 输出: 惰性、有限、可重复遍历的 (相, 温度, 起始时间, 终止时间) 序列
// ==========================================

use crate::domain::kinetics::{CriticalTemperatures, KineticsParameters, TemperatureRange};
use crate::domain::types::Phase;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::jmak::JmakModel;
use crate::engine::scheil::{DEFAULT_FINISH_FRACTION, DEFAULT_START_FRACTION};
use serde::{Deserialize, Serialize};

/// 超过该时间 (s) 视为实际不可达
pub const MAX_DIAGRAM_TIME: f64 = 1e8;
/// 缺省每相温度采样数
pub const DEFAULT_TEMPERATURE_SAMPLES: usize = 50;
const MID_FRACTION: f64 = 0.5;

/// TTT 图中某相的温度窗口 (绘图用, 比 Scheil 窗口略收窄)
pub fn ttt_window(phase: Phase, temps: &CriticalTemperatures) -> Option<TemperatureRange> {
    let (min, max) = match phase {
        Phase::Ferrite => (temps.bs + 20.0, temps.ae1 - 5.0),
        Phase::Pearlite => (temps.bs, temps.ae1 - 5.0),
        Phase::Bainite => (temps.ms + 10.0, temps.bs - 5.0),
        Phase::Martensite | Phase::RetainedAustenite => return None,
    };
    if max > min {
        Some(TemperatureRange::new(min, max))
    } else {
        None
    }
}

/// TTT 图上的一个点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TttPoint {
    pub phase: Phase,
    pub temperature: f64,
    pub start_time: Option<f64>,
    pub finish_time: Option<f64>,
    /// 仅在开启 50% 等值线时给出
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifty_time: Option<f64>,
}

/// 等值线选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contour {
    Start,
    Fifty,
    Finish,
}

#[derive(Debug, Clone)]
struct PhaseCurve {
    phase: Phase,
    model: JmakModel,
    temperatures: Vec<f64>,
}

// ==========================================
// TttDiagram
// ==========================================
#[derive(Debug, Clone)]
pub struct TttDiagram {
    curves: Vec<PhaseCurve>,
    start_fraction: f64,
    finish_fraction: f64,
    include_fifty: bool,
}

/// 由动力学参数在给定温度采样上生成 TTT 图
pub fn generate_ttt_diagram(
    params: &KineticsParameters,
    temp_samples: &[f64],
) -> EngineResult<TttDiagram> {
    let mut models = Vec::new();
    for phase in Phase::DIFFUSIONAL {
        if let Some(p) = params.for_phase(phase) {
            models.push((phase, JmakModel::from_parameters(p)?));
        }
    }
    TttDiagram::from_samples(models, temp_samples)
}

impl TttDiagram {
    /// 所有相共用同一组采样温度
    pub fn from_samples(models: Vec<(Phase, JmakModel)>, temp_samples: &[f64]) -> EngineResult<Self> {
        if let Some(t) = temp_samples.iter().find(|t| !t.is_finite()) {
            return Err(EngineError::InvalidInput(format!("采样温度非有限值: {}", t)));
        }
        let curves = sorted(models)
            .into_iter()
            .map(|(phase, model)| PhaseCurve {
                phase,
                model,
                temperatures: temp_samples.to_vec(),
            })
            .collect();
        Ok(Self::with_curves(curves))
    }

    /// 按临界温度划定各相窗口, 窗口内由高到低等距采样
    pub fn from_critical_temperatures(
        models: Vec<(Phase, JmakModel)>,
        temps: &CriticalTemperatures,
        n_temperatures: usize,
    ) -> EngineResult<Self> {
        if n_temperatures < 2 {
            return Err(EngineError::InvalidInput(format!(
                "温度采样数至少为 2: {}",
                n_temperatures
            )));
        }
        let mut curves = Vec::new();
        for (phase, model) in sorted(models) {
            let window = ttt_window(phase, temps).and_then(|w| match model.temp_range() {
                Some(own) => own.intersect(&w),
                None => Some(w),
            });
            let Some(window) = window.filter(|w| w.max > w.min) else {
                tracing::debug!("相 {} 在 TTT 图中无有效温度窗口", phase);
                continue;
            };
            let step = (window.max - window.min) / (n_temperatures - 1) as f64;
            let temperatures = (0..n_temperatures)
                .map(|i| {
                    if i + 1 == n_temperatures {
                        window.min
                    } else {
                        window.max - step * i as f64
                    }
                })
                .collect();
            curves.push(PhaseCurve {
                phase,
                model,
                temperatures,
            });
        }
        Ok(Self::with_curves(curves))
    }

    fn with_curves(curves: Vec<PhaseCurve>) -> Self {
        Self {
            curves,
            start_fraction: DEFAULT_START_FRACTION,
            finish_fraction: DEFAULT_FINISH_FRACTION,
            include_fifty: false,
        }
    }

    pub fn with_thresholds(mut self, start_fraction: f64, finish_fraction: f64) -> Self {
        if start_fraction > 0.0 && start_fraction < finish_fraction && finish_fraction < 1.0 {
            self.start_fraction = start_fraction;
            self.finish_fraction = finish_fraction;
        }
        self
    }

    /// 附带 50% 等值线
    pub fn with_fifty_contour(mut self, include: bool) -> Self {
        self.include_fifty = include;
        self
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.curves.iter().map(|c| c.phase)
    }

    pub fn model(&self, phase: Phase) -> Option<&JmakModel> {
        self.curves.iter().find(|c| c.phase == phase).map(|c| &c.model)
    }

    /// 点总数
    pub fn len(&self) -> usize {
        self.curves.iter().map(|c| c.temperatures.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 每次调用返回一个从头开始的新迭代器
    pub fn iter(&self) -> TttIter<'_> {
        TttIter {
            diagram: self,
            curve: 0,
            index: 0,
        }
    }

    /// 单相单条等值线上的 (时间, 温度) 点, 不可达点省略
    pub fn curve(&self, phase: Phase, contour: Contour) -> Vec<(f64, f64)> {
        self.iter()
            .filter(|p| p.phase == phase)
            .filter_map(|p| {
                let time = match contour {
                    Contour::Start => p.start_time,
                    Contour::Fifty => p.fifty_time,
                    Contour::Finish => p.finish_time,
                };
                time.map(|t| (t, p.temperature))
            })
            .collect()
    }

    /// 等值线最短时间所在温度 (鼻尖)
    pub fn nose(&self, phase: Phase) -> Option<(f64, f64)> {
        self.curve(phase, Contour::Start)
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    fn point(&self, curve: &PhaseCurve, temperature: f64) -> TttPoint {
        let time_at = |fraction: f64| {
            curve
                .model
                .time_to_fraction(fraction, temperature)
                .filter(|t| *t > 0.0 && *t < MAX_DIAGRAM_TIME)
        };
        TttPoint {
            phase: curve.phase,
            temperature,
            start_time: time_at(self.start_fraction),
            finish_time: time_at(self.finish_fraction),
            fifty_time: if self.include_fifty {
                time_at(MID_FRACTION)
            } else {
                None
            },
        }
    }
}

impl<'a> IntoIterator for &'a TttDiagram {
    type Item = TttPoint;
    type IntoIter = TttIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// TTT 点迭代器 (按相顺序, 相内按采样顺序)
#[derive(Debug, Clone)]
pub struct TttIter<'a> {
    diagram: &'a TttDiagram,
    curve: usize,
    index: usize,
}

impl<'a> Iterator for TttIter<'a> {
    type Item = TttPoint;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let curve = self.diagram.curves.get(self.curve)?;
            if let Some(&temperature) = curve.temperatures.get(self.index) {
                self.index += 1;
                return Some(self.diagram.point(curve, temperature));
            }
            self.curve += 1;
            self.index = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .diagram
            .curves
            .iter()
            .skip(self.curve)
            .enumerate()
            .map(|(i, c)| {
                if i == 0 {
                    c.temperatures.len().saturating_sub(self.index)
                } else {
                    c.temperatures.len()
                }
            })
            .sum();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TttIter<'_> {}

fn sorted(mut models: Vec<(Phase, JmakModel)>) -> Vec<(Phase, JmakModel)> {
    models.retain(|(p, _)| p.is_diffusional());
    models.sort_by_key(|(p, _)| *p);
    models
}
