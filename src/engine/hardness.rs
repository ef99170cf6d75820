// ==========================================
// 热处理仿真核心 - 硬度预测引擎
// ==========================================
// 职责: 相组成 → 淬火态硬度 (Maynier 混合律) → 力学性能估算
//       → Hollomon-Jaffe 回火软化
// 红线: 回火硬度 ≤ 淬火硬度, 且不低于铁素体-珠光体平衡硬度下限
// 红线: 回火温度或时间增加 (另一项不变) 时回火硬度不升高
// ==========================================

use crate::domain::composition::{Composition, SteelGrade, DEFAULT_HOLLOMON_JAFFE_C};
use crate::domain::cooling::CoolingPath;
use crate::domain::hardness::{HardnessResult, TemperingSpec};
use crate::domain::kinetics::KineticsParameters;
use crate::domain::phase::PhaseFractions;
use crate::domain::types::ToughnessRating;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::phase_predictor::{PhasePredictor, MIN_T8_5};
use std::collections::BTreeMap;
use tracing::instrument;

const KELVIN_OFFSET: f64 = 273.15;

/// 残余奥氏体硬度 (HV)
const RETAINED_AUSTENITE_HV: f64 = 200.0;
const MIN_HV: f64 = 100.0;
const MIN_BAINITE_HV: f64 = 150.0;

/// HRC 换算下限 (HV)
const HRC_MIN_HV: f64 = 200.0;
const HRC_MIN: f64 = 20.0;
const HRC_MAX: f64 = 68.0;

/// 回火软化曲线: S(HJP) = 1 / (1 + exp((HJP - 中点) / 宽度))
const SOFTENING_MIDPOINT: f64 = 16_500.0;
const SOFTENING_WIDTH: f64 = 1_100.0;
/// HJP 不超过该值时保留全部硬化量
const SOFTENING_ONSET: f64 = 10_000.0;

/// 回火结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperedHardness {
    pub hv: f64,
    pub hollomon_jaffe: f64,
}

/// HV → HRC; 低于 200 HV 无定义
pub fn hv_to_hrc(hv: f64) -> Option<f64> {
    if !(hv >= HRC_MIN_HV) {
        return None;
    }
    let hrc = -0.0001 * hv * hv + 0.1755 * hv - 8.48;
    Some(hrc.clamp(HRC_MIN, HRC_MAX))
}

/// Hollomon-Jaffe 参数: (T + 273.15) * (Hp + log10(t_h))
///
/// 保温时间 ≤ 0 视为未回火, 返回 0
pub fn hollomon_jaffe_parameter(temperature_c: f64, hold_min: f64, hp: f64) -> f64 {
    if !(hold_min > 0.0) {
        return 0.0;
    }
    (temperature_c + KELVIN_OFFSET) * (hp + (hold_min / 60.0).log10())
}

fn softening(hjp: f64) -> f64 {
    1.0 / (1.0 + ((hjp - SOFTENING_MIDPOINT) / SOFTENING_WIDTH).exp())
}

/// 保留的硬化量份额, [0, 1], 随 HJP 单调不增
fn retained_share(hjp: f64) -> f64 {
    let effective = hjp.max(0.0);
    (softening(effective) / softening(SOFTENING_ONSET)).clamp(0.0, 1.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ==========================================
// HardnessPredictor
// ==========================================
#[derive(Debug, Clone)]
pub struct HardnessPredictor {
    composition: Composition,
}

impl HardnessPredictor {
    pub fn new(composition: Composition) -> Self {
        Self { composition }
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    fn cooling_rate(t8_5: f64) -> f64 {
        300.0 / t8_5.max(MIN_T8_5)
    }

    /// 马氏体硬度 (Maynier)
    pub fn martensite_hardness(&self, t8_5: f64) -> f64 {
        let c = &self.composition;
        let vr = Self::cooling_rate(t8_5);
        let hv = 127.0 + 949.0 * c.c + 27.0 * c.si + 11.0 * c.mn + 8.0 * c.ni + 16.0 * c.cr
            + 21.0 * vr.log10();
        hv.max(MIN_HV)
    }

    /// 贝氏体硬度
    pub fn bainite_hardness(&self, t8_5: f64) -> f64 {
        let c = &self.composition;
        let hv = 200.0 + 500.0 * c.c + 30.0 * c.si + 20.0 * c.mn + 10.0 * c.ni + 30.0 * c.cr
            + 50.0 * c.mo
            - 5.0 * t8_5.max(MIN_T8_5).log10();
        hv.max(MIN_BAINITE_HV)
    }

    /// 铁素体-珠光体硬度
    pub fn ferrite_pearlite_hardness(&self, t8_5: f64) -> f64 {
        let c = &self.composition;
        let vr = Self::cooling_rate(t8_5);
        let hv = 42.0 + 223.0 * c.c + 53.0 * c.si + 30.0 * c.mn + 12.6 * c.ni + 7.0 * c.cr
            + 19.0 * c.mo
            + (10.0 - 19.0 * c.si + 4.0 * c.ni + 8.0 * c.cr + 130.0 * c.v) * vr.log10();
        hv.max(MIN_HV)
    }

    /// 回火下限: 铁素体-珠光体平衡硬度
    pub fn tempering_floor(&self) -> f64 {
        let c = &self.composition;
        42.0 + 223.0 * c.c + 53.0 * c.si + 30.0 * c.mn
    }

    /// 混合律淬火态硬度
    pub fn quenched_hardness(&self, fractions: &PhaseFractions, t8_5: f64) -> f64 {
        let hv = fractions.martensite * self.martensite_hardness(t8_5)
            + fractions.bainite * self.bainite_hardness(t8_5)
            + (fractions.ferrite + fractions.pearlite) * self.ferrite_pearlite_hardness(t8_5)
            + fractions.retained_austenite * RETAINED_AUSTENITE_HV;
        hv.max(MIN_HV)
    }

    /// 回火硬度
    ///
    /// 淬火硬度已低于下限时原样返回, 回火不会使硬度升高
    pub fn tempered_hardness(
        &self,
        hv_quenched: f64,
        temperature_c: f64,
        hold_min: f64,
        hp: f64,
    ) -> TemperedHardness {
        let hjp = hollomon_jaffe_parameter(temperature_c, hold_min, hp);
        if hjp == 0.0 || !(temperature_c + KELVIN_OFFSET > 0.0) {
            return TemperedHardness {
                hv: hv_quenched,
                hollomon_jaffe: hjp,
            };
        }

        let floor = self.tempering_floor();
        let hv = if hv_quenched <= floor {
            hv_quenched
        } else {
            floor + retained_share(hjp) * (hv_quenched - floor)
        };
        TemperedHardness {
            hv: hv.min(hv_quenched),
            hollomon_jaffe: hjp,
        }
    }

    pub fn tensile_strength(hv: f64) -> f64 {
        3.45 * hv
    }

    pub fn yield_strength(hv: f64, fractions: &PhaseFractions) -> f64 {
        let ratio = if fractions.martensite > 0.5 {
            0.90
        } else if fractions.bainite > 0.3 {
            0.85
        } else {
            0.70
        };
        Self::tensile_strength(hv) * ratio
    }

    /// 延伸率 (%)
    pub fn elongation(fractions: &PhaseFractions) -> f64 {
        fractions.martensite * 8.0
            + fractions.bainite * 16.0
            + (fractions.ferrite + fractions.pearlite) * 25.0
            + fractions.retained_austenite * 20.0
    }

    pub fn toughness(fractions: &PhaseFractions) -> ToughnessRating {
        if fractions.martensite > 0.8 {
            ToughnessRating::Poor
        } else if fractions.martensite > 0.4 {
            ToughnessRating::Acceptable
        } else {
            ToughnessRating::Good
        }
    }
}

/// 各截面位置的硬度/性能分布
///
/// # 参数
/// - cooling_paths: 位置键 → 冷却路径
/// - kinetics: 钢种 JMAK 参数 (无则经验预测)
/// - tempering: 回火工艺 (无或保温 ≤ 0 视为未回火)
pub fn predict_hardness_profile(
    grade: &SteelGrade,
    cooling_paths: &BTreeMap<String, CoolingPath>,
    kinetics: Option<&KineticsParameters>,
    tempering: Option<TemperingSpec>,
) -> EngineResult<HardnessResult> {
    let phase_predictor = PhasePredictor::new(grade, kinetics);
    predict_profile_with(
        &phase_predictor,
        grade,
        cooling_paths,
        tempering,
        grade
            .composition
            .hollomon_jaffe_constant()
            .unwrap_or(DEFAULT_HOLLOMON_JAFFE_C),
    )
}

/// 使用给定相组成预测器 (阈值已配置) 与 Hollomon-Jaffe 常数计算硬度分布
#[instrument(skip_all, fields(grade = %grade.designation, positions = cooling_paths.len()))]
pub fn predict_profile_with(
    phase_predictor: &PhasePredictor,
    grade: &SteelGrade,
    cooling_paths: &BTreeMap<String, CoolingPath>,
    tempering: Option<TemperingSpec>,
    hp: f64,
) -> EngineResult<HardnessResult> {
    if cooling_paths.is_empty() {
        return Err(EngineError::InsufficientData("未提供任何位置的冷却路径".to_string()));
    }

    let predictor = HardnessPredictor::new(grade.composition.clone());
    let tempering = tempering.filter(TemperingSpec::is_effective);
    let composition = &grade.composition;
    let mut result = HardnessResult {
        carbon_equivalent: round_to(composition.carbon_equivalent_iiw(), 3),
        ideal_diameter: round_to(composition.ideal_diameter_di(), 2),
        composition: composition.to_weight_percent().into_iter().collect(),
        ..HardnessResult::default()
    };

    for (position, path) in cooling_paths {
        let prediction = phase_predictor.predict(path, None);
        let fractions = prediction.fractions;
        let hv = predictor.quenched_hardness(&fractions, prediction.t8_5);

        result.hardness_hv.insert(position.clone(), round_to(hv, 1));
        result.hardness_hrc.insert(position.clone(), hv_to_hrc(hv).map(|v| round_to(v, 1)));
        result.t8_5_values.insert(position.clone(), round_to(prediction.t8_5, 2));
        result.phase_fractions.insert(position.clone(), fractions);
        result.uts_mpa.insert(
            position.clone(),
            round_to(HardnessPredictor::tensile_strength(hv), 0),
        );
        result.ys_mpa.insert(
            position.clone(),
            round_to(HardnessPredictor::yield_strength(hv, &fractions), 0),
        );
        result.elongation_pct.insert(
            position.clone(),
            round_to(HardnessPredictor::elongation(&fractions), 1),
        );
        result
            .toughness_rating
            .insert(position.clone(), HardnessPredictor::toughness(&fractions));

        if let Some(spec) = tempering {
            let tempered = predictor.tempered_hardness(
                hv,
                spec.temperature_c,
                spec.hold_min,
                hp,
            );
            result
                .tempered_hardness_hv
                .insert(position.clone(), round_to(tempered.hv, 1));
            result.tempered_hardness_hrc.insert(
                position.clone(),
                hv_to_hrc(tempered.hv).map(|v| round_to(v, 1)),
            );
            result.hollomon_jaffe_parameter = round_to(tempered.hollomon_jaffe, 0);
        }

        tracing::debug!(
            "位置 {}: tier={}, t8/5={:.2}s, HV={:.1}",
            position,
            prediction.tier,
            prediction.t8_5,
            hv
        );
    }

    if let Some(spec) = tempering {
        result.tempering_temperature = Some(spec.temperature_c);
        result.tempering_time = Some(spec.hold_min);
    }

    Ok(result)
}
