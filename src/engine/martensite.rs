// ==========================================
// 热处理仿真核心 - Koistinen-Marburger 马氏体模型
// ==========================================
// f(T) = 1 - exp(-α·(Ms - T)),  Mf ≤ T ≤ Ms
// T > Ms: 0;  T < Mf: 保持 f(Mf) 不再增长
// 红线: 最终分数不超过扩散型相变后剩余的奥氏体
// ==========================================

use crate::domain::composition::Composition;
use crate::domain::kinetics::{
    CriticalTemperatureOverrides, CriticalTemperatures, MartensiteParameters, DEFAULT_KM_ALPHA,
};
use crate::engine::critical_temperatures;
use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KoistinenMarburgerModel {
    ms: f64,
    mf: f64,
    alpha: f64,
}

impl KoistinenMarburgerModel {
    pub fn new(ms: f64, mf: f64, alpha: f64) -> EngineResult<Self> {
        if !(alpha > 0.0) || !alpha.is_finite() {
            return Err(EngineError::InvalidInput(format!("K-M 系数 alpha 必须为正: {}", alpha)));
        }
        if !(mf < ms) {
            return Err(EngineError::InvalidTemperatureRange { min: mf, max: ms });
        }
        Ok(Self { ms, mf, alpha })
    }

    pub fn from_parameters(params: &MartensiteParameters) -> EngineResult<Self> {
        Self::new(params.ms, params.mf, params.alpha)
    }

    pub fn from_critical_temperatures(temps: &CriticalTemperatures, alpha: f64) -> EngineResult<Self> {
        Self::new(temps.ms, temps.mf, alpha)
    }

    /// 由成分估算 Ms/Mf, 使用缺省 alpha
    pub fn from_composition(composition: &Composition) -> EngineResult<Self> {
        let temps =
            critical_temperatures::estimate(composition, &CriticalTemperatureOverrides::default());
        Self::from_critical_temperatures(&temps, DEFAULT_KM_ALPHA)
    }

    pub fn ms(&self) -> f64 {
        self.ms
    }

    pub fn mf(&self) -> f64 {
        self.mf
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// 冷却至 T 时的马氏体分数 (相对可用奥氏体)
    pub fn transformed_fraction(&self, temperature: f64) -> f64 {
        if !(temperature < self.ms) {
            return 0.0;
        }
        let effective = temperature.max(self.mf);
        (1.0 - (-self.alpha * (self.ms - effective)).exp()).clamp(0.0, 1.0)
    }

    /// Mf 处的饱和分数
    pub fn saturation_fraction(&self) -> f64 {
        self.transformed_fraction(self.mf)
    }

    /// 达到指定分数的温度; 超过饱和分数返回 None
    pub fn temperature_at_fraction(&self, fraction: f64) -> Option<f64> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return None;
        }
        let temperature = self.ms + (1.0 - fraction).ln() / self.alpha;
        if temperature >= self.mf {
            Some(temperature)
        } else {
            None
        }
    }

    /// 冷却曲线的最终马氏体分数 (只取决于最低温度)
    pub fn fraction_from_cooling(&self, temperatures: &[f64], austenite_remaining: f64) -> f64 {
        let t_min = temperatures.iter().copied().fold(f64::INFINITY, f64::min);
        if !t_min.is_finite() {
            return 0.0;
        }
        self.transformed_fraction(t_min) * austenite_remaining.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn km() -> KoistinenMarburgerModel {
        KoistinenMarburgerModel::new(320.0, 120.0, 0.011).unwrap()
    }

    #[test]
    fn test_zero_above_ms() {
        assert_eq!(km().transformed_fraction(400.0), 0.0);
        assert_eq!(km().transformed_fraction(320.0), 0.0);
    }

    #[test]
    fn test_saturates_below_mf() {
        let m = km();
        let at_mf = m.transformed_fraction(120.0);
        assert!((at_mf - (1.0 - (-0.011f64 * 200.0).exp())).abs() < 1e-12);
        assert_eq!(m.transformed_fraction(25.0), at_mf);
        assert_eq!(m.transformed_fraction(-100.0), at_mf);
        assert_eq!(m.saturation_fraction(), at_mf);
    }

    #[test]
    fn test_monotonic_between_ms_and_mf() {
        let m = km();
        let mut prev = 0.0;
        for i in 0..=200 {
            let f = m.transformed_fraction(320.0 - i as f64);
            assert!(f >= prev);
            prev = f;
        }
    }

    #[test]
    fn test_temperature_at_fraction_inverse() {
        let m = km();
        let t = m.temperature_at_fraction(0.5).unwrap();
        assert!((m.transformed_fraction(t) - 0.5).abs() < 1e-12);
        // 0.95 需要冷至 Mf 以下, 不可达
        assert_eq!(m.temperature_at_fraction(0.95), None);
        assert_eq!(m.temperature_at_fraction(0.0), None);
    }

    #[test]
    fn test_fraction_from_cooling_capped_by_austenite() {
        let m = km();
        let temps = [800.0, 500.0, 200.0, 25.0];
        let full = m.fraction_from_cooling(&temps, 1.0);
        let partial = m.fraction_from_cooling(&temps, 0.3);
        assert!((partial - 0.3 * full).abs() < 1e-12);
        assert!(partial <= 0.3);
        assert_eq!(m.fraction_from_cooling(&[], 1.0), 0.0);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(KoistinenMarburgerModel::new(300.0, 320.0, 0.011).is_err());
        assert!(KoistinenMarburgerModel::new(300.0, 100.0, 0.0).is_err());
    }
}
