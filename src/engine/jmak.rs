// ==========================================
// 热处理仿真核心 - JMAK 等温相变动力学
// ==========================================
// 模型: X(t, T) = 1 - exp(-b(T)·tⁿ)
// 红线: 有效温度区间外分数恒为 0; 退化情况返回 None, 不产生 NaN
// ==========================================

use crate::domain::kinetics::{BFunction, JmakParameters, TemperatureRange};
use crate::engine::error::{EngineError, EngineResult};

/// 气体常数 J/(mol·K)
pub const GAS_CONSTANT: f64 = 8.314;
/// 摄氏度 → 开尔文
pub const KELVIN_OFFSET: f64 = 273.15;
/// b·tⁿ 指数上限 (exp(-700) 已低于 f64 精度)
const MAX_EXPONENT: f64 = 700.0;

impl BFunction {
    /// 计算 b(T), T 为 °C; 结果非负
    pub fn evaluate(&self, temperature: f64) -> f64 {
        let value = match self {
            BFunction::Gaussian {
                b_max,
                t_nose,
                sigma,
            } => {
                if *sigma == 0.0 {
                    return 0.0;
                }
                let z = (temperature - t_nose) / sigma;
                b_max * (-0.5 * z * z).exp()
            }
            BFunction::Arrhenius {
                b0,
                activation_energy,
            } => {
                let t_k = temperature + KELVIN_OFFSET;
                if t_k <= 0.0 {
                    return 0.0;
                }
                b0 * (-activation_energy / (GAS_CONSTANT * t_k)).exp()
            }
            BFunction::Polynomial { coefficients } => coefficients
                .iter()
                .rev()
                .fold(0.0, |acc, a| acc * temperature + a),
        };

        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }
}

// ==========================================
// JmakModel - 单相 JMAK 模型
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct JmakModel {
    n: f64,
    b_function: BFunction,
    temp_range: Option<TemperatureRange>,
}

impl JmakModel {
    pub fn new(
        n: f64,
        b_function: BFunction,
        temp_range: Option<TemperatureRange>,
    ) -> EngineResult<Self> {
        if !(n > 0.0) || !n.is_finite() {
            return Err(EngineError::InvalidAvramiExponent(n));
        }
        if let Some(range) = temp_range {
            if !(range.min <= range.max) {
                return Err(EngineError::InvalidTemperatureRange {
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(Self {
            n,
            b_function,
            temp_range,
        })
    }

    pub fn from_parameters(params: &JmakParameters) -> EngineResult<Self> {
        Self::new(params.n, params.b_function.clone(), params.temp_range)
    }

    pub fn n(&self) -> f64 {
        self.n
    }

    pub fn b_function(&self) -> &BFunction {
        &self.b_function
    }

    pub fn temp_range(&self) -> Option<TemperatureRange> {
        self.temp_range
    }

    /// 返回限制在给定窗口内的新模型; 交集为空返回 None
    pub fn restricted_to(&self, window: TemperatureRange) -> Option<Self> {
        let range = match self.temp_range {
            Some(own) => own.intersect(&window)?,
            None => window,
        };
        Some(Self {
            n: self.n,
            b_function: self.b_function.clone(),
            temp_range: Some(range),
        })
    }

    pub fn in_range(&self, temperature: f64) -> bool {
        self.temp_range
            .map_or(true, |r| r.contains(temperature))
    }

    /// 有效 b(T): 区间外为 0
    pub fn b_value(&self, temperature: f64) -> f64 {
        if !self.in_range(temperature) {
            return 0.0;
        }
        self.b_function.evaluate(temperature)
    }

    /// 等温保持 t 秒后的转变分数
    pub fn fraction_transformed(&self, time: f64, temperature: f64) -> f64 {
        if !(time > 0.0) {
            return 0.0;
        }
        let b = self.b_value(temperature);
        if b <= 0.0 {
            return 0.0;
        }
        let exponent = (b * time.powf(self.n)).min(MAX_EXPONENT);
        (1.0 - (-exponent).exp()).clamp(0.0, 1.0)
    }

    /// 达到目标分数所需时间: t = (-ln(1-f)/b)^(1/n)
    pub fn time_to_fraction(&self, fraction: f64, temperature: f64) -> Option<f64> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return None;
        }
        let b = self.b_value(temperature);
        if b <= 0.0 {
            return None;
        }
        let t = (-(1.0 - fraction).ln() / b).powf(1.0 / self.n);
        if t.is_finite() {
            Some(t)
        } else {
            None
        }
    }

    /// 孕育时间 (达到起始阈值分数的时间)
    pub fn incubation_time(&self, temperature: f64, threshold: f64) -> Option<f64> {
        self.time_to_fraction(threshold, temperature)
    }

    /// dX/dt = n·b·t^(n-1)·exp(-b·tⁿ)
    pub fn transformation_rate(&self, time: f64, temperature: f64) -> f64 {
        if !(time > 0.0) {
            return 0.0;
        }
        let b = self.b_value(temperature);
        if b <= 0.0 {
            return 0.0;
        }
        let exponent = (b * time.powf(self.n)).min(MAX_EXPONENT);
        let rate = self.n * b * time.powf(self.n - 1.0) * (-exponent).exp();
        if rate.is_finite() {
            rate.max(0.0)
        } else {
            0.0
        }
    }
}
