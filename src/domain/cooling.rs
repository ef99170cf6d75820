// ==========================================
// 热处理仿真核心 - 冷却路径
// ==========================================
// 职责: 外部热/FEM 求解器输出的 (时间, 温度) 序列
// 红线: 非空、时间严格递增、数值有限 (构造时校验)
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 冷却路径校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoolingPathError {
    #[error("冷却路径为空")]
    Empty,

    #[error("时间序列非严格递增: index={index}, t_prev={previous}, t={current}")]
    NonMonotonicTime {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("冷却路径含非有限数值: index={index}")]
    NonFinite { index: usize },

    #[error("线性冷却参数无效: {0}")]
    InvalidLinearPath(String),
}

/// 单个采样点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoolingSample {
    /// 时间 (s)
    pub time: f64,
    /// 温度 (°C)
    pub temperature: f64,
}

impl CoolingSample {
    pub fn new(time: f64, temperature: f64) -> Self {
        Self { time, temperature }
    }
}

// ==========================================
// CoolingPath - 冷却路径
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CoolingSample>", into = "Vec<CoolingSample>")]
pub struct CoolingPath {
    samples: Vec<CoolingSample>,
}

impl CoolingPath {
    /// 校验并构造冷却路径
    pub fn new(samples: Vec<CoolingSample>) -> Result<Self, CoolingPathError> {
        if samples.is_empty() {
            return Err(CoolingPathError::Empty);
        }

        for (index, s) in samples.iter().enumerate() {
            if !s.time.is_finite() || !s.temperature.is_finite() {
                return Err(CoolingPathError::NonFinite { index });
            }
            if index > 0 {
                let previous = samples[index - 1].time;
                if s.time <= previous {
                    return Err(CoolingPathError::NonMonotonicTime {
                        index,
                        previous,
                        current: s.time,
                    });
                }
            }
        }

        Ok(Self { samples })
    }

    /// 由并列的时间/温度数组构造
    pub fn from_arrays(times: &[f64], temperatures: &[f64]) -> Result<Self, CoolingPathError> {
        let samples = times
            .iter()
            .zip(temperatures.iter())
            .map(|(&t, &temp)| CoolingSample::new(t, temp))
            .collect();
        Self::new(samples)
    }

    /// 恒速线性冷却路径
    ///
    /// # 参数
    /// - start_temp / end_temp: 起止温度 (°C)
    /// - rate: 冷却速率 (K/s, > 0)
    /// - n_samples: 采样点数 (≥ 2)
    pub fn linear(
        start_temp: f64,
        end_temp: f64,
        rate: f64,
        n_samples: usize,
    ) -> Result<Self, CoolingPathError> {
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(CoolingPathError::InvalidLinearPath(format!("rate={}", rate)));
        }
        if start_temp <= end_temp {
            return Err(CoolingPathError::InvalidLinearPath(format!(
                "start_temp={} <= end_temp={}",
                start_temp, end_temp
            )));
        }
        if n_samples < 2 {
            return Err(CoolingPathError::InvalidLinearPath(format!(
                "n_samples={}",
                n_samples
            )));
        }

        let total_time = (start_temp - end_temp) / rate;
        let step = total_time / (n_samples - 1) as f64;
        let samples = (0..n_samples)
            .map(|i| {
                let t = step * i as f64;
                CoolingSample::new(t, start_temp - rate * t)
            })
            .collect();
        Self::new(samples)
    }

    pub fn samples(&self) -> &[CoolingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.temperature).collect()
    }

    /// 路径最低温度
    pub fn min_temperature(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.temperature)
            .fold(f64::INFINITY, f64::min)
    }

    /// 路径最高温度
    pub fn max_temperature(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.temperature)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl TryFrom<Vec<CoolingSample>> for CoolingPath {
    type Error = CoolingPathError;

    fn try_from(samples: Vec<CoolingSample>) -> Result<Self, Self::Error> {
        CoolingPath::new(samples)
    }
}

impl From<CoolingPath> for Vec<CoolingSample> {
    fn from(path: CoolingPath) -> Self {
        path.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_path() {
        assert_eq!(CoolingPath::new(vec![]), Err(CoolingPathError::Empty));
    }

    #[test]
    fn test_rejects_non_monotonic_time() {
        let err = CoolingPath::from_arrays(&[0.0, 2.0, 2.0], &[900.0, 800.0, 700.0]).unwrap_err();
        assert!(matches!(err, CoolingPathError::NonMonotonicTime { index: 2, .. }));
    }

    #[test]
    fn test_rejects_nan() {
        let err = CoolingPath::from_arrays(&[0.0, 1.0], &[900.0, f64::NAN]).unwrap_err();
        assert_eq!(err, CoolingPathError::NonFinite { index: 1 });
    }

    #[test]
    fn test_linear_path_endpoints() {
        let path = CoolingPath::linear(900.0, 25.0, 10.0, 101).unwrap();
        assert_eq!(path.len(), 101);
        assert!((path.samples()[100].time - 87.5).abs() < 1e-9);
        assert!((path.min_temperature() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"[{"time": 1.0, "temperature": 800.0}, {"time": 0.5, "temperature": 700.0}]"#;
        assert!(serde_json::from_str::<CoolingPath>(bad).is_err());
        let good = r#"[{"time": 0.0, "temperature": 800.0}, {"time": 0.5, "temperature": 700.0}]"#;
        assert_eq!(serde_json::from_str::<CoolingPath>(good).unwrap().len(), 2);
    }
}
