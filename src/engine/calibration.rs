// ==========================================
// 热处理仿真核心 - JMAK 参数标定
// ==========================================
// 输入: 等温膨胀实验 (T, t, f) 三元组
// 步骤:
//   1. 每条等温线线性化 ln(-ln(1-f)) = n·ln t + ln b, 得 (n, b(T))
//   2. n 取各等温线均值
//   3. 拟合 b(T): 高斯 (对数空间二次回归 + LM 精修) / Arrhenius (ln b 对 1/T_K 线性回归)
// 工具: nalgebra 求解 3×3 法方程
// ==========================================

use crate::domain::kinetics::BFunction;
use crate::domain::types::BFunctionFamily;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::jmak::{GAS_CONSTANT, KELVIN_OFFSET};
use nalgebra::{Matrix3, Vector3};
use tracing::instrument;

/// 线性化时采用的分数区间 (开区间)
const FIT_FRACTION_MIN: f64 = 0.001;
const FIT_FRACTION_MAX: f64 = 0.999;

/// 高斯宽度约束 (°C)
const SIGMA_MIN: f64 = 10.0;
const SIGMA_MAX: f64 = 500.0;
/// 鼻尖温度相对数据范围的外扩上限 (°C)
const NOSE_MARGIN: f64 = 100.0;

const LM_MAX_ITERATIONS: usize = 200;

/// Arrhenius 数据不足时的缺省参数
const DEFAULT_ARRHENIUS_B0: f64 = 1.0;
const DEFAULT_ARRHENIUS_Q: f64 = 100_000.0;

/// 标定结果
#[derive(Debug, Clone, PartialEq)]
pub struct JmakFit {
    pub n: f64,
    pub b_function: BFunction,
    /// 各等温线提取的 (T, b) 点
    pub isotherm_b_values: Vec<(f64, f64)>,
    /// 对数空间 b(T) 拟合残差平方和
    pub residual: f64,
}

impl JmakFit {
    pub fn family(&self) -> BFunctionFamily {
        self.b_function.family()
    }
}

/// 由等温实验数据拟合 n 与 b(T)
#[instrument(skip(temperatures, times, fractions), fields(points = temperatures.len(), family = %family))]
pub fn fit_jmak_parameters(
    temperatures: &[f64],
    times: &[f64],
    fractions: &[f64],
    family: BFunctionFamily,
) -> EngineResult<JmakFit> {
    if temperatures.len() != times.len() || times.len() != fractions.len() {
        return Err(EngineError::InvalidInput(format!(
            "数组长度不一致: T={}, t={}, f={}",
            temperatures.len(),
            times.len(),
            fractions.len()
        )));
    }

    let mut n_values = Vec::new();
    let mut pairs = Vec::new();

    for (temperature, points) in group_by_temperature(temperatures, times, fractions) {
        let (t, f): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        match fit_isotherm(&t, &f, FIT_FRACTION_MIN, FIT_FRACTION_MAX) {
            Some((n, b)) if n > 0.0 && b > 0.0 => {
                n_values.push(n);
                pairs.push((temperature, b));
            }
            _ => {
                tracing::debug!("等温线 T={} 有效点不足或斜率非正, 跳过", temperature);
            }
        }
    }

    if n_values.is_empty() {
        return Err(EngineError::InsufficientData(
            "没有可用于线性化的等温线".to_string(),
        ));
    }

    let n = n_values.iter().sum::<f64>() / n_values.len() as f64;
    let b_function = fit_b_function(&pairs, family)?;
    let residual = log_residual(&pairs, &b_function);

    tracing::info!(
        "JMAK 标定完成: n={:.3}, 等温线数={}, 残差={:.3e}",
        n,
        pairs.len(),
        residual
    );

    Ok(JmakFit {
        n,
        b_function,
        isotherm_b_values: pairs,
        residual,
    })
}

/// 分别以高斯与 Arrhenius 拟合, 取对数残差较小者
pub fn select_model_family(
    temperatures: &[f64],
    times: &[f64],
    fractions: &[f64],
) -> EngineResult<JmakFit> {
    let gaussian = fit_jmak_parameters(temperatures, times, fractions, BFunctionFamily::Gaussian)?;
    let arrhenius =
        fit_jmak_parameters(temperatures, times, fractions, BFunctionFamily::Arrhenius)?;

    if arrhenius.residual < gaussian.residual {
        Ok(arrhenius)
    } else {
        Ok(gaussian)
    }
}

/// 单条等温曲线提取 (n, b)
///
/// 仅使用 f ∈ (f_min, f_max) 且 t > 0 的点, 有效点少于 2 个返回 None
pub fn fit_isotherm(times: &[f64], fractions: &[f64], f_min: f64, f_max: f64) -> Option<(f64, f64)> {
    let (x, y): (Vec<f64>, Vec<f64>) = times
        .iter()
        .zip(fractions.iter())
        .filter(|(t, f)| **t > 0.0 && **f > f_min && **f < f_max)
        .map(|(t, f)| (t.ln(), (-(1.0 - f).ln()).ln()))
        .unzip();

    let (slope, intercept) = linear_fit(&x, &y)?;
    Some((slope, intercept.exp()))
}

/// 由 (T, b) 点拟合 b(T)
pub fn fit_b_function(pairs: &[(f64, f64)], family: BFunctionFamily) -> EngineResult<BFunction> {
    let positive: Vec<(f64, f64)> = pairs
        .iter()
        .copied()
        .filter(|(t, b)| t.is_finite() && b.is_finite() && *b > 0.0)
        .collect();
    if positive.is_empty() {
        return Err(EngineError::InsufficientData("没有正的 b 值".to_string()));
    }

    match family {
        BFunctionFamily::Gaussian => Ok(fit_gaussian(&positive)),
        BFunctionFamily::Arrhenius => Ok(fit_arrhenius(&positive)),
        BFunctionFamily::Polynomial => Err(EngineError::InvalidInput(
            "多项式 b(T) 不支持标定".to_string(),
        )),
    }
}

// ==========================================
// 高斯 b(T)
// ==========================================

fn fit_gaussian(pairs: &[(f64, f64)]) -> BFunction {
    let initial = gaussian_initial_guess(pairs);
    let (t_min, t_max) = temperature_span(pairs);
    let bounds = GaussianBounds {
        nose_min: t_min - NOSE_MARGIN,
        nose_max: t_max + NOSE_MARGIN,
    };
    let refined = levenberg_marquardt(pairs, bounds.clamp(initial), &bounds);
    BFunction::Gaussian {
        b_max: refined[0],
        t_nose: refined[1],
        sigma: refined[2],
    }
}

/// 初值: ln b 对 T 二次回归 (ln b = a0 + a1·T + a2·T²), 开口向下时可直接解出参数
fn gaussian_initial_guess(pairs: &[(f64, f64)]) -> [f64; 3] {
    let (t_min, t_max) = temperature_span(pairs);
    let (peak_t, peak_b) = pairs
        .iter()
        .copied()
        .fold((pairs[0].0, f64::NEG_INFINITY), |acc, p| if p.1 > acc.1 { p } else { acc });
    let raw = [peak_b, peak_t, ((t_max - t_min) / 4.0).max(SIGMA_MIN)];

    if pairs.len() < 3 {
        return raw;
    }

    // 以均值中心化温度, 改善法方程条件数
    let t_mean = pairs.iter().map(|p| p.0).sum::<f64>() / pairs.len() as f64;
    let mut ata = Matrix3::<f64>::zeros();
    let mut aty = Vector3::<f64>::zeros();
    for (t, b) in pairs {
        let x = t - t_mean;
        let row = Vector3::new(1.0, x, x * x);
        ata += row * row.transpose();
        aty += row * b.ln();
    }

    match solve_normal_equations(ata, aty).map(|a| (a[0], a[1], a[2])) {
        Some((a0, a1, a2)) if a2 < 0.0 => {
            let sigma = (-1.0 / (2.0 * a2)).sqrt();
            let nose = -a1 / (2.0 * a2);
            let ln_b_max = a0 - a1 * a1 / (4.0 * a2);
            let guess = [ln_b_max.exp(), nose + t_mean, sigma];
            if guess.iter().all(|v| v.is_finite()) {
                guess
            } else {
                raw
            }
        }
        _ => raw,
    }
}

struct GaussianBounds {
    nose_min: f64,
    nose_max: f64,
}

impl GaussianBounds {
    fn clamp(&self, p: [f64; 3]) -> [f64; 3] {
        [
            p[0].max(0.0),
            p[1].clamp(self.nose_min, self.nose_max),
            p[2].clamp(SIGMA_MIN, SIGMA_MAX),
        ]
    }
}

fn gaussian_eval(p: &[f64; 3], t: f64) -> f64 {
    let z = (t - p[1]) / p[2];
    p[0] * (-0.5 * z * z).exp()
}

fn sse(pairs: &[(f64, f64)], p: &[f64; 3]) -> f64 {
    pairs
        .iter()
        .map(|(t, b)| {
            let r = b - gaussian_eval(p, *t);
            r * r
        })
        .sum()
}

/// 带边界截断的 Levenberg-Marquardt (线性空间最小二乘)
fn levenberg_marquardt(pairs: &[(f64, f64)], start: [f64; 3], bounds: &GaussianBounds) -> [f64; 3] {
    let mut p = start;
    let mut current = sse(pairs, &p);
    let mut lambda = 1e-3;

    for _ in 0..LM_MAX_ITERATIONS {
        let mut jtj = Matrix3::<f64>::zeros();
        let mut jtr = Vector3::<f64>::zeros();
        for (t, b) in pairs {
            let z = (t - p[1]) / p[2];
            let e = (-0.5 * z * z).exp();
            let g = p[0] * e;
            let jac = Vector3::new(e, g * z / p[2], g * z * z / p[2]);
            jtj += jac * jac.transpose();
            jtr += jac * (b - g);
        }

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = jtj;
            for i in 0..3 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(f64::MIN_POSITIVE);
            }
            let Some(delta) = solve_normal_equations(damped, jtr) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = bounds.clamp([p[0] + delta[0], p[1] + delta[1], p[2] + delta[2]]);
            let value = sse(pairs, &candidate);
            if value.is_finite() && value < current {
                let gain = current - value;
                p = candidate;
                current = value;
                lambda = (lambda / 10.0).max(1e-12);
                improved = gain > current * 1e-12 && gain > 0.0;
                break;
            }
            lambda *= 10.0;
        }

        if !improved || current == 0.0 {
            break;
        }
    }

    p
}

// ==========================================
// Arrhenius b(T)
// ==========================================

/// ln b = ln b0 - Q/(R·T_K)
fn fit_arrhenius(pairs: &[(f64, f64)]) -> BFunction {
    let (x, y): (Vec<f64>, Vec<f64>) = pairs
        .iter()
        .filter(|(t, _)| t + KELVIN_OFFSET > 0.0)
        .map(|(t, b)| (1.0 / (t + KELVIN_OFFSET), b.ln()))
        .unzip();

    match linear_fit(&x, &y) {
        Some((slope, intercept)) => BFunction::Arrhenius {
            b0: intercept.exp(),
            activation_energy: -slope * GAS_CONSTANT,
        },
        None => {
            tracing::warn!("Arrhenius 拟合点不足, 使用缺省参数");
            BFunction::Arrhenius {
                b0: DEFAULT_ARRHENIUS_B0,
                activation_energy: DEFAULT_ARRHENIUS_Q,
            }
        }
    }
}

// ==========================================
// 数值工具
// ==========================================

/// 按温度分组 (保持升序)
fn group_by_temperature(
    temperatures: &[f64],
    times: &[f64],
    fractions: &[f64],
) -> Vec<(f64, Vec<(f64, f64)>)> {
    let mut groups: Vec<(f64, Vec<(f64, f64)>)> = Vec::new();
    for ((temp, t), f) in temperatures.iter().zip(times).zip(fractions) {
        match groups.iter_mut().find(|(gt, _)| gt == temp) {
            Some((_, points)) => points.push((*t, *f)),
            None => groups.push((*temp, vec![(*t, *f)])),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));
    groups
}

fn temperature_span(pairs: &[(f64, f64)]) -> (f64, f64) {
    pairs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (t, _)| {
        (lo.min(*t), hi.max(*t))
    })
}

/// 最小二乘直线 y = slope·x + intercept
fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// 3×3 法方程 (LU 分解); 奇异或结果非有限时返回 None
fn solve_normal_equations(a: Matrix3<f64>, b: Vector3<f64>) -> Option<Vector3<f64>> {
    a.lu()
        .solve(&b)
        .filter(|x| x.iter().all(|v| v.is_finite()))
}

fn log_residual(pairs: &[(f64, f64)], b_function: &BFunction) -> f64 {
    pairs
        .iter()
        .map(|(t, b)| {
            let predicted = b_function.evaluate(*t);
            if predicted > 0.0 {
                (b.ln() - predicted.ln()).powi(2)
            } else {
                f64::MAX / pairs.len() as f64
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::jmak::JmakModel;

    /// 由已知模型生成无噪声等温数据
    fn synthesize(model: &JmakModel, temps: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut out = (Vec::new(), Vec::new(), Vec::new());
        for &temp in temps {
            for f in [0.05, 0.2, 0.4, 0.6, 0.8, 0.95] {
                let t = model.time_to_fraction(f, temp).unwrap();
                out.0.push(temp);
                out.1.push(t);
                out.2.push(f);
            }
        }
        out
    }

    #[test]
    fn test_recovers_gaussian_parameters() {
        let model = JmakModel::new(
            1.5,
            BFunction::Gaussian {
                b_max: 0.001,
                t_nose: 650.0,
                sigma: 60.0,
            },
            None,
        )
        .unwrap();
        let (temps, times, fractions) = synthesize(&model, &[550.0, 600.0, 650.0, 700.0, 720.0]);

        let fit =
            fit_jmak_parameters(&temps, &times, &fractions, BFunctionFamily::Gaussian).unwrap();
        assert!((fit.n - 1.5).abs() < 1e-6, "n={}", fit.n);
        match fit.b_function {
            BFunction::Gaussian {
                b_max,
                t_nose,
                sigma,
            } => {
                assert!((b_max / 0.001 - 1.0).abs() < 1e-3);
                assert!((t_nose - 650.0).abs() < 0.5);
                assert!((sigma - 60.0).abs() < 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recovers_arrhenius_parameters() {
        let model = JmakModel::new(
            2.0,
            BFunction::Arrhenius {
                b0: 50.0,
                activation_energy: 120_000.0,
            },
            None,
        )
        .unwrap();
        let (temps, times, fractions) = synthesize(&model, &[400.0, 450.0, 500.0, 550.0]);
        let fit =
            fit_jmak_parameters(&temps, &times, &fractions, BFunctionFamily::Arrhenius).unwrap();
        assert!((fit.n - 2.0).abs() < 1e-6);
        match fit.b_function {
            BFunction::Arrhenius {
                activation_energy, ..
            } => assert!((activation_energy / 120_000.0 - 1.0).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_model_family_picks_generating_family() {
        let gaussian = JmakModel::new(
            2.5,
            BFunction::Gaussian {
                b_max: 0.005,
                t_nose: 450.0,
                sigma: 50.0,
            },
            None,
        )
        .unwrap();
        let (temps, times, fractions) = synthesize(&gaussian, &[350.0, 400.0, 450.0, 500.0, 550.0]);
        let fit = select_model_family(&temps, &times, &fractions).unwrap();
        assert_eq!(fit.family(), BFunctionFamily::Gaussian);
        // n 至少与真值同数量级
        assert!(fit.n > 0.25 && fit.n < 25.0);

        let arrhenius = JmakModel::new(
            2.0,
            BFunction::Arrhenius {
                b0: 50.0,
                activation_energy: 120_000.0,
            },
            None,
        )
        .unwrap();
        let (temps, times, fractions) = synthesize(&arrhenius, &[400.0, 450.0, 500.0, 550.0]);
        let fit = select_model_family(&temps, &times, &fractions).unwrap();
        assert_eq!(fit.family(), BFunctionFamily::Arrhenius);
        assert!((fit.n - 2.0).abs() < 1e-6, "n={}", fit.n);
        assert!(fit.residual < 1e-12, "residual={}", fit.residual);
    }

    #[test]
    fn test_singular_normal_equations_rejected() {
        let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert!(solve_normal_equations(singular, Vector3::new(1.0, 2.0, 3.0)).is_none());

        let x = solve_normal_equations(Matrix3::identity() * 2.0, Vector3::new(2.0, 4.0, 6.0))
            .unwrap();
        assert_eq!((x[0], x[1], x[2]), (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_insufficient_data() {
        let err = fit_jmak_parameters(&[600.0], &[10.0], &[0.5], BFunctionFamily::Gaussian)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = fit_jmak_parameters(&[600.0, 600.0], &[10.0], &[0.5], BFunctionFamily::Gaussian)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_fit_isotherm_extracts_n_and_b() {
        let times = [1.0, 2.0, 4.0, 8.0];
        let fractions: Vec<f64> = times.iter().map(|t: &f64| 1.0 - (-0.01 * t.powf(2.0)).exp()).collect();
        let (n, b) = fit_isotherm(&times, &fractions, 0.001, 0.999).unwrap();
        assert!((n - 2.0).abs() < 1e-9);
        assert!((b - 0.01).abs() < 1e-9);
    }
}
