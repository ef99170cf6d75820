// ==========================================
// 热处理仿真核心 - 临界温度估算
// ==========================================
// 职责: 成分 → Ae1 / Ae3 / Bs / Ms / Mf 经验回归
// 公式: Andrews (Ae1, Ae3, Ms), Steven-Haynes (Bs), Mf = Ms - 215
// 红线: 覆写值原样采用; Mf < Ms 恒成立; 纯函数
// ==========================================

use crate::domain::composition::{Composition, SteelGrade};
use crate::domain::kinetics::{CriticalTemperatureOverrides, CriticalTemperatures};

/// Mf 相对 Ms 的经验偏移 (°C)
pub const MF_OFFSET: f64 = 215.0;
/// Mf 下限 (°C)
pub const MF_FLOOR: f64 = -50.0;
/// Mf 异常时相对 Ms 的最小间隔 (°C)
pub const MF_MIN_GAP: f64 = 10.0;
/// 回归失效时 Ae3 相对 Ae1 的最小间隔 (°C)
pub const AE3_MIN_GAP: f64 = 10.0;

/// 由成分估算临界温度, 覆写字段优先
pub fn estimate(
    composition: &Composition,
    overrides: &CriticalTemperatureOverrides,
) -> CriticalTemperatures {
    let c = composition;

    let ae1 = overrides.ae1.unwrap_or_else(|| calc_ae1(c));
    let ae3 = overrides.ae3.unwrap_or_else(|| {
        let computed = calc_ae3(c);
        // 过共析成分下回归可能落到 Ae1 以下
        if computed > ae1 {
            computed
        } else {
            tracing::warn!(
                "Ae3 回归值 {:.1} 不高于 Ae1 {:.1}, 抬升至 Ae1 + {}",
                computed,
                ae1,
                AE3_MIN_GAP
            );
            ae1 + AE3_MIN_GAP
        }
    });
    let bs = overrides.bs.unwrap_or_else(|| calc_bs(c));
    let ms = overrides.ms.unwrap_or_else(|| calc_ms(c));
    let mf = overrides.mf.unwrap_or_else(|| calc_mf(ms));

    CriticalTemperatures {
        ae1,
        ae3,
        bs,
        ms,
        mf,
    }
}

/// Ae1 = 727 - 10.7Mn - 16.9Ni + 29.1Si + 16.9Cr + 6.38W
pub fn calc_ae1(c: &Composition) -> f64 {
    727.0 - 10.7 * c.mn - 16.9 * c.ni + 29.1 * c.si + 16.9 * c.cr + 6.38 * c.w
}

/// Ae3 = 910 - 203√C - 15.2Ni + 44.7Si + 104V + 31.5Mo + 13.1W
pub fn calc_ae3(c: &Composition) -> f64 {
    910.0 - 203.0 * c.c.max(0.001).sqrt() - 15.2 * c.ni
        + 44.7 * c.si
        + 104.0 * c.v
        + 31.5 * c.mo
        + 13.1 * c.w
}

/// Bs = 830 - 270C - 90Mn - 37Ni - 70Cr - 83Mo
pub fn calc_bs(c: &Composition) -> f64 {
    830.0 - 270.0 * c.c - 90.0 * c.mn - 37.0 * c.ni - 70.0 * c.cr - 83.0 * c.mo
}

/// Ms = 539 - 423C - 30.4Mn - 17.7Ni - 12.1Cr - 7.5Mo - 7.5Si
pub fn calc_ms(c: &Composition) -> f64 {
    539.0 - 423.0 * c.c - 30.4 * c.mn - 17.7 * c.ni - 12.1 * c.cr - 7.5 * c.mo - 7.5 * c.si
}

/// Mf = max(Ms - 215, -50), 且保证 Mf < Ms
pub fn calc_mf(ms: f64) -> f64 {
    let mf = (ms - MF_OFFSET).max(MF_FLOOR);
    if mf < ms {
        mf
    } else {
        ms - MF_MIN_GAP
    }
}

impl SteelGrade {
    /// 有效临界温度 (首次访问时计算并缓存)
    pub fn critical_temperatures(&self) -> CriticalTemperatures {
        *self
            .critical_temps
            .get_or_init(|| estimate(&self.composition, &self.overrides))
    }
}
