// ==========================================
// 热处理仿真核心 - 钢种成分模型
// ==========================================
// 职责: 合金元素质量分数 + 碳当量/淬透性派生指标
// 红线: 成分构造后不可变；缺失元素视为 0，不报错
// ==========================================

use crate::domain::kinetics::{CriticalTemperatureOverrides, CriticalTemperatures};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// 默认 Hollomon-Jaffe 常数
pub const DEFAULT_HOLLOMON_JAFFE_C: f64 = 20.0;

// ==========================================
// Composition - 化学成分 (wt%)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(rename = "C", default)]
    pub c: f64,
    #[serde(rename = "Mn", default)]
    pub mn: f64,
    #[serde(rename = "Si", default)]
    pub si: f64,
    #[serde(rename = "Cr", default)]
    pub cr: f64,
    #[serde(rename = "Ni", default)]
    pub ni: f64,
    #[serde(rename = "Mo", default)]
    pub mo: f64,
    #[serde(rename = "V", default)]
    pub v: f64,
    #[serde(rename = "W", default)]
    pub w: f64,
    #[serde(rename = "Cu", default)]
    pub cu: f64,
    #[serde(rename = "P", default)]
    pub p: f64,
    #[serde(rename = "S", default)]
    pub s: f64,
    #[serde(rename = "N", default)]
    pub n: f64,
    #[serde(rename = "B", default)]
    pub b: f64,

    /// Hollomon-Jaffe 常数 (回火参数); 未给出时由调用方取配置默认值
    #[serde(rename = "Hp", default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<f64>,
}

impl Composition {
    /// 从 元素符号 → wt% 映射构造
    ///
    /// 未知元素符号记录告警后忽略；"Hp" 作为回火常数读取
    pub fn from_weight_percent(map: &HashMap<String, f64>) -> Self {
        let mut comp = Composition::default();
        for (symbol, value) in map {
            let value = if value.is_finite() { *value } else { 0.0 };
            match symbol.trim() {
                "C" => comp.c = value,
                "Mn" => comp.mn = value,
                "Si" => comp.si = value,
                "Cr" => comp.cr = value,
                "Ni" => comp.ni = value,
                "Mo" => comp.mo = value,
                "V" => comp.v = value,
                "W" => comp.w = value,
                "Cu" => comp.cu = value,
                "P" => comp.p = value,
                "S" => comp.s = value,
                "N" => comp.n = value,
                "B" => comp.b = value,
                "Hp" => comp.hp = Some(value),
                other => {
                    tracing::warn!("忽略未知合金元素: {}={}", other, value);
                }
            }
        }
        comp
    }

    /// 转换为 元素符号 → wt% 映射 (导出/报表用)
    pub fn to_weight_percent(&self) -> HashMap<String, f64> {
        [
            ("C", self.c),
            ("Mn", self.mn),
            ("Si", self.si),
            ("Cr", self.cr),
            ("Ni", self.ni),
            ("Mo", self.mo),
            ("V", self.v),
            ("W", self.w),
            ("Cu", self.cu),
            ("P", self.p),
            ("S", self.s),
            ("N", self.n),
            ("B", self.b),
        ]
        .into_iter()
        .chain(self.hp.map(|hp| ("Hp", hp)))
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// 成分自带的有效 Hp (有限且为正)
    pub fn hollomon_jaffe_constant(&self) -> Option<f64> {
        self.hp.filter(|hp| hp.is_finite() && *hp > 0.0)
    }

    /// IIW 碳当量
    ///
    /// CE = C + Mn/6 + (Cr+Mo+V)/5 + (Ni+Cu)/15
    pub fn carbon_equivalent_iiw(&self) -> f64 {
        self.c + self.mn / 6.0 + (self.cr + self.mo + self.v) / 5.0 + (self.ni + self.cu) / 15.0
    }

    /// Ito-Bessyo 焊接裂纹敏感系数 Pcm
    pub fn pcm(&self) -> f64 {
        self.c
            + self.si / 30.0
            + (self.mn + self.cu + self.cr) / 20.0
            + self.ni / 60.0
            + self.mo / 15.0
            + self.v / 10.0
            + 5.0 * self.b
    }

    /// Grossmann 理想临界直径 DI (英寸)
    ///
    /// DI = 0.54·C × Π(1 + kᵢ·wᵢ)
    pub fn ideal_diameter_di(&self) -> f64 {
        let base = 0.54 * self.c.max(0.0);
        let factors = [
            1.0 + 3.3333 * self.mn,
            1.0 + 0.7 * self.si,
            1.0 + 0.363 * self.ni,
            1.0 + 2.16 * self.cr,
            1.0 + 3.0 * self.mo,
            1.0 + 0.365 * self.cu,
            1.0 + 1.73 * self.v,
        ];
        factors.iter().fold(base, |acc, f| acc * f.max(0.0))
    }
}

// ==========================================
// SteelGrade - 钢种
// ==========================================
// 临界温度按需计算并缓存；成分或覆写变化 => 构造新的 SteelGrade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteelGrade {
    pub designation: String,
    pub composition: Composition,
    #[serde(default)]
    pub overrides: CriticalTemperatureOverrides,

    #[serde(skip)]
    pub(crate) critical_temps: OnceLock<CriticalTemperatures>,
}

impl SteelGrade {
    pub fn new(designation: impl Into<String>, composition: Composition) -> Self {
        Self {
            designation: designation.into(),
            composition,
            overrides: CriticalTemperatureOverrides::default(),
            critical_temps: OnceLock::new(),
        }
    }

    /// 返回带人工覆写的新钢种 (缓存随之失效)
    pub fn with_overrides(&self, overrides: CriticalTemperatureOverrides) -> Self {
        Self {
            designation: self.designation.clone(),
            composition: self.composition.clone(),
            overrides,
            critical_temps: OnceLock::new(),
        }
    }
}
