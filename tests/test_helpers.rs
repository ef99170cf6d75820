// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use heat_treat_core::db::{ensure_schema, open_sqlite_connection};
use heat_treat_core::domain::{
    BFunction, Composition, CoolingPath, JmakParameters, KineticsParameters,
    MartensiteParameters, SimulationCase, SteelGrade, TemperatureRange,
};
use heat_treat_core::domain::types::Phase;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
/// - Arc<Mutex<Connection>>: 已建表的共享连接
pub fn create_test_db() -> Result<(NamedTempFile, String, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path, Arc::new(Mutex::new(conn))))
}

/// AISI 4340 典型成分
pub fn composition_4340() -> Composition {
    Composition {
        c: 0.40,
        mn: 0.70,
        si: 0.25,
        cr: 0.80,
        ni: 1.80,
        mo: 0.25,
        ..Composition::default()
    }
}

pub fn grade_4340() -> SteelGrade {
    SteelGrade::new("AISI 4340", composition_4340())
}

/// 4340 的示例 TTT 动力学参数集 (高斯 b(T))
pub fn kinetics_4340() -> KineticsParameters {
    KineticsParameters {
        jmak: vec![
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
        ],
        martensite: Some(MartensiteParameters {
            ms: 320.0,
            mf: 120.0,
            alpha: 0.011,
        }),
        austenitizing_temperature: Some(900.0),
    }
}

/// 表层急冷 / 心部缓冷两个位置
pub fn quench_paths() -> BTreeMap<String, CoolingPath> {
    let mut paths = BTreeMap::new();
    paths.insert(
        "surface".to_string(),
        CoolingPath::linear(850.0, 25.0, 100.0, 300).expect("valid linear path"),
    );
    paths.insert(
        "center".to_string(),
        CoolingPath::linear(850.0, 25.0, 1.0, 800).expect("valid linear path"),
    );
    paths
}

pub fn case_4340() -> SimulationCase {
    SimulationCase::new(grade_4340(), quench_paths())
}
