// ==========================================
// 热处理仿真核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 红线: 缺失或无法解析的配置回落到默认值, 不阻断调度
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::composition::{Composition, DEFAULT_HOLLOMON_JAFFE_C};
use crate::engine::cct::{default_cooling_rates, CctOptions, DEFAULT_RATE_COUNT};
use crate::engine::scheil::{DEFAULT_FINISH_FRACTION, DEFAULT_START_FRACTION};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认轮询间隔 (ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// 看门狗判定超时后, 等待执行器自行退出的宽限期 (ms)
pub const DEFAULT_ABORT_GRACE_MS: u64 = 5_000;

// ==========================================
// SchedulerConfig - 作业调度配置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// 队列为空时的轮询间隔
    pub poll_interval: Duration,
    /// 单个作业最长运行时间; None 表示不启用看门狗
    pub max_job_runtime: Option<Duration>,
    /// 超时后等待执行器返回的宽限期, 到期即中止执行器任务
    pub abort_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_job_runtime: None,
            abort_grace: Duration::from_millis(DEFAULT_ABORT_GRACE_MS),
        }
    }
}

// ==========================================
// KineticsConfig - 动力学计算配置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KineticsConfig {
    pub start_fraction: f64,
    pub finish_fraction: f64,
    pub austenitizing_temp_c: f64,
    pub cct_end_temp_c: f64,
    /// 成分未给出有效 Hp 时使用
    pub default_hp: f64,
}

impl Default for KineticsConfig {
    fn default() -> Self {
        Self {
            start_fraction: DEFAULT_START_FRACTION,
            finish_fraction: DEFAULT_FINISH_FRACTION,
            austenitizing_temp_c: 900.0,
            cct_end_temp_c: 25.0,
            default_hp: DEFAULT_HOLLOMON_JAFFE_C,
        }
    }
}

impl KineticsConfig {
    /// 成分自带 Hp 优先
    pub fn hollomon_jaffe_constant(&self, composition: &Composition) -> f64 {
        composition
            .hollomon_jaffe_constant()
            .unwrap_or(self.default_hp)
    }

    pub fn cct_options(&self) -> CctOptions {
        CctOptions {
            cooling_rates: default_cooling_rates(DEFAULT_RATE_COUNT),
            austenitizing_temp: self.austenitizing_temp_c,
            end_temp: self.cct_end_temp_c,
            start_fraction: self.start_fraction,
            finish_fraction: self.finish_fraction,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置 (UPSERT)
    pub fn set_global(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析; 缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }

    // ===== 调度配置 =====

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error>> {
        let poll_ms = self.get_parsed_or_default(config_keys::POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS)?;
        let max_runtime_s = self.get_parsed_or_default(config_keys::MAX_JOB_RUNTIME_S, 0u64)?;
        let grace_ms = self.get_parsed_or_default(config_keys::ABORT_GRACE_MS, DEFAULT_ABORT_GRACE_MS)?;

        Ok(SchedulerConfig {
            poll_interval: Duration::from_millis(poll_ms.max(1)),
            max_job_runtime: (max_runtime_s > 0).then(|| Duration::from_secs(max_runtime_s)),
            abort_grace: Duration::from_millis(grace_ms),
        })
    }

    // ===== 动力学配置 =====

    pub fn kinetics_config(&self) -> Result<KineticsConfig, Box<dyn Error>> {
        let defaults = KineticsConfig::default();
        let mut config = KineticsConfig {
            start_fraction: self.get_parsed_or_default(config_keys::START_FRACTION, defaults.start_fraction)?,
            finish_fraction: self.get_parsed_or_default(config_keys::FINISH_FRACTION, defaults.finish_fraction)?,
            austenitizing_temp_c: self
                .get_parsed_or_default(config_keys::AUSTENITIZING_TEMP_C, defaults.austenitizing_temp_c)?,
            cct_end_temp_c: self.get_parsed_or_default(config_keys::CCT_END_TEMP_C, defaults.cct_end_temp_c)?,
            default_hp: self.get_parsed_or_default(config_keys::DEFAULT_HP, defaults.default_hp)?,
        };

        if !(config.start_fraction > 0.0
            && config.start_fraction < config.finish_fraction
            && config.finish_fraction < 1.0)
        {
            tracing::warn!(
                "起止阈值无效 (start={}, finish={})，使用默认值",
                config.start_fraction,
                config.finish_fraction
            );
            config.start_fraction = defaults.start_fraction;
            config.finish_fraction = defaults.finish_fraction;
        }
        if !(config.default_hp > 0.0) {
            config.default_hp = defaults.default_hp;
        }
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 作业队列
    pub const POLL_INTERVAL_MS: &str = "job_queue/poll_interval_ms";
    pub const MAX_JOB_RUNTIME_S: &str = "job_queue/max_job_runtime_s";
    pub const ABORT_GRACE_MS: &str = "job_queue/abort_grace_ms";

    // 动力学
    pub const START_FRACTION: &str = "kinetics/start_fraction";
    pub const FINISH_FRACTION: &str = "kinetics/finish_fraction";
    pub const AUSTENITIZING_TEMP_C: &str = "kinetics/austenitizing_temp_c";
    pub const CCT_END_TEMP_C: &str = "kinetics/cct_end_temp_c";

    // 回火
    pub const DEFAULT_HP: &str = "tempering/default_hp";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let m = manager();
        assert_eq!(m.scheduler_config().unwrap(), SchedulerConfig::default());
        assert_eq!(m.kinetics_config().unwrap(), KineticsConfig::default());
    }

    #[test]
    fn test_set_and_read_scheduler_config() {
        let m = manager();
        m.set_global(config_keys::POLL_INTERVAL_MS, "250").unwrap();
        m.set_global(config_keys::MAX_JOB_RUNTIME_S, "30").unwrap();
        m.set_global(config_keys::ABORT_GRACE_MS, "0").unwrap();
        let cfg = m.scheduler_config().unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.max_job_runtime, Some(Duration::from_secs(30)));
        assert_eq!(cfg.abort_grace, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let m = manager();
        m.set_global(config_keys::POLL_INTERVAL_MS, "fast").unwrap();
        m.set_global(config_keys::START_FRACTION, "0.5").unwrap();
        m.set_global(config_keys::FINISH_FRACTION, "0.2").unwrap();
        assert_eq!(
            m.scheduler_config().unwrap().poll_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        let k = m.kinetics_config().unwrap();
        assert_eq!(k.start_fraction, DEFAULT_START_FRACTION);
        assert_eq!(k.finish_fraction, DEFAULT_FINISH_FRACTION);
    }

    #[test]
    fn test_snapshot_restore() {
        let m = manager();
        m.set_global(config_keys::DEFAULT_HP, "18.5").unwrap();
        let snapshot = m.get_config_snapshot().unwrap();

        let other = manager();
        assert_eq!(other.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(other.kinetics_config().unwrap().default_hp, 18.5);
    }

    #[test]
    fn test_hp_and_cct_options() {
        let k = KineticsConfig {
            default_hp: 18.0,
            ..KineticsConfig::default()
        };
        let mut c = Composition::default();
        assert_eq!(k.hollomon_jaffe_constant(&c), 18.0);
        c.hp = Some(0.0);
        assert_eq!(k.hollomon_jaffe_constant(&c), 18.0);
        c.hp = Some(21.0);
        assert_eq!(k.hollomon_jaffe_constant(&c), 21.0);

        let options = k.cct_options();
        assert_eq!(options.cooling_rates.len(), DEFAULT_RATE_COUNT);
        assert_eq!(options.austenitizing_temp, 900.0);
    }
}
