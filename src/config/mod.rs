// ==========================================
// 热处理仿真核心 - 配置层
// ==========================================
// 职责: 调度与动力学配置, 缺省值兜底
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, KineticsConfig, SchedulerConfig};
