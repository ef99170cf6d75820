// ==========================================
// 热处理仿真核心 - 仿真工况/结果仓储
// ==========================================
// 职责: simulation.case_json 读取, simulation.result_json 写入
// 红线: 结果仅在 running → completed 的同一条 CAS 中写入;
//       已被判定失败的作业不会留下结果
// ==========================================

use crate::domain::hardness::HardnessResult;
use crate::db::format_timestamp;
use crate::domain::job::SimulationId;
use crate::domain::simulation::SimulationCase;
use crate::domain::types::JobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct SimulationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SimulationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn not_found(id: SimulationId) -> RepositoryError {
        RepositoryError::NotFound {
            entity: "simulation".to_string(),
            id: id.0.to_string(),
        }
    }

    /// 读取仿真工况
    pub fn load_case(&self, id: SimulationId) -> RepositoryResult<SimulationCase> {
        let conn = self.get_conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT case_json FROM simulation WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;

        let json = raw
            .ok_or_else(|| Self::not_found(id))?
            .ok_or_else(|| RepositoryError::FieldValueError {
                field: "case_json".to_string(),
                message: format!("仿真 {} 未提供工况", id.0),
            })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// 写入/覆盖仿真工况
    pub fn save_case(&self, id: SimulationId, case: &SimulationCase) -> RepositoryResult<()> {
        let json = serde_json::to_string(case)?;
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE simulation SET case_json = ?1 WHERE id = ?2",
            params![json, id.0],
        )?;
        if changed == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    /// 保存结果并置为 completed (compare-and-set)
    ///
    /// # 返回
    /// - true: 作业仍在执行中, 结果已写入
    /// - false: 作业已不处于 running (如看门狗已判定超时), 结果丢弃
    pub fn complete_with_result(
        &self,
        id: SimulationId,
        result: &HardnessResult,
    ) -> RepositoryResult<bool> {
        let json = serde_json::to_string(result)?;
        let now = format_timestamp(&Utc::now());
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE simulation
            SET result_json = ?1, status = ?2, completed_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
            params![
                json,
                JobStatus::Completed.to_db_str(),
                now,
                id.0,
                JobStatus::Running.to_db_str()
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn load_result(&self, id: SimulationId) -> RepositoryResult<Option<HardnessResult>> {
        let conn = self.get_conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT result_json FROM simulation WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;

        match raw.ok_or_else(|| Self::not_found(id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
