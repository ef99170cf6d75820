// ==========================================
// 热处理仿真核心 - 作业存储
// ==========================================
// 职责:
// 1) 跨 simulation / weld_project 两张表的统一作业视图
// 2) FIFO 查询: (created_at, 类型 rank, id)
// 3) 状态变更一律 compare-and-set, 防止重复认领与终态回退
// 红线: Repository 不含调度逻辑, 不删除作业
// ==========================================

use crate::db::{format_timestamp, open_sqlite_connection, parse_timestamp};
use crate::domain::job::{Job, JobRef, SimulationId, WeldProjectId};
use crate::domain::types::{JobKind, JobStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// JobStore Trait
// ==========================================
pub trait JobStore: Send + Sync {
    /// 最早的排队作业; kind 为 None 时跨类型比较
    fn find_oldest_queued(&self, kind: Option<JobKind>) -> RepositoryResult<Option<Job>>;

    /// compare-and-set 状态变更
    ///
    /// # 返回
    /// - Ok(true): 作业原状态为 expected, 已改为 new_status
    /// - Ok(false): 状态已被他方改变 (或作业不存在), 未做修改
    fn update_status(
        &self,
        job: JobRef,
        expected: JobStatus,
        new_status: JobStatus,
        error_message: Option<&str>,
    ) -> RepositoryResult<bool>;

    /// 按状态列出作业, FIFO 顺序
    fn list_by_status(&self, status: JobStatus) -> RepositoryResult<Vec<Job>>;

    fn get(&self, job: JobRef) -> RepositoryResult<Option<Job>>;

    /// 兜底失败: 仅当作业仍处于 queued / running 时置为 failed
    fn mark_failed_if_active(&self, job: JobRef, message: &str) -> RepositoryResult<bool>;

    /// 认领: queued → running
    fn try_claim(&self, job: JobRef) -> RepositoryResult<bool> {
        self.update_status(job, JobStatus::Queued, JobStatus::Running, None)
    }
}

/// 同时间戳下的类型 rank
fn kind_rank(kind: JobKind) -> i64 {
    match kind {
        JobKind::Simulation => 0,
        JobKind::WeldProject => 1,
    }
}

fn kind_from_rank(rank: i64) -> Option<JobKind> {
    JobKind::ALL.into_iter().find(|k| kind_rank(*k) == rank)
}

const JOB_COLUMNS: &str = "id, name, status, created_at, started_at, completed_at, error_message";

fn kind_select(kind: JobKind) -> String {
    format!(
        "SELECT {rank} AS kind_rank, {cols} FROM {table} WHERE status = ?1",
        rank = kind_rank(kind),
        cols = JOB_COLUMNS,
        table = kind.table_name()
    )
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("无法解析时间戳: {}", s))),
    }
}

/// 行映射; offset 为 id 列所在下标
fn map_job(row: &Row<'_>, kind: JobKind, offset: usize) -> rusqlite::Result<Job> {
    let status_raw: String = row.get(offset + 2)?;
    let status = JobStatus::from_str(&status_raw)
        .ok_or_else(|| conversion_error(offset + 2, format!("未知作业状态: {}", status_raw)))?;
    let created_at = read_timestamp(row, offset + 3)?
        .ok_or_else(|| conversion_error(offset + 3, "created_at 为空".to_string()))?;

    Ok(Job {
        job_ref: JobRef::from_parts(kind, row.get(offset)?),
        name: row.get(offset + 1)?,
        status,
        created_at,
        started_at: read_timestamp(row, offset + 4)?,
        completed_at: read_timestamp(row, offset + 5)?,
        error_message: row.get(offset + 6)?,
    })
}

fn map_ranked_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let rank: i64 = row.get(0)?;
    let kind =
        kind_from_rank(rank).ok_or_else(|| conversion_error(0, format!("未知作业类型: {}", rank)))?;
    map_job(row, kind, 1)
}

// ==========================================
// SqliteJobStore
// ==========================================
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开独立连接 (需已执行 ensure_schema)
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建排队作业 (供宿主/测试使用)
    pub fn enqueue(
        &self,
        kind: JobKind,
        name: &str,
        case_json: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<JobRef> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, status, case_json, created_at) VALUES (?1, 'queued', ?2, ?3)",
                kind.table_name()
            ),
            params![name, case_json, format_timestamp(&created_at)],
        )?;
        let job_ref = JobRef::from_parts(kind, conn.last_insert_rowid());
        tracing::info!("作业已加入队列: {}", job_ref);
        Ok(job_ref)
    }

    pub fn enqueue_simulation(&self, name: &str, case_json: Option<&str>) -> RepositoryResult<SimulationId> {
        match self.enqueue(JobKind::Simulation, name, case_json, Utc::now())? {
            JobRef::Simulation(id) => Ok(id),
            other => Err(RepositoryError::InternalError(format!("作业类型不符: {}", other))),
        }
    }

    pub fn enqueue_weld_project(&self, name: &str) -> RepositoryResult<WeldProjectId> {
        match self.enqueue(JobKind::WeldProject, name, None, Utc::now())? {
            JobRef::WeldProject(id) => Ok(id),
            other => Err(RepositoryError::InternalError(format!("作业类型不符: {}", other))),
        }
    }

    fn query_by_status(
        &self,
        status: JobStatus,
        kind: Option<JobKind>,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<Job>> {
        let kinds: Vec<JobKind> = match kind {
            Some(k) => vec![k],
            None => JobKind::ALL.to_vec(),
        };
        let union = kinds
            .iter()
            .map(|k| kind_select(*k))
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let mut sql = format!("{} ORDER BY created_at ASC, kind_rank ASC, id ASC", union);
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.to_db_str()], map_ranked_job)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }
}

impl JobStore for SqliteJobStore {
    fn find_oldest_queued(&self, kind: Option<JobKind>) -> RepositoryResult<Option<Job>> {
        Ok(self
            .query_by_status(JobStatus::Queued, kind, Some(1))?
            .into_iter()
            .next())
    }

    fn update_status(
        &self,
        job: JobRef,
        expected: JobStatus,
        new_status: JobStatus,
        error_message: Option<&str>,
    ) -> RepositoryResult<bool> {
        if !expected.can_transition_to(new_status) {
            return Err(RepositoryError::InvalidStateTransition {
                from: expected,
                to: new_status,
            });
        }

        let now = format_timestamp(&Utc::now());
        let conn = self.get_conn()?;
        let changed = conn.execute(
            &format!(
                r#"
                UPDATE {table}
                SET status = ?1,
                    error_message = COALESCE(?2, error_message),
                    started_at = CASE WHEN ?1 = 'running' THEN ?3 ELSE started_at END,
                    completed_at = CASE WHEN ?1 IN ('completed', 'failed') THEN ?3 ELSE completed_at END
                WHERE id = ?4 AND status = ?5
                "#,
                table = job.kind().table_name()
            ),
            params![
                new_status.to_db_str(),
                error_message,
                now,
                job.row_id(),
                expected.to_db_str()
            ],
        )?;

        if changed == 0 {
            tracing::debug!("状态变更未生效 (CAS 失败): {} {} → {}", job, expected, new_status);
        }
        Ok(changed == 1)
    }

    fn list_by_status(&self, status: JobStatus) -> RepositoryResult<Vec<Job>> {
        self.query_by_status(status, None, None)
    }

    fn get(&self, job: JobRef) -> RepositoryResult<Option<Job>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    JOB_COLUMNS,
                    job.kind().table_name()
                ),
                params![job.row_id()],
                |row| map_job(row, job.kind(), 0),
            )
            .optional()?;
        Ok(found)
    }

    fn mark_failed_if_active(&self, job: JobRef, message: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            &format!(
                r#"
                UPDATE {}
                SET status = 'failed', error_message = ?1, completed_at = ?2
                WHERE id = ?3 AND status IN ('queued', 'running')
                "#,
                job.kind().table_name()
            ),
            params![message, format_timestamp(&Utc::now()), job.row_id()],
        )?;
        Ok(changed == 1)
    }
}
