// ==========================================
// 热处理仿真核心 - 作业队列调度器
// ==========================================
// 职责: 单工作者按 FIFO 认领并执行仿真/焊接作业
// 状态机: queued → running → {completed, failed}
// 红线: 同一时刻至多一个作业处于执行中
// 红线: 所有状态写回均为 compare-and-set, 终态不可回退
// 红线: 作业失败或执行器 panic 不终止工作循环
// 红线: 超时作业在宽限期后被中止, 不阻塞后续作业
// ==========================================

use crate::config::SchedulerConfig;
use crate::domain::job::{JobRef, QueueStatus, QueuedJob};
use crate::domain::types::JobStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::job_repo::JobStore;
use crate::services::runner::{JobResult, RunnerRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// 执行器 panic 时写入的固定错误信息
pub const UNEXPECTED_RUNNER_ERROR: &str = "作业执行器发生未预期错误";

/// 单次调度的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 队列为空
    Idle,
    /// 认领竞争失败, 作业已被他方处理
    Skipped(JobRef),
    /// 作业执行完毕 (含最终状态)
    Finished(JobRef, JobStatus),
}

// ==========================================
// JobScheduler
// ==========================================
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    runners: RunnerRegistry,
    config: SchedulerConfig,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn JobStore>, runners: RunnerRegistry, config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            runners,
            config,
            running: AtomicBool::new(false),
            shutdown_tx,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动工作循环 (幂等)
    ///
    /// # 返回
    /// - true: 本次调用启动了工作者
    /// - false: 工作者已在运行
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("作业队列工作者已在运行，忽略重复启动");
            return false;
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.worker_loop(shutdown_rx).await;
            this.running.store(false, Ordering::SeqCst);
        });

        match self.worker.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(e) => tracing::error!("工作者句柄锁获取失败: {}", e),
        }
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "作业队列工作者已启动"
        );
        true
    }

    /// 发出停止信号并等待当前作业结束
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(e) => {
                tracing::error!("工作者句柄锁获取失败: {}", e);
                None
            }
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("作业队列工作者异常退出: {}", e);
            }
        }
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("作业队列工作者已停止");
    }

    async fn worker_loop(&self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.tick().await {
                Ok(TickOutcome::Idle) => {}
                // 有作业时立即检查下一个
                Ok(_) => continue,
                Err(e) => tracing::error!("作业队列循环异常: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// 认领并执行最早的排队作业
    pub async fn tick(&self) -> RepositoryResult<TickOutcome> {
        let Some(job) = self.store.find_oldest_queued(None)? else {
            return Ok(TickOutcome::Idle);
        };
        let job_ref = job.job_ref;

        if !self.store.try_claim(job_ref)? {
            tracing::debug!("作业 {} 已被认领，跳过", job_ref);
            return Ok(TickOutcome::Skipped(job_ref));
        }

        tracing::info!("开始执行作业: {} ({})", job_ref, job.name);
        let runners = self.runners.clone();
        let mut handle = tokio::spawn(async move { runners.dispatch(job_ref).await });

        let joined = match self.config.max_job_runtime {
            None => handle.await,
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    let message = format!("作业执行超时 (超过 {} 秒)", limit.as_secs());
                    tracing::warn!("作业 {} {}，等待执行器退出", job_ref, message);
                    self.fail_if_active(job_ref, &message);
                    self.reap_overdue(job_ref, handle).await
                }
            },
        };

        self.settle(job_ref, joined);

        let status = self
            .store
            .get(job_ref)?
            .map(|j| j.status)
            .unwrap_or(JobStatus::Failed);
        tracing::info!("作业 {} 执行结束: {}", job_ref, status);
        Ok(TickOutcome::Finished(job_ref, status))
    }

    /// 宽限期内等待超时的执行器; 到期中止并等待任务真正结束后再认领下一个作业
    async fn reap_overdue(
        &self,
        job_ref: JobRef,
        mut handle: JoinHandle<JobResult<()>>,
    ) -> Result<JobResult<()>, JoinError> {
        match tokio::time::timeout(self.config.abort_grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::error!(
                    grace_ms = self.config.abort_grace.as_millis() as u64,
                    "作业 {} 宽限期内未退出，中止执行器",
                    job_ref
                );
                handle.abort();
                handle.await
            }
        }
    }

    /// 根据执行结果写回终态
    fn settle(&self, job_ref: JobRef, joined: Result<JobResult<()>, JoinError>) {
        match joined {
            Ok(Ok(())) => {
                // 执行器通常已自行写回; 此处仅补齐仍处于 running 的作业
                if let Err(e) =
                    self.store
                        .update_status(job_ref, JobStatus::Running, JobStatus::Completed, None)
                {
                    tracing::error!("作业 {} 完成状态写回失败: {}", job_ref, e);
                }
            }
            Ok(Err(e)) => {
                tracing::error!("作业 {} 执行失败: {}", job_ref, e);
                self.fail_if_active(job_ref, &e.to_string());
            }
            Err(e) if e.is_cancelled() => {
                tracing::warn!("作业 {} 执行器已中止", job_ref);
                self.fail_if_active(job_ref, UNEXPECTED_RUNNER_ERROR);
            }
            Err(e) => {
                tracing::error!("作业 {} 执行器异常: {}", job_ref, e);
                self.fail_if_active(job_ref, UNEXPECTED_RUNNER_ERROR);
            }
        }
    }

    fn fail_if_active(&self, job_ref: JobRef, message: &str) {
        let message = if message.trim().is_empty() {
            UNEXPECTED_RUNNER_ERROR
        } else {
            message
        };
        match self.store.mark_failed_if_active(job_ref, message) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("作业 {} 已处于终态，未覆盖", job_ref),
            Err(e) => tracing::error!("作业 {} 失败状态写回失败: {}", job_ref, e),
        }
    }

    /// 队列状态 (每次调用实时查询)
    pub fn get_queue_status(&self) -> RepositoryResult<QueueStatus> {
        let running = self.store.list_by_status(JobStatus::Running)?.into_iter().next();
        let queued = self
            .store
            .list_by_status(JobStatus::Queued)?
            .into_iter()
            .enumerate()
            .map(|(i, job)| QueuedJob {
                job,
                position: i + 1,
            })
            .collect();
        Ok(QueueStatus { running, queued })
    }

    /// 作业的排队位置 (1 起始); 未排队返回 None
    pub fn get_queue_position(&self, job_ref: JobRef) -> RepositoryResult<Option<usize>> {
        Ok(self.get_queue_status()?.position_of(job_ref))
    }
}
