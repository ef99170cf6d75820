// ==========================================
// 热处理仿真核心 - 热处理仿真执行器
// ==========================================
// 流程: 读取工况 → (阻塞线程) 相组成 + 硬度预测 → 结果与 completed 同步写回
// 失败: 写回 failed + 错误信息, 并向调度器返回 Err
// ==========================================

use crate::config::KineticsConfig;
use crate::domain::hardness::HardnessResult;
use crate::domain::job::{JobRef, SimulationId};
use crate::engine::hardness::predict_profile_with;
use crate::engine::phase_predictor::PhasePredictor;
use crate::repository::job_repo::JobStore;
use crate::repository::simulation_repo::SimulationRepository;
use crate::services::runner::{JobResult, JobRunner};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub struct HeatTreatmentRunner {
    store: Arc<dyn JobStore>,
    simulations: Arc<SimulationRepository>,
    kinetics_config: KineticsConfig,
}

impl HeatTreatmentRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        simulations: Arc<SimulationRepository>,
        kinetics_config: KineticsConfig,
    ) -> Self {
        Self {
            store,
            simulations,
            kinetics_config,
        }
    }

    async fn simulate(&self, id: SimulationId) -> JobResult<HardnessResult> {
        let case = self.simulations.load_case(id)?;
        let config = self.kinetics_config;

        let result = tokio::task::spawn_blocking(move || {
            let predictor = PhasePredictor::new(&case.grade, case.kinetics.as_ref())
                .with_thresholds(config.start_fraction, config.finish_fraction);
            tracing::debug!("钢种 {} 预测层级: {}", case.grade.designation, predictor.tier());
            let hp = config.hollomon_jaffe_constant(&case.grade.composition);
            predict_profile_with(
                &predictor,
                &case.grade,
                &case.cooling_paths,
                case.tempering,
                hp,
            )
        })
        .await??;

        Ok(result)
    }
}

#[async_trait]
impl JobRunner<SimulationId> for HeatTreatmentRunner {
    async fn run(&self, id: SimulationId) -> JobResult<()> {
        let job_ref = JobRef::from(id);
        let started = Instant::now();

        match self.simulate(id).await {
            Ok(result) => {
                if self.simulations.complete_with_result(id, &result)? {
                    tracing::info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "热处理仿真完成: {} (位置数={})",
                        job_ref,
                        result.hardness_hv.len()
                    );
                } else {
                    tracing::warn!("热处理仿真 {} 已不处于执行中，结果已丢弃", job_ref);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!("热处理仿真失败: {}: {}", job_ref, e);
                self.store.mark_failed_if_active(job_ref, &e.to_string())?;
                Err(e)
            }
        }
    }
}
