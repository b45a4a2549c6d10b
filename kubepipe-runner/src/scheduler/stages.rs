//! Prepare and stage phases
//!
//! Prepare starts every workload the pipe lists under `service` and waits
//! until they are all Running. Stages then run strictly one after another, each
//! waiting for its workload to finish before the next is created.

use chrono::Utc;
use futures::future::join_all;
use kubepipe_core::{PhaseSet, PipelineDefinition, Workload};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{Result, RunError};
use crate::report::StageOutcome;
use crate::scheduler::TaskChain;
use crate::service::JobWatcher;

/// Runs the prepare and stage phases of a pipeline
pub struct StageOrchestrator {
    watcher: Arc<JobWatcher>,
    prepare_timeout: Duration,
    stage_timeout: Duration,
}

impl StageOrchestrator {
    pub fn new(
        watcher: Arc<JobWatcher>,
        prepare_timeout: Duration,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            watcher,
            prepare_timeout,
            stage_timeout,
        }
    }

    /// Starts every prepare workload concurrently and waits for all of them
    ///
    /// All creates settle before any error is returned, so teardown never
    /// races a create that is still in flight. After that the first failed
    /// wait is returned as soon as it happens and the remaining waits are
    /// left to finish in the background.
    pub async fn prepare(&self, definition: &PipelineDefinition) -> Result<Vec<Workload>> {
        let targets = definition.prepare_targets();
        if targets.is_empty() {
            debug!("No prepare workloads");
            return Ok(Vec::new());
        }

        info!("Preparing {} workload(s)", targets.len());
        let created = join_all(targets.iter().map(|workload| self.watcher.create(workload))).await;
        if let Some(e) = created.into_iter().find_map(|result| result.err()) {
            error!("Prepare failed: {}", e);
            return Err(e);
        }

        let mut tasks = JoinSet::new();
        for workload in &targets {
            let watcher = Arc::clone(&self.watcher);
            let workload = (*workload).clone();
            let timeout = self.prepare_timeout;

            tasks.spawn(async move {
                watcher
                    .await_phase(&workload, &PhaseSet::running(), timeout, false)
                    .await
            });
        }

        let mut ready = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(RunError::from).and_then(|result| result);
            match result {
                Ok(workload) => {
                    info!("Workload {} is running", workload.key());
                    ready.push(workload);
                }
                Err(e) => {
                    error!("Prepare failed: {}", e);
                    tasks.detach_all();
                    return Err(e);
                }
            }
        }

        Ok(ready)
    }

    /// Runs each stage's first job to completion, in declaration order
    ///
    /// Stages whose job is not defined in the pipeline file are skipped.
    /// A failing stage does not stop later stages from running; the first
    /// error is returned once the chain has finished.
    pub async fn run_stages(&self, definition: &PipelineDefinition) -> Result<Vec<StageOutcome>> {
        let mut chain = TaskChain::completed(Vec::new());

        for stage in &definition.pipe.stages {
            let Some(workload) = definition.stage_target(stage) else {
                debug!("Stage '{}' has no runnable job, skipping", stage.name);
                continue;
            };

            let watcher = Arc::clone(&self.watcher);
            let workload = workload.clone();
            let stage_name = stage.name.clone();
            let timeout = self.stage_timeout;

            chain = chain.then(&stage.name, move |settled: Result<Vec<StageOutcome>>| async move {
                info!("Starting stage '{}' ({})", stage_name, workload.key());
                let started_at = Utc::now();
                let finished = watcher
                    .run_until_phase(&workload, &PhaseSet::finished(), timeout, true)
                    .await;

                match &finished {
                    Ok(done) => info!("Stage '{}' finished: {}", stage_name, done.phase),
                    Err(e) => error!("Stage '{}' failed: {}", stage_name, e),
                }

                let mut outcomes = settled?;
                let done = finished?;
                outcomes.push(StageOutcome {
                    stage: stage_name,
                    workload: done.name,
                    phase: done.phase,
                    started_at,
                    finished_at: Utc::now(),
                });
                Ok::<_, RunError>(outcomes)
            })?;
        }

        chain.wait().await
    }
}
