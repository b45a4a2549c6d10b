//! Pipeline controller
//!
//! Top-level entry of a run: load the pipeline file, create the support
//! resources, run the prepare and stage phases, let the logs drain and
//! clear everything the file declares. Teardown runs on every exit path
//! once the file has loaded, including panics.

use chrono::Utc;
use futures::FutureExt;
use kubepipe_client::WorkloadPlatform;
use kubepipe_core::PipelineDefinition;
use kubepipe_spec::DefinitionLoader;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::report::{PipelineReport, StageOutcome};
use crate::scheduler::StageOrchestrator;
use crate::service::{JobWatcher, LogSink, LogStreamer, ResourceManager, StdoutSink};

/// Runs pipeline files end to end against a workload platform
pub struct PipelineController {
    loader: Arc<dyn DefinitionLoader>,
    resources: ResourceManager,
    orchestrator: StageOrchestrator,
    logs: Arc<LogStreamer>,
    config: RunnerConfig,
}

impl PipelineController {
    /// Creates a controller that prints container output to stdout
    pub fn new(
        platform: Arc<dyn WorkloadPlatform>,
        loader: Arc<dyn DefinitionLoader>,
        config: RunnerConfig,
    ) -> Self {
        Self::with_log_sink(platform, loader, config, Arc::new(StdoutSink))
    }

    pub fn with_log_sink(
        platform: Arc<dyn WorkloadPlatform>,
        loader: Arc<dyn DefinitionLoader>,
        config: RunnerConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let logs = Arc::new(LogStreamer::new(Arc::clone(&platform), sink));
        let watcher = Arc::new(JobWatcher::new(
            Arc::clone(&platform),
            Arc::clone(&logs),
            config.watch_retry_interval,
        ));

        Self {
            loader,
            resources: ResourceManager::new(platform, config.cascade),
            orchestrator: StageOrchestrator::new(
                watcher,
                config.prepare_timeout,
                config.stage_timeout,
            ),
            logs,
            config,
        }
    }

    /// Runs the pipeline file at `path`
    ///
    /// Nothing is created, and nothing torn down, when the file fails to
    /// load. Otherwise every declared resource is cleared before this
    /// returns, whether the run succeeded or not.
    pub async fn run(&self, path: &Path) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let definition = self.loader.load(path)?;
        info!(
            "Running pipeline '{}' from {} (run {})",
            definition.pipe.name,
            path.display(),
            run_id
        );
        warn_about_definition(&definition);

        let outcome = AssertUnwindSafe(self.execute(&definition)).catch_unwind().await;

        let abandoned_log_streams = match &outcome {
            Ok(Ok(_)) => self.logs.shutdown(self.config.log_grace_period).await,
            _ => self.logs.abort_all(),
        };

        let summary = self.resources.teardown(&definition).await;
        if summary.failed > 0 {
            warn!("Teardown left {} resource(s) behind", summary.failed);
        }

        let (prepared, stages) = match outcome {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        Ok(PipelineReport {
            run_id,
            pipeline: definition.pipe.name.clone(),
            started_at,
            finished_at: Utc::now(),
            prepared,
            stages,
            abandoned_log_streams,
        })
    }

    async fn execute(
        &self,
        definition: &PipelineDefinition,
    ) -> Result<(Vec<String>, Vec<StageOutcome>)> {
        for service in definition.services.values() {
            self.resources.create_service(service).await?;
        }
        for claim in definition.claims.values() {
            self.resources.create_claim(claim).await?;
        }

        let prepared = self.orchestrator.prepare(definition).await?;
        info!("Prepare complete");

        let stages = self.orchestrator.run_stages(definition).await?;
        info!("Running complete");

        Ok((prepared.into_iter().map(|w| w.name).collect(), stages))
    }
}

fn warn_about_definition(definition: &PipelineDefinition) {
    for name in definition.unresolved_names() {
        warn!("'{}' is not defined in the pipeline file and will be skipped", name);
    }

    for stage in &definition.pipe.stages {
        let ignored = stage.ignored_jobs();
        if !ignored.is_empty() {
            warn!(
                "Stage '{}' lists {} extra job(s) that will not run: {}",
                stage.name,
                ignored.len(),
                ignored.join(", ")
            );
        }
    }

    for var in &definition.pipe.env {
        debug!("Pipeline env {}={}", var.name, var.value);
    }
}
