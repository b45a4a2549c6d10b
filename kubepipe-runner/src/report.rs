//! Run reports

use chrono::{DateTime, Utc};
use kubepipe_core::Phase;
use serde::Serialize;
use uuid::Uuid;

/// How one stage ended
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: String,
    pub workload: String,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.phase == Phase::Succeeded
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Summary of a completed pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Workloads that reached Running during the prepare phase
    pub prepared: Vec<String>,
    pub stages: Vec<StageOutcome>,
    /// Log streams cut off by the grace period
    pub abandoned_log_streams: usize,
}

impl PipelineReport {
    /// Stages whose workload ended in a phase other than Succeeded
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageOutcome> {
        self.stages.iter().filter(|outcome| !outcome.succeeded())
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
