//! Run-until-phase
//!
//! Creates a workload and follows it through a label-selected watch until it
//! reports one of the target phases. The deadline covers the whole wait,
//! including watch retries and reconnects.

use futures::StreamExt;
use kubepipe_client::{EventStream, WorkloadPlatform};
use kubepipe_core::{LabelSelector, Phase, PhaseSet, ResourceKind, Workload};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{Result, RunError};
use crate::service::LogStreamer;

/// Drives single workloads to a target phase
pub struct JobWatcher {
    platform: Arc<dyn WorkloadPlatform>,
    logs: Arc<LogStreamer>,
    retry_interval: Duration,
}

impl JobWatcher {
    pub fn new(
        platform: Arc<dyn WorkloadPlatform>,
        logs: Arc<LogStreamer>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            platform,
            logs,
            retry_interval,
        }
    }

    /// Creates `workload` and waits until it reports a phase in `targets`
    ///
    /// Returns the snapshot that matched. With `stream_logs` set, container
    /// logs are followed from the first event whose phase is not Pending.
    pub async fn run_until_phase(
        &self,
        workload: &Workload,
        targets: &PhaseSet,
        timeout: Duration,
        stream_logs: bool,
    ) -> Result<Workload> {
        self.create(workload).await?;
        self.await_phase(workload, targets, timeout, stream_logs).await
    }

    /// Submits `workload` to the platform
    pub async fn create(&self, workload: &Workload) -> Result<()> {
        info!("Creating workload {}", workload.key());
        self.platform
            .create_workload(workload)
            .await
            .map_err(|source| RunError::Create {
                kind: ResourceKind::Workload,
                name: workload.key(),
                source,
            })?;
        Ok(())
    }

    /// Watches an already created `workload` until it reports a phase in
    /// `targets`
    ///
    /// Watch attempts, including reconnects after a stream ends, are spaced
    /// by the retry interval. Only the first attempt is immediate.
    pub async fn await_phase(
        &self,
        workload: &Workload,
        targets: &PhaseSet,
        timeout: Duration,
        stream_logs: bool,
    ) -> Result<Workload> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let selector = workload.selector();
        let mut logs_opened = false;

        loop {
            let mut events = tokio::select! {
                events = self.open_watch(workload, &selector, &mut ticker) => events,
                _ = &mut deadline => return Err(timed_out(workload)),
            };
            debug!("Watching {} for {}", workload.key(), targets);

            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(Ok(event)) => {
                            let Some(observed) = event.into_workload() else {
                                continue;
                            };
                            debug!("Workload {} is {}", observed.key(), observed.phase);

                            if stream_logs && !logs_opened && observed.phase != Phase::Pending {
                                logs_opened = true;
                                self.logs.follow(&observed);
                            }

                            if targets.contains(observed.phase) {
                                return Ok(observed);
                            }
                        }
                        Some(Err(e)) => {
                            debug!("Ignoring watch error for {}: {}", workload.key(), e)
                        }
                        None => {
                            debug!("Watch for {} ended, reconnecting", workload.key());
                            break;
                        }
                    },
                    _ = &mut deadline => return Err(timed_out(workload)),
                }
            }
        }
    }

    /// Opens a watch on the next tick of `ticker`, retrying until one succeeds
    async fn open_watch(
        &self,
        workload: &Workload,
        selector: &LabelSelector,
        ticker: &mut Interval,
    ) -> EventStream {
        loop {
            ticker.tick().await;
            match self
                .platform
                .watch_workloads(&workload.namespace, selector)
                .await
            {
                Ok(events) => return events,
                Err(e) => debug!(
                    "Failed to watch {}: {}; retrying in {:?}",
                    workload.key(),
                    e,
                    self.retry_interval
                ),
            }
        }
    }
}

fn timed_out(workload: &Workload) -> RunError {
    RunError::Timeout {
        workload: workload.key(),
    }
}
