//! In-memory workload platform for engine tests
//!
//! Every call is recorded in a journal so tests can assert on ordering.
//! Watches replay scripted phase changes on the tokio clock, which lets
//! tests run with paused time.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use kubepipe_client::{
    EventStream, LogLines, PlatformError, Result, WorkloadEvent, WorkloadPlatform,
};
use kubepipe_core::{
    CascadePolicy, LabelSelector, NAME_LABEL, Phase, SupportService, VolumeClaim, Workload,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::service::LogSink;

/// One scripted item delivered by a fake watch
#[derive(Debug, Clone)]
pub enum Step {
    /// Waits, then reports the workload in `phase`
    After(Duration, Phase),
    Bookmark,
    /// An error item inside the watch stream
    WatchError,
}

pub fn after(secs: u64, phase: Phase) -> Step {
    Step::After(Duration::from_secs(secs), phase)
}

#[derive(Debug, Clone)]
struct WatchScript {
    steps: Vec<Step>,
    /// End the stream after the last step instead of idling
    close: bool,
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<String, VecDeque<WatchScript>>,
    watch_failures: HashMap<String, usize>,
    fail_create: HashSet<String>,
    create_delays: HashMap<String, Duration>,
    fail_delete: HashSet<String>,
    hanging_logs: HashSet<String>,
    logs: HashMap<String, Vec<String>>,
    live: HashMap<String, Workload>,
    services: HashSet<String>,
    claims: HashSet<String>,
    journal: Vec<String>,
}

/// Scriptable platform double
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a watch script that idles after its last step
    pub fn script(self, name: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.push_script(name, steps, false)
    }

    /// Adds a watch script whose stream ends after its last step
    pub fn closing_script(self, name: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.push_script(name, steps, true)
    }

    fn push_script(self, name: &str, steps: impl IntoIterator<Item = Step>, close: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(name.to_string())
            .or_default()
            .push_back(WatchScript {
                steps: steps.into_iter().collect(),
                close,
            });
        self
    }

    /// Makes the first `count` watch attempts for `name` fail
    pub fn failing_watches(self, name: &str, count: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .watch_failures
            .insert(name.to_string(), count);
        self
    }

    /// Rejects creation of any resource called `name`
    pub fn failing_create(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_create.insert(name.to_string());
        self
    }

    /// Workload `name` takes `secs` to be accepted by the platform
    pub fn slow_create(self, name: &str, secs: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .create_delays
            .insert(name.to_string(), Duration::from_secs(secs));
        self
    }

    /// Rejects deletion of any resource called `name`
    pub fn failing_delete(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_delete.insert(name.to_string());
        self
    }

    /// Lines every container of workload `name` prints
    pub fn logs(self, name: &str, lines: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert(name.to_string(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Log streams of workload `name` never end
    pub fn hanging_logs(self, name: &str) -> Self {
        self.state.lock().unwrap().hanging_logs.insert(name.to_string());
        self
    }

    /// Pre-creates a resource as if a previous run left it behind
    pub fn existing_service(self, name: &str) -> Self {
        self.state.lock().unwrap().services.insert(name.to_string());
        self
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Index of `entry` in the journal
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.journal().iter().position(|e| e == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.journal().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Names of resources that still exist, of any kind
    pub fn live_resources(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.live.len() + state.services.len() + state.claims.len()
    }

    fn record(&self, entry: String) {
        self.state.lock().unwrap().journal.push(entry);
    }
}

fn rejected(name: &str) -> PlatformError {
    PlatformError::api_error(500, format!("{} rejected", name))
}

#[async_trait]
impl WorkloadPlatform for FakePlatform {
    async fn create_workload(&self, workload: &Workload) -> Result<Workload> {
        let delay = self.state.lock().unwrap().create_delays.get(&workload.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.record(format!("create:workload:{}", workload.name));
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(&workload.name) {
            return Err(rejected(&workload.name));
        }
        if state.live.contains_key(&workload.name) {
            return Err(PlatformError::api_error(409, "already exists"));
        }
        state.live.insert(workload.name.clone(), workload.clone());
        Ok(workload.clone())
    }

    async fn create_service(&self, service: &SupportService) -> Result<()> {
        self.record(format!("create:service:{}", service.name));
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(&service.name) {
            return Err(rejected(&service.name));
        }
        if !state.services.insert(service.name.clone()) {
            return Err(PlatformError::api_error(409, "already exists"));
        }
        Ok(())
    }

    async fn create_claim(&self, claim: &VolumeClaim) -> Result<()> {
        self.record(format!("create:claim:{}", claim.name));
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(&claim.name) {
            return Err(rejected(&claim.name));
        }
        if !state.claims.insert(claim.name.clone()) {
            return Err(PlatformError::api_error(409, "already exists"));
        }
        Ok(())
    }

    async fn watch_workloads(
        &self,
        _namespace: &str,
        selector: &LabelSelector,
    ) -> Result<EventStream> {
        let name = selector.get(NAME_LABEL).unwrap_or_default().to_string();

        let (script, base) = {
            let mut state = self.state.lock().unwrap();
            if let Some(remaining) = state.watch_failures.get_mut(&name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    state.journal.push(format!("watch-failed:{}", name));
                    return Err(PlatformError::api_error(503, "watch unavailable"));
                }
            }
            state.journal.push(format!("watch:{}", name));

            let base = state
                .live
                .get(&name)
                .cloned()
                .unwrap_or_else(|| Workload::new(name.clone(), "default"));
            let script = state
                .scripts
                .get_mut(&name)
                .and_then(VecDeque::pop_front)
                .unwrap_or(WatchScript {
                    steps: Vec::new(),
                    close: false,
                });
            (script, base)
        };

        let state = Arc::clone(&self.state);
        let events = stream::iter(script.steps).then(move |step| {
            let state = Arc::clone(&state);
            let base = base.clone();
            async move {
                match step {
                    Step::After(delay, phase) => {
                        tokio::time::sleep(delay).await;
                        state
                            .lock()
                            .unwrap()
                            .journal
                            .push(format!("emit:{}:{}", base.name, phase));
                        Ok(WorkloadEvent::Modified(base.with_phase(phase)))
                    }
                    Step::Bookmark => Ok(WorkloadEvent::Bookmark),
                    Step::WatchError => Err(PlatformError::api_error(500, "watch broke")),
                }
            }
        });

        if script.close {
            Ok(events.boxed())
        } else {
            Ok(events.chain(stream::pending()).boxed())
        }
    }

    async fn delete_workload(
        &self,
        _namespace: &str,
        name: &str,
        _cascade: CascadePolicy,
    ) -> Result<()> {
        self.record(format!("delete:workload:{}", name));
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(name) {
            return Err(rejected(name));
        }
        state
            .live
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(format!("pod {}", name)))
    }

    async fn delete_service(
        &self,
        _namespace: &str,
        name: &str,
        _cascade: CascadePolicy,
    ) -> Result<()> {
        self.record(format!("delete:service:{}", name));
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(name) {
            return Err(rejected(name));
        }
        if state.services.remove(name) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("service {}", name)))
        }
    }

    async fn delete_claim(
        &self,
        _namespace: &str,
        name: &str,
        _cascade: CascadePolicy,
    ) -> Result<()> {
        self.record(format!("delete:claim:{}", name));
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(name) {
            return Err(rejected(name));
        }
        if state.claims.remove(name) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("claim {}", name)))
        }
    }

    async fn stream_logs(
        &self,
        _namespace: &str,
        workload: &str,
        container: &str,
    ) -> Result<LogLines> {
        self.record(format!("logs:{}/{}", workload, container));
        let state = self.state.lock().unwrap();
        let lines: Vec<Result<String>> = state
            .logs
            .get(workload)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(Ok)
            .collect();

        if state.hanging_logs.contains(workload) {
            Ok(stream::iter(lines).chain(stream::pending()).boxed())
        } else {
            Ok(stream::iter(lines).boxed())
        }
    }
}

/// Sink that keeps every line as `workload/container: line`
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, workload: &str, container: &str, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{}/{}: {}", workload, container, line));
    }
}
