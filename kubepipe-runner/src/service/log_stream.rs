//! Container log streaming
//!
//! Each followed container gets its own task. The tasks are tracked so the
//! run can wait for them to drain, bounded by a grace period, instead of
//! sleeping for a fixed time.

use futures::StreamExt;
use kubepipe_client::{PlatformError, WorkloadPlatform};
use kubepipe_core::Workload;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Destination for container output
pub trait LogSink: Send + Sync {
    fn write_line(&self, workload: &str, container: &str, line: &str);
}

/// Writes container output to the process stdout, one line per entry
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, _workload: &str, _container: &str, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }
}

/// Follows container logs in background tasks
pub struct LogStreamer {
    platform: Arc<dyn WorkloadPlatform>,
    sink: Arc<dyn LogSink>,
    tasks: Mutex<JoinSet<()>>,
}

impl LogStreamer {
    pub fn new(platform: Arc<dyn WorkloadPlatform>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            platform,
            sink,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Starts one streaming task per container of `workload`
    ///
    /// Must be called from within a tokio runtime.
    pub fn follow(&self, workload: &Workload) {
        let mut tasks = self.tasks.lock().unwrap();

        for container in &workload.containers {
            debug!("Following logs of {} container {}", workload.key(), container);

            let platform = Arc::clone(&self.platform);
            let sink = Arc::clone(&self.sink);
            let namespace = workload.namespace.clone();
            let name = workload.name.clone();
            let container = container.clone();

            tasks.spawn(async move {
                match pump(platform.as_ref(), sink.as_ref(), &namespace, &name, &container).await {
                    Ok(lines) => {
                        debug!("Log stream {}/{} ended after {} line(s)", name, container, lines)
                    }
                    Err(e) => warn!("Log stream {}/{} failed: {}", name, container, e),
                }
            });
        }
    }

    /// Number of streams still running
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap();
        reap(&mut tasks);
        tasks.len()
    }

    /// Waits for every stream to end, aborting whatever is left once
    /// `grace` has elapsed
    ///
    /// Returns the number of streams that had to be aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        if tasks.is_empty() {
            return 0;
        }

        debug!("Draining {} log stream(s)", tasks.len());
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Err(e)) if e.is_panic() => warn!("Log stream task panicked: {}", e),
                    Some(_) => {}
                    None => return 0,
                },
                _ = &mut deadline => {
                    let abandoned = tasks.len();
                    warn!("Abandoning {} log stream(s) still open after {:?}", abandoned, grace);
                    tasks.shutdown().await;
                    return abandoned;
                }
            }
        }
    }

    /// Aborts every stream without waiting for output
    pub fn abort_all(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap();
        reap(&mut tasks);
        let open = tasks.len();
        tasks.abort_all();
        open
    }
}

/// Drops streams that have already ended
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!("Log stream task panicked: {}", e);
            }
        }
    }
}

async fn pump(
    platform: &dyn WorkloadPlatform,
    sink: &dyn LogSink,
    namespace: &str,
    workload: &str,
    container: &str,
) -> Result<usize, PlatformError> {
    let mut lines = platform.stream_logs(namespace, workload, container).await?;
    let mut count = 0;

    while let Some(line) = lines.next().await {
        sink.write_line(workload, container, &line?);
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, MemorySink};

    fn streamer(platform: FakePlatform, sink: Arc<MemorySink>) -> LogStreamer {
        LogStreamer::new(Arc::new(platform), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_streams_every_container() {
        let platform = FakePlatform::new().logs("job1", &["hello", "done"]);
        let sink = Arc::new(MemorySink::default());
        let logs = streamer(platform.clone(), Arc::clone(&sink));

        logs.follow(&Workload::new("job1", "default").with_containers(["main", "sidecar"]));
        assert_eq!(logs.shutdown(Duration::from_secs(5)).await, 0);

        let mut lines = sink.lines();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "job1/main: done",
                "job1/main: hello",
                "job1/sidecar: done",
                "job1/sidecar: hello"
            ]
        );
        assert_eq!(platform.count("logs:job1/"), 2);
        assert_eq!(logs.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_streams_past_grace() {
        let platform = FakePlatform::new()
            .logs("slow", &["tick"])
            .hanging_logs("slow")
            .logs("fast", &["bye"]);
        let sink = Arc::new(MemorySink::default());
        let logs = streamer(platform, Arc::clone(&sink));

        logs.follow(&Workload::new("slow", "default").with_containers(["main"]));
        logs.follow(&Workload::new("fast", "default").with_containers(["main"]));

        let started = tokio::time::Instant::now();
        assert_eq!(logs.shutdown(Duration::from_secs(5)).await, 1);
        assert!(started.elapsed() >= Duration::from_secs(5));

        let lines = sink.lines();
        assert!(lines.contains(&"slow/main: tick".to_string()));
        assert!(lines.contains(&"fast/main: bye".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_without_streams_returns_immediately() {
        let logs = streamer(FakePlatform::new(), Arc::new(MemorySink::default()));
        assert_eq!(logs.shutdown(Duration::from_secs(3600)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_excludes_finished_streams() {
        let platform = FakePlatform::new()
            .logs("done", &["bye"])
            .hanging_logs("open");
        let logs = streamer(platform, Arc::new(MemorySink::default()));

        logs.follow(&Workload::new("done", "default").with_containers(["main"]));
        logs.follow(&Workload::new("open", "default").with_containers(["main"]));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(logs.active(), 1);
        assert_eq!(logs.abort_all(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all_counts_open_streams() {
        let platform = FakePlatform::new().hanging_logs("job1");
        let logs = streamer(platform, Arc::new(MemorySink::default()));

        logs.follow(&Workload::new("job1", "default").with_containers(["a", "b"]));
        assert_eq!(logs.abort_all(), 2);
    }
}
