//! Shared helpers for the integration tests: job-details fixtures, a
//! scripted builder double and event-channel utilities.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use assetflow::fingerprint::LockProbe;
use assetflow::{
    AssetBuilder, BuildResult, JobDetails, PipelineEvent, ProcessJobRequest, ProcessJobResponse,
};

/// A nil builder id used by fixtures that never reach a builder.
pub const TEST_BUILDER_ID: Uuid = Uuid::nil();

/// Opt-in log output for debugging a failing test, driven by `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Job details for a source that does not exist on disk, with a zero
/// initial fingerprint so the stability gate settles immediately.
pub fn job_details(source: &str, platform: &str, job_key: &str) -> JobDetails {
    JobDetails {
        source: source.to_string(),
        source_absolute: PathBuf::from("/nonexistent").join(source),
        platform: platform.to_string(),
        job_key: job_key.to_string(),
        builder_id: TEST_BUILDER_ID,
        critical: false,
        priority: -1,
        check_exclusive_lock: false,
        extra_fingerprint_info: String::new(),
        source_dependencies: Vec::new(),
        computed_fingerprint: 0,
        destination_dir: std::env::temp_dir().join("assetflow-tests"),
    }
}

/// Builder double that sleeps, then answers with a fixed result, while
/// recording call and concurrency counts.
pub struct ScriptedBuilder {
    result: BuildResult,
    delay: Duration,
    products: Vec<PathBuf>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedBuilder {
    pub fn new(result: BuildResult) -> Self {
        Self::with_delay(result, Duration::from_millis(10))
    }

    pub fn with_delay(result: BuildResult, delay: Duration) -> Self {
        Self {
            result,
            delay,
            products: Vec::new(),
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_products(mut self, products: Vec<PathBuf>) -> Self {
        self.products = products;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrency_seen(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetBuilder for ScriptedBuilder {
    async fn process_job(&self, _request: ProcessJobRequest) -> ProcessJobResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        ProcessJobResponse {
            result: self.result,
            products: self.products.clone(),
        }
    }
}

/// Lock probe that never grants the lock; pins a job inside the gate.
pub struct NeverLockable;

impl LockProbe for NeverLockable {
    fn can_lock_exclusively(&self, _path: &Path) -> bool {
        false
    }
}

/// Receive the next event or panic after a generous timeout.
pub async fn next_event(events: &mut UnboundedReceiver<PipelineEvent>) -> PipelineEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a pipeline event")
        .expect("event channel closed")
}

/// Skip events until one matches the predicate, returning it.
pub async fn wait_for(
    events: &mut UnboundedReceiver<PipelineEvent>,
    mut predicate: impl FnMut(&PipelineEvent) -> bool,
) -> PipelineEvent {
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}

/// Drain events until the predicate matches, collecting everything seen
/// along the way (the matching event included).
pub async fn collect_until(
    events: &mut UnboundedReceiver<PipelineEvent>,
    mut predicate: impl FnMut(&PipelineEvent) -> bool,
) -> Vec<PipelineEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = predicate(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}
