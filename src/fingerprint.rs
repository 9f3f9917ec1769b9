use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::GateConfig;
use crate::scheduler::JobDetails;

/// Fingerprint of one file: CRC32 over the builder's extra fingerprint
/// info and the file's last-modified time. Zero means the file does not
/// exist.
pub fn base_fingerprint(path: &Path, extra_info: &str) -> u32 {
    let Ok(metadata) = std::fs::metadata(path) else {
        return 0;
    };
    let Ok(modified) = metadata.modified() else {
        return 0;
    };
    let modified_ms = DateTime::<Utc>::from(modified).timestamp_millis();

    let mut hasher = crc32fast::Hasher::new_with_initial(extra_info.len() as u32);
    hasher.update(extra_info.as_bytes());
    hasher.update(&modified_ms.to_le_bytes());
    hasher.finalize()
}

/// Fingerprint of a whole job: the primary source's base fingerprint
/// folded with the base fingerprint of every declared dependency, so a
/// mtime change anywhere in the input set changes the result. Zero when
/// the primary source is missing.
pub fn job_fingerprint(details: &JobDetails) -> u32 {
    let mut fingerprint =
        base_fingerprint(&details.source_absolute, &details.extra_fingerprint_info);
    if fingerprint == 0 {
        return 0;
    }

    for dependency in &details.source_dependencies {
        let dependency_fingerprint = base_fingerprint(dependency, "");
        if dependency_fingerprint != 0 {
            let mut hasher = crc32fast::Hasher::new_with_initial(fingerprint);
            hasher.update(&dependency_fingerprint.to_le_bytes());
            fingerprint = hasher.finalize();
        }
    }
    fingerprint
}

/// Can the source file be opened with no other writer attached?
///
/// Abstracted behind a trait so gate behavior is testable without racing
/// real file handles.
pub trait LockProbe: Send + Sync {
    fn can_lock_exclusively(&self, path: &Path) -> bool;
}

/// Real probe: try to open the file for read+write. On Windows this fails
/// while another process holds a write handle; on Unix it approximates the
/// same signal for the writers we care about (tools that hold files open
/// while flushing).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLockProbe;

impl LockProbe for FsLockProbe {
    fn can_lock_exclusively(&self, path: &Path) -> bool {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Inputs are stable; the builder may run.
    Ready,
    /// Shutdown was requested or the wait budget ran out.
    Cancelled,
}

/// The pre-build stability gate.
///
/// The pipeline is fed by a live file watcher, so a job can arrive while
/// its source is still being written. Building such a file races the
/// producing process and yields truncated products; the gate holds the
/// worker until the file is lockable and its fingerprint stops moving.
#[derive(Clone)]
pub struct StabilityGate {
    config: GateConfig,
    probe: Arc<dyn LockProbe>,
}

impl StabilityGate {
    pub fn new(config: GateConfig, probe: Arc<dyn LockProbe>) -> Self {
        Self { config, probe }
    }

    /// Wait until the job's inputs stop changing, or until cancellation /
    /// the wait budget cuts the job off.
    pub async fn wait_until_stable(
        &self,
        details: &JobDetails,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        let deadline = Instant::now() + self.config.max_wait;

        if details.check_exclusive_lock && details.source_absolute.exists() {
            while !self.probe.can_lock_exclusively(&details.source_absolute) {
                tracing::debug!(source = %details.source, "source still locked by a writer");
                match self.pause(cancel, deadline).await {
                    GateOutcome::Ready => {}
                    cancelled => return cancelled,
                }
            }
        }

        // Converges once the producing process stops touching the file.
        let mut recorded = details.computed_fingerprint;
        loop {
            let current = job_fingerprint(details);
            if current == recorded {
                break;
            }
            tracing::debug!(
                source = %details.source,
                recorded,
                current,
                "fingerprint still changing"
            );
            recorded = current;
            match self.pause(cancel, deadline).await {
                GateOutcome::Ready => {}
                cancelled => return cancelled,
            }
        }

        GateOutcome::Ready
    }

    async fn pause(&self, cancel: &CancellationToken, deadline: Instant) -> GateOutcome {
        if Instant::now() >= deadline {
            tracing::warn!("stability gate wait budget exhausted");
            return GateOutcome::Cancelled;
        }
        tokio::select! {
            _ = cancel.cancelled() => GateOutcome::Cancelled,
            _ = tokio::time::sleep(self.config.poll_interval) => GateOutcome::Ready,
        }
    }
}

impl std::fmt::Debug for StabilityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityGate")
            .field("config", &self.config)
            .finish()
    }
}
