use std::time::Duration;

/// Configuration for the pre-build stability gate.
///
/// The gate polls the source file until no other process holds a write
/// handle and its fingerprint stops changing. The wait bound is long on
/// purpose: external compressors can legitimately hold large textures
/// open for the better part of an hour.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Sleep interval between lock / fingerprint probes.
    pub poll_interval: Duration,
    /// Maximum total time a job may spend waiting in the gate.
    pub max_wait: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_wait: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Lower bound on worker concurrency.
    pub min_jobs: usize,
    /// Upper bound on worker concurrency. 0 means auto-detect from the
    /// CPU count, reserving one core for the dispatch thread.
    pub max_jobs: usize,
    /// Maximum allowed length for source and product paths.
    pub max_path_len: usize,
    pub gate: GateConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_jobs: 1,
            max_jobs: 0,
            max_path_len: 260,
            gate: GateConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Effective worker-pool size for this machine.
    pub fn effective_max_jobs(&self) -> usize {
        clamp_max_jobs(self.min_jobs, self.max_jobs, num_cpus::get())
    }
}

/// One core stays reserved for the dispatcher itself; an explicit
/// `max_jobs` is clamped between `min_jobs` and the detected budget.
fn clamp_max_jobs(min_jobs: usize, max_jobs: usize, detected: usize) -> usize {
    let auto = detected.saturating_sub(1).max(1);
    if max_jobs == 0 {
        auto
    } else {
        max_jobs.min(auto).max(min_jobs.max(1))
    }
}
