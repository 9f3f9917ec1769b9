//! The dispatch authority: owns the job store, the priority view and the
//! compile-group tracker, and drives every job through
//! Pending -> Processing -> terminal under a bounded worker budget.
//!
//! All scheduling state is mutated on this single task. Submissions,
//! connection changes, compile-group requests and worker completion
//! reports all arrive as messages; outbound signals leave over one event
//! channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::builder::{BuildResult, BuilderRegistry, ProcessJobResponse};
use crate::config::{ControllerConfig, GateConfig};
use crate::error::{AssetFlowError, Result};
use crate::events::{JobStatus, PipelineEvent};
use crate::fingerprint::{FsLockProbe, LockProbe, StabilityGate};
use crate::groups::CompileGroupTracker;
use crate::scheduler::{JobDetails, JobIdentity, JobState, JobStore, SortModel};
use crate::worker::{self, WorkerContext};

/// How often the shutdown drain re-checks the in-flight count.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub(crate) enum ControllerMessage {
    Submit(JobDetails),
    SetPlatformConnected {
        platform: String,
        connected: bool,
    },
    RequestCompileGroup {
        request_id: Uuid,
        platform: String,
        search_term: String,
    },
    QueryPlatformStats {
        platform: String,
        reply: oneshot::Sender<PlatformStats>,
    },
    QueryFailedJob {
        identity: JobIdentity,
        reply: oneshot::Sender<Option<FailedJobInfo>>,
    },
    JobFinished {
        identity: JobIdentity,
        response: ProcessJobResponse,
    },
    Shutdown,
}

/// Read-only per-platform accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformStats {
    pub jobs_in_queue: usize,
    pub pending_critical: usize,
}

/// Snapshot of a retained failure record, so a UI can show why the last
/// run of an asset did not produce products.
#[derive(Debug, Clone)]
pub struct FailedJobInfo {
    pub state: JobState,
    pub response: ProcessJobResponse,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Clonable inbound surface of the controller. Everything the ingestion
/// layer, connection layer and request handlers need.
#[derive(Clone)]
pub struct ControllerHandle {
    sender: mpsc::UnboundedSender<ControllerMessage>,
}

impl ControllerHandle {
    pub fn submit(&self, details: JobDetails) -> Result<()> {
        self.send(ControllerMessage::Submit(details))
    }

    pub fn set_platform_connected(&self, platform: &str, connected: bool) -> Result<()> {
        self.send(ControllerMessage::SetPlatformConnected {
            platform: platform.to_string(),
            connected,
        })
    }

    pub fn request_compile_group(
        &self,
        request_id: Uuid,
        platform: &str,
        search_term: &str,
    ) -> Result<()> {
        self.send(ControllerMessage::RequestCompileGroup {
            request_id,
            platform: platform.to_string(),
            search_term: search_term.to_string(),
        })
    }

    /// Queue depth and pending-critical count for one platform, answered
    /// by the dispatch task.
    pub async fn platform_stats(&self, platform: &str) -> Result<PlatformStats> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerMessage::QueryPlatformStats {
            platform: platform.to_lowercase(),
            reply,
        })?;
        rx.await.map_err(|_| AssetFlowError::ControllerClosed)
    }

    /// The retained record of this identity's last non-successful run, if
    /// one exists and has not been superseded by a resubmission.
    pub async fn failed_job(&self, identity: &JobIdentity) -> Result<Option<FailedJobInfo>> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerMessage::QueryFailedJob {
            identity: identity.clone(),
            reply,
        })?;
        rx.await.map_err(|_| AssetFlowError::ControllerClosed)
    }

    /// Begin graceful shutdown: no new dispatch, in-flight jobs drain,
    /// gate-waiting jobs terminate. `ReadyToQuit` fires when drained.
    pub fn shutdown(&self) -> Result<()> {
        self.send(ControllerMessage::Shutdown)
    }

    fn send(&self, message: ControllerMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| AssetFlowError::ControllerClosed)
    }
}

pub struct RcController {
    store: JobStore,
    sort: SortModel,
    groups: CompileGroupTracker,
    registry: BuilderRegistry,
    probe: Arc<dyn LockProbe>,
    gate_config: GateConfig,
    max_jobs: usize,
    max_path_len: usize,
    jobs_per_platform: HashMap<String, usize>,
    pending_critical: HashMap<String, usize>,
    dispatching: bool,
    shutting_down: bool,
    idle_notified: bool,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PipelineEvent>,
    messages: mpsc::UnboundedReceiver<ControllerMessage>,
    sender: mpsc::UnboundedSender<ControllerMessage>,
}

impl RcController {
    pub fn new(
        config: ControllerConfig,
        registry: BuilderRegistry,
    ) -> (
        Self,
        ControllerHandle,
        mpsc::UnboundedReceiver<PipelineEvent>,
    ) {
        let (sender, messages) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let max_jobs = config.effective_max_jobs();
        tracing::info!(max_jobs, "controller created");

        let controller = Self {
            store: JobStore::new(),
            sort: SortModel::new(),
            groups: CompileGroupTracker::new(),
            registry,
            probe: Arc::new(FsLockProbe),
            gate_config: config.gate,
            max_jobs,
            max_path_len: config.max_path_len,
            jobs_per_platform: HashMap::new(),
            pending_critical: HashMap::new(),
            dispatching: false,
            shutting_down: false,
            idle_notified: false,
            cancel: CancellationToken::new(),
            events,
            messages,
            sender: sender.clone(),
        };
        (controller, ControllerHandle { sender }, events_rx)
    }

    /// Replace the file-lock probe (tests and unusual filesystems).
    pub fn with_lock_probe(mut self, probe: Arc<dyn LockProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// The dispatch loop. Runs until shutdown has drained every in-flight
    /// job.
    pub async fn run(mut self) {
        let mut drain = tokio::time::interval(DRAIN_POLL_INTERVAL);
        loop {
            tokio::select! {
                message = self.messages.recv() => {
                    match message {
                        Some(message) => {
                            if self.handle_message(message) {
                                break;
                            }
                        }
                        // All senders gone; nothing can reach us anymore.
                        None => break,
                    }
                }
                _ = drain.tick(), if self.shutting_down => {
                    if self.store.jobs_in_flight() == 0 {
                        self.emit(PipelineEvent::ReadyToQuit);
                        break;
                    }
                }
            }
        }
        tracing::info!("controller stopped");
    }

    /// Returns true once the controller should stop.
    fn handle_message(&mut self, message: ControllerMessage) -> bool {
        match message {
            ControllerMessage::Submit(details) => {
                self.submit_job(details);
                false
            }
            ControllerMessage::SetPlatformConnected {
                platform,
                connected,
            } => {
                self.sort.set_platform_connected(&platform, connected);
                if !self.shutting_down {
                    self.dispatch_jobs();
                }
                false
            }
            ControllerMessage::RequestCompileGroup {
                request_id,
                platform,
                search_term,
            } => {
                let status = self.groups.request_group(
                    request_id,
                    &platform,
                    &search_term,
                    &self.store,
                    &mut self.sort,
                );
                self.emit(PipelineEvent::CompileGroupCreated { request_id, status });
                false
            }
            ControllerMessage::QueryPlatformStats { platform, reply } => {
                let stats = PlatformStats {
                    jobs_in_queue: self.jobs_per_platform.get(&platform).copied().unwrap_or(0),
                    pending_critical: self.pending_critical.get(&platform).copied().unwrap_or(0),
                };
                let _ = reply.send(stats);
                false
            }
            ControllerMessage::QueryFailedJob { identity, reply } => {
                let info = self.store.failed_job(&identity).map(|job| FailedJobInfo {
                    state: job.state(),
                    response: job.response().cloned().unwrap_or_default(),
                    completed_at: job.completed_at(),
                });
                let _ = reply.send(info);
                false
            }
            ControllerMessage::JobFinished { identity, response } => {
                self.finish_job(identity, response);
                false
            }
            ControllerMessage::Shutdown => {
                let in_flight = self.store.jobs_in_flight();
                tracing::info!(in_flight, "shutdown requested");
                self.shutting_down = true;
                // Jobs still waiting on the stability gate observe this
                // and exit as terminated; running builders finish.
                self.cancel.cancel();
                if in_flight == 0 {
                    self.emit(PipelineEvent::ReadyToQuit);
                    return true;
                }
                false
            }
        }
    }

    fn submit_job(&mut self, details: JobDetails) {
        let identity = details.identity();
        let platform = identity.platform().to_string();
        let critical = details.critical;

        if !self.store.submit(details) {
            return;
        }
        self.idle_notified = false;

        if critical {
            *self.pending_critical.entry(platform.clone()).or_insert(0) += 1;
        }
        let count = {
            let count = self.jobs_per_platform.entry(platform.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.emit(PipelineEvent::JobsInQueuePerPlatform {
            platform,
            count,
        });
        self.emit(PipelineEvent::JobStatusChanged {
            identity,
            status: JobStatus::Queued,
        });

        if !self.shutting_down {
            self.dispatch_jobs();
        }
    }

    /// Fill free worker capacity from the priority view. A started job's
    /// events can arrive back as messages and re-trigger dispatch, so the
    /// loop guards against re-entry.
    fn dispatch_jobs(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while !self.shutting_down && self.store.jobs_in_flight() < self.max_jobs {
            let Some(identity) = self.sort.next_pending(&self.store) else {
                break;
            };
            self.start_job(identity);
        }
        self.dispatching = false;
    }

    fn start_job(&mut self, identity: JobIdentity) {
        if !self.store.mark_processing(&identity) {
            return;
        }
        let details = match self.store.get(&identity) {
            Some(job) => job.details().clone(),
            None => return,
        };
        tracing::info!(job = %identity, "job started");
        self.emit(PipelineEvent::JobStatusChanged {
            identity: identity.clone(),
            status: JobStatus::InProgress,
        });
        self.emit(PipelineEvent::JobStarted {
            source: details.source.clone(),
            platform: identity.platform().to_string(),
        });

        let ctx = WorkerContext {
            gate: StabilityGate::new(self.gate_config.clone(), self.probe.clone()),
            registry: self.registry.clone(),
            cancel: self.cancel.clone(),
            max_path_len: self.max_path_len,
            report: self.sender.clone(),
        };
        tokio::spawn(worker::run_job(ctx, details));
    }

    fn finish_job(&mut self, identity: JobIdentity, response: ProcessJobResponse) {
        let state = match response.result {
            BuildResult::Success => JobState::Completed,
            BuildResult::Crashed => JobState::Crashed,
            BuildResult::Cancelled => JobState::Terminated,
            BuildResult::Failed => JobState::Failed,
        };
        let Some(job) = self.store.get(&identity) else {
            tracing::warn!(job = %identity, "finished job is unknown to the store");
            return;
        };
        let platform = job.platform().to_string();
        let critical = job.is_critical();
        tracing::info!(job = %identity, %state, "job finished");

        if let Some(count) = self.jobs_per_platform.get_mut(&platform) {
            if *count > 0 {
                *count -= 1;
                let count = *count;
                self.emit(PipelineEvent::JobsInQueuePerPlatform {
                    platform: platform.clone(),
                    count,
                });
            }
        }

        for (request_id, status) in self.groups.on_job_finished(&identity, state, &mut self.sort)
        {
            self.emit(PipelineEvent::CompileGroupFinished { request_id, status });
        }

        if critical {
            if let Some(count) = self.pending_critical.get_mut(&platform) {
                *count = count.saturating_sub(1);
            }
        }

        if state.is_success() {
            self.emit(PipelineEvent::FileCompiled {
                identity: identity.clone(),
                response: response.clone(),
            });
        } else {
            self.emit(PipelineEvent::FileFailed {
                identity: identity.clone(),
            });
        }
        self.emit(PipelineEvent::JobStatusChanged {
            identity: identity.clone(),
            status: if state.is_success() {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            },
        });

        self.store.mark_completed(&identity, state, response);

        if !self.shutting_down {
            self.dispatch_jobs();
            if self.is_idle() && !self.idle_notified {
                self.idle_notified = true;
                self.emit(PipelineEvent::BecameIdle);
            }
        }
    }

    fn is_idle(&mut self) -> bool {
        self.sort.next_pending(&self.store).is_none() && self.store.jobs_in_flight() == 0
    }

    fn emit(&self, event: PipelineEvent) {
        // Receiver gone just means nobody is listening anymore.
        let _ = self.events.send(event);
    }
}
