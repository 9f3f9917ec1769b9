use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::ProcessJobResponse;

/// Unique key for one unit of build work: one source file, one target
/// platform, one job key. Two submissions with equal identity describe the
/// same logical job. Platforms compare case-insensitively, so the platform
/// component is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentity {
    source: String,
    platform: String,
    job_key: String,
}

impl JobIdentity {
    pub fn new(
        source: impl Into<String>,
        platform: &str,
        job_key: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            platform: platform.to_lowercase(),
            job_key: job_key.into(),
        }
    }

    /// Relative path of the source file, as submitted.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target platform, lowercased.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn job_key(&self) -> &str {
        &self.job_key
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.source, self.platform, self.job_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Crashed,
    Terminated,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Pending | JobState::Processing)
    }

    pub fn is_success(self) -> bool {
        self == JobState::Completed
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Crashed => write!(f, "crashed"),
            JobState::Terminated => write!(f, "terminated"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Everything the ingestion layer knows about a build request at
/// submission time.
#[derive(Debug, Clone)]
pub struct JobDetails {
    /// Source path relative to the watched root.
    pub source: String,
    /// Absolute path of the source file on disk.
    pub source_absolute: PathBuf,
    pub platform: String,
    pub job_key: String,
    /// Which registered builder performs the work.
    pub builder_id: Uuid,
    /// Critical jobs (e.g. raw copies) dispatch ahead of everything else
    /// on their platform.
    pub critical: bool,
    /// Explicit priority; -1 means unset. Higher wins when both sides of
    /// a comparison carry one.
    pub priority: i32,
    /// Require an exclusive lock on the source before building.
    pub check_exclusive_lock: bool,
    /// Builder-supplied string folded into the fingerprint.
    pub extra_fingerprint_info: String,
    /// Declared source-file dependencies; a mtime change on any of them
    /// changes the job fingerprint.
    pub source_dependencies: Vec<PathBuf>,
    /// Fingerprint computed by the ingestion layer when the request was
    /// created.
    pub computed_fingerprint: u32,
    /// Directory the finished products are relocated into.
    pub destination_dir: PathBuf,
}

impl JobDetails {
    pub fn identity(&self) -> JobIdentity {
        JobIdentity::new(self.source.clone(), &self.platform, self.job_key.clone())
    }
}

/// One build unit, owned by the [`JobStore`](crate::scheduler::JobStore)
/// from submission until it completes or is superseded.
#[derive(Debug)]
pub struct Job {
    details: JobDetails,
    identity: JobIdentity,
    /// Store-assigned insertion serial; the final sort tie-break.
    serial: u64,
    state: JobState,
    created_at: DateTime<Utc>,
    launched_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    response: Option<ProcessJobResponse>,
}

impl Job {
    pub(crate) fn new(details: JobDetails, serial: u64) -> Self {
        let identity = details.identity();
        Self {
            details,
            identity,
            serial,
            state: JobState::Pending,
            created_at: Utc::now(),
            launched_at: None,
            completed_at: None,
            response: None,
        }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    pub fn details(&self) -> &JobDetails {
        &self.details
    }

    pub fn platform(&self) -> &str {
        self.identity.platform()
    }

    pub fn is_critical(&self) -> bool {
        self.details.critical
    }

    pub fn priority(&self) -> i32 {
        self.details.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn launched_at(&self) -> Option<DateTime<Utc>> {
        self.launched_at
    }

    pub(crate) fn stamp_launched(&mut self) {
        self.launched_at = Some(Utc::now());
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub(crate) fn stamp_completed(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Final builder response, present once the job reaches a terminal
    /// state.
    pub fn response(&self) -> Option<&ProcessJobResponse> {
        self.response.as_ref()
    }

    pub(crate) fn set_response(&mut self, response: ProcessJobResponse) {
        self.response = Some(response);
    }
}
