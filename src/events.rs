use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::ProcessJobResponse;
use crate::scheduler::JobIdentity;

/// Job status as relayed to UIs and remote clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Compile-group status answered to the network request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    /// The search term matched nothing; no group was created.
    Unknown,
    Queued,
    Compiled,
    Failed,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupStatus::Unknown => write!(f, "unknown"),
            GroupStatus::Queued => write!(f, "queued"),
            GroupStatus::Compiled => write!(f, "compiled"),
            GroupStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Everything the core tells the outside world, delivered in order over a
/// single channel. Consumers (UI, catalog writer, network notifier) pick
/// out what they care about; the core never waits on them.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    JobStatusChanged {
        identity: JobIdentity,
        status: JobStatus,
    },
    JobsInQueuePerPlatform {
        platform: String,
        count: usize,
    },
    JobStarted {
        source: String,
        platform: String,
    },
    FileCompiled {
        identity: JobIdentity,
        response: ProcessJobResponse,
    },
    FileFailed {
        identity: JobIdentity,
    },
    CompileGroupCreated {
        request_id: Uuid,
        status: GroupStatus,
    },
    CompileGroupFinished {
        request_id: Uuid,
        status: GroupStatus,
    },
    /// No job pending and none in flight.
    BecameIdle,
    /// Shutdown drain finished; the host may exit.
    ReadyToQuit,
}
