//! Asset build job-scheduling core.
//!
//! Accepts build requests for source files, orders them under a
//! multi-criteria priority policy, dispatches them to a bounded worker
//! pool behind a file-stability gate, and tracks compile groups so network
//! callers can wait for a set of assets to finish.

pub mod builder;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod groups;
pub mod scheduler;
pub mod shutdown;

mod worker;

pub use builder::{AssetBuilder, BuilderRegistry, BuildResult, ProcessJobRequest, ProcessJobResponse};
pub use config::{ControllerConfig, GateConfig};
pub use controller::{ControllerHandle, FailedJobInfo, PlatformStats, RcController};
pub use error::{AssetFlowError, Result};
pub use events::{GroupStatus, JobStatus, PipelineEvent};
pub use scheduler::{Job, JobDetails, JobIdentity, JobState, JobStore, SortModel};
