use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduler::JobDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildResult {
    Success,
    Failed,
    Crashed,
    Cancelled,
}

impl Default for BuildResult {
    fn default() -> Self {
        BuildResult::Failed
    }
}

/// Work order handed to a builder. A flattened, read-only view of the
/// job details; builders never see scheduler state.
#[derive(Debug, Clone)]
pub struct ProcessJobRequest {
    pub source: String,
    pub full_path: PathBuf,
    pub platform: String,
    pub job_key: String,
    pub builder_id: Uuid,
    pub critical: bool,
    pub priority: i32,
    pub extra_fingerprint_info: String,
}

impl ProcessJobRequest {
    pub(crate) fn from_details(details: &JobDetails) -> Self {
        Self {
            source: details.source.clone(),
            full_path: details.source_absolute.clone(),
            platform: details.platform.to_lowercase(),
            job_key: details.job_key.clone(),
            builder_id: details.builder_id,
            critical: details.critical,
            priority: details.priority,
            extra_fingerprint_info: details.extra_fingerprint_info.clone(),
        }
    }
}

/// What came back from a builder. `products` are the output files the
/// builder wrote; after a successful relocation the paths point into the
/// job's destination directory.
#[derive(Debug, Clone, Default)]
pub struct ProcessJobResponse {
    pub result: BuildResult,
    pub products: Vec<PathBuf>,
}

impl ProcessJobResponse {
    pub fn success(products: Vec<PathBuf>) -> Self {
        Self {
            result: BuildResult::Success,
            products,
        }
    }

    pub fn failed() -> Self {
        Self {
            result: BuildResult::Failed,
            products: Vec::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            result: BuildResult::Cancelled,
            products: Vec::new(),
        }
    }
}

/// The compiler plugin seam. Implementations run on worker tasks and must
/// tolerate concurrent invocation.
#[async_trait]
pub trait AssetBuilder: Send + Sync {
    async fn process_job(&self, request: ProcessJobRequest) -> ProcessJobResponse;
}

/// Explicit builder registry handed to the controller at construction.
/// Keeps builder lifetime visible instead of hiding it in process-wide
/// statics.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: HashMap<Uuid, Arc<dyn AssetBuilder>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: Uuid, builder: Arc<dyn AssetBuilder>) {
        self.builders.insert(id, builder);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<dyn AssetBuilder>> {
        self.builders.get(id).cloned()
    }
}

impl std::fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}
