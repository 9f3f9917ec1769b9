//! Per-job worker execution: stability gate, builder invocation, product
//! relocation. One task per in-flight job; results travel back to the
//! controller over its message channel, never by touching shared state.

use std::io;
use std::path::Path;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::builder::{BuildResult, BuilderRegistry, ProcessJobRequest, ProcessJobResponse};
use crate::controller::ControllerMessage;
use crate::error::{AssetFlowError, Result};
use crate::fingerprint::{GateOutcome, StabilityGate};
use crate::scheduler::JobDetails;

pub(crate) struct WorkerContext {
    pub gate: StabilityGate,
    pub registry: BuilderRegistry,
    pub cancel: CancellationToken,
    pub max_path_len: usize,
    pub report: mpsc::UnboundedSender<ControllerMessage>,
}

pub(crate) async fn run_job(ctx: WorkerContext, details: JobDetails) {
    let identity = details.identity();
    let response = execute(&ctx, &details).await;
    if ctx
        .report
        .send(ControllerMessage::JobFinished { identity, response })
        .is_err()
    {
        tracing::warn!(source = %details.source, "controller closed before job result could be reported");
    }
}

async fn execute(ctx: &WorkerContext, details: &JobDetails) -> ProcessJobResponse {
    match ctx.gate.wait_until_stable(details, &ctx.cancel).await {
        GateOutcome::Ready => {}
        GateOutcome::Cancelled => {
            tracing::info!(source = %details.source, "job cancelled while waiting on the stability gate");
            return ProcessJobResponse::cancelled();
        }
    }

    let source_len = details.source_absolute.as_os_str().len();
    if source_len >= ctx.max_path_len {
        tracing::warn!(
            source = %details.source,
            length = source_len,
            max = ctx.max_path_len,
            "source path exceeds the maximum path length"
        );
        return ProcessJobResponse::failed();
    }

    let Some(builder) = ctx.registry.get(&details.builder_id) else {
        tracing::error!(
            source = %details.source,
            error = %AssetFlowError::UnknownBuilder(details.builder_id),
            "cannot process job"
        );
        return ProcessJobResponse::failed();
    };

    let mut response = builder
        .process_job(ProcessJobRequest::from_details(details))
        .await;

    if response.result == BuildResult::Success {
        if let Err(error) =
            relocate_products(&mut response, &details.destination_dir, ctx.max_path_len).await
        {
            tracing::error!(source = %details.source, %error, "failed to relocate products");
            response = ProcessJobResponse::failed();
        }
    }
    response
}

/// Move each declared product into the destination directory, lowercasing
/// the file name. Rename first; when source and destination are not
/// colocated the rename fails and a copy takes its place.
async fn relocate_products(
    response: &mut ProcessJobResponse,
    destination: &Path,
    max_path_len: usize,
) -> Result<()> {
    tokio::fs::create_dir_all(destination).await?;

    for product in &mut response.products {
        let file_name = product
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .ok_or_else(|| AssetFlowError::ProductRelocation {
                path: product.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "product path has no file name"),
            })?;
        let target = destination.join(file_name);

        if target.as_os_str().len() >= max_path_len {
            return Err(AssetFlowError::ProductPathTooLong(target));
        }

        if tokio::fs::rename(&*product, &target).await.is_err() {
            tokio::fs::copy(&*product, &target).await.map_err(|source| {
                AssetFlowError::ProductRelocation {
                    path: product.clone(),
                    source,
                }
            })?;
        }
        *product = target;
    }
    Ok(())
}
