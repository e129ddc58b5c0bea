//! Pipeline submission: build, validate, run
//!
//! Order matters. The build runs first and entirely offline, so a bad field
//! is reported before any request goes out; a remote rejection stops the
//! run from being submitted.

use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ClientError, ExecutionHandle, PipelineService, ValidationOutcome};
use crate::pipeline::{BuildError, CoercedPipeline, Step, build_pipeline};
use crate::run_id::RunId;

/// Errors from the submission flow
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl SubmitError {
    /// True if the failure happened before anything was sent
    pub fn is_build(&self) -> bool {
        matches!(self, SubmitError::Build(_))
    }
}

/// How much remote validation to do before running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Validate the whole pipeline before running
    pub validate: bool,
    /// Also validate each step on its own, in order
    pub validate_each_step: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            validate: true,
            validate_each_step: false,
        }
    }
}

/// Build the pipeline and run the requested remote validation
pub async fn prepare(
    service: &dyn PipelineService,
    steps: Option<&[Step]>,
    options: SubmitOptions,
) -> Result<CoercedPipeline, SubmitError> {
    let pipeline = build_pipeline(steps)?;
    debug!(step_count = pipeline.len(), ?options, "prepare: pipeline built");

    if options.validate_each_step {
        let mut reasons = Vec::new();
        for (index, step) in pipeline.iter().enumerate() {
            if let ValidationOutcome::Rejected { reasons: step_reasons } = service.validate_step(step).await? {
                debug!(index, execution_path = %step.execution_path, "prepare: step rejected");
                reasons.extend(
                    step_reasons
                        .into_iter()
                        .map(|r| format!("step {} ({}): {}", index + 1, step.execution_path, r)),
                );
            }
        }
        if !reasons.is_empty() {
            return Err(ClientError::RemoteValidation { reasons }.into());
        }
    }

    if options.validate {
        service.validate_pipeline(&pipeline).await?.into_result()?;
        debug!("prepare: pipeline validated");
    }

    Ok(pipeline)
}

/// Build, validate and start a run
///
/// The returned handle owns the open connection; drop or close it to stop.
pub async fn submit(
    service: &dyn PipelineService,
    steps: Option<&[Step]>,
    run_id: &RunId,
    options: SubmitOptions,
) -> Result<ExecutionHandle, SubmitError> {
    let pipeline = prepare(service, steps, options).await?;
    info!(%run_id, step_count = pipeline.len(), "submit: starting run");
    Ok(service.run(&pipeline, run_id).await?)
}
