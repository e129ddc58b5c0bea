//! PipelineService trait definition

use async_trait::async_trait;

use super::{ClientError, ExecutionHandle, SatEvalClient, ValidationOutcome};
use crate::pipeline::{CoercedPipeline, CoercedStep};
use crate::run_id::RunId;

/// The remote side of a pipeline submission
///
/// Each call is independent; implementations keep no per-run state.
#[async_trait]
pub trait PipelineService: Send + Sync {
    /// Validate one step without executing it
    async fn validate_step(&self, step: &CoercedStep) -> Result<ValidationOutcome, ClientError>;

    /// Validate a whole pipeline without executing it
    async fn validate_pipeline(&self, pipeline: &CoercedPipeline) -> Result<ValidationOutcome, ClientError>;

    /// Start a run and hand back its stream as soon as it opens
    async fn run(&self, pipeline: &CoercedPipeline, run_id: &RunId) -> Result<ExecutionHandle, ClientError>;
}

#[async_trait]
impl PipelineService for SatEvalClient {
    async fn validate_step(&self, step: &CoercedStep) -> Result<ValidationOutcome, ClientError> {
        SatEvalClient::validate_step(self, step).await
    }

    async fn validate_pipeline(&self, pipeline: &CoercedPipeline) -> Result<ValidationOutcome, ClientError> {
        SatEvalClient::validate_pipeline(self, pipeline).await
    }

    async fn run(&self, pipeline: &CoercedPipeline, run_id: &RunId) -> Result<ExecutionHandle, ClientError> {
        SatEvalClient::run(self, pipeline, run_id).await
    }
}
