//! Pipeline builder: ordered steps in, ordered coerced steps out

use serde::Serialize;
use tracing::debug;

use super::step::{CoercedStep, Step, build_step};
use super::{BuildError, EmptyPipelineKind};

/// A coerced pipeline, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoercedPipeline(Vec<CoercedStep>);

impl CoercedPipeline {
    pub fn steps(&self) -> &[CoercedStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a pipeline produced by [`build_pipeline`]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CoercedStep> {
        self.0.iter()
    }

    pub fn into_steps(self) -> Vec<CoercedStep> {
        self.0
    }
}

impl<'a> IntoIterator for &'a CoercedPipeline {
    type Item = &'a CoercedStep;
    type IntoIter = std::slice::Iter<'a, CoercedStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Coerce every step of a pipeline, preserving order
///
/// `None` and an empty slice are both rejected, as distinct
/// [`EmptyPipelineKind`]s. The first failing step aborts the build and the
/// error carries that step's index.
pub fn build_pipeline(pipeline: Option<&[Step]>) -> Result<CoercedPipeline, BuildError> {
    let Some(steps) = pipeline else {
        debug!("build_pipeline: no pipeline provided");
        return Err(BuildError::EmptyPipeline(EmptyPipelineKind::Absent));
    };
    debug!(step_count = steps.len(), "build_pipeline: called");

    if steps.is_empty() {
        debug!("build_pipeline: zero-length pipeline");
        return Err(BuildError::EmptyPipeline(EmptyPipelineKind::ZeroLength));
    }

    let coerced = steps
        .iter()
        .enumerate()
        .map(|(index, step)| build_step(step).map_err(|e| e.at_step(index)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CoercedPipeline(coerced))
}
