//! Pipeline construction
//!
//! Turns form input (every value is text) into the typed request the backend
//! executes. Nothing here touches the network, so a pipeline that fails to
//! build is never submitted.
//!
//! ```text
//! FieldSpec --coerce--> ParamValue
//! Step --build_step--> CoercedStep { execution_path: "module:method", params }
//! [Step] --build_pipeline--> CoercedPipeline (same order, same length)
//! ```

mod builder;
mod error;
mod field;
mod step;

pub use builder::{CoercedPipeline, build_pipeline};
pub use error::{BuildError, EmptyPipelineKind};
pub use field::{FieldSpec, FieldType, Numeric, ParamValue, coerce};
pub use step::{CoercedStep, PATH_SEPARATOR, Step, build_step};

use std::path::Path;

use eyre::{Context, Result};

/// Read a pipeline definition (a list of steps) from a YAML or JSON file
///
/// JSON is a subset of YAML, so one parser covers both.
pub fn load_steps(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path).context(format!("Failed to read pipeline file {}", path.display()))?;
    let steps: Vec<Step> =
        serde_yaml::from_str(&content).context(format!("Failed to parse pipeline file {}", path.display()))?;
    tracing::debug!(path = %path.display(), step_count = steps.len(), "load_steps: loaded");
    Ok(steps)
}
