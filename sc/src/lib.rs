//! SatClient - pipeline builder and streaming run client for SatEval
//!
//! SatEval evaluates image compression pipelines: load a dataset, inject
//! noise, compress, decompress, score. This crate is the client side. It
//! turns form-style input into a typed pipeline, has the backend validate
//! it, submits it, and reads the run's progress stream as it arrives.
//!
//! # Modules
//!
//! - [`pipeline`] - Field coercion, step and pipeline builders (offline)
//! - [`client`] - HTTP client, validation outcomes, the run stream handle
//! - [`submit`] - Build → validate → run flow
//! - [`run_id`] - Run identifiers
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use satclient::{RunId, SatEvalClient, Step, FieldSpec, SubmitOptions, submit};
//!
//! let client = SatEvalClient::new("http://localhost:8000")?;
//! let steps = vec![
//!     Step::new("dataset_loader", "load_by_url")
//!         .with_param(FieldSpec::new("url", "str", "https://example.com/tiles.zip")),
//! ];
//! let mut handle = submit(&client, Some(steps.as_slice()), &RunId::generate(None), SubmitOptions::default()).await?;
//! while let Some(event) = handle.next_event().await? {
//!     println!("{:?}", event);
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod pipeline;
pub mod run_id;
pub mod submit;

// Re-export commonly used types
pub use client::{
    ClientError, ExecutionHandle, HandleState, PipelineService, Progress, RunEvent, SatEvalClient, ValidationOutcome,
};
pub use config::{Config, ServerConfig};
pub use pipeline::{
    BuildError, CoercedPipeline, CoercedStep, EmptyPipelineKind, FieldSpec, FieldType, ParamValue, Step,
    build_pipeline, build_step, coerce,
};
pub use run_id::RunId;
pub use submit::{SubmitError, SubmitOptions, prepare, submit};
