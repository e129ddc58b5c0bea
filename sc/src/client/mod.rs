//! Client for the SatEval backend
//!
//! Provides remote validation, run submission, the streamed run handle, and
//! the plain lookups (datasets, runs, modules) the frontends need.

mod error;
mod http;
pub mod service;
mod stream;
mod types;

pub use error::ClientError;
pub use http::SatEvalClient;
pub use service::PipelineService;
pub use stream::{ChunkStream, EventDecoder, ExecutionHandle, HandleState, Progress, RunEvent};
pub use types::{ConfigTemplate, DatasetEntry, Envelope, EvaluationRecord, ValidationOutcome};
