//! Pipeline build error types

use std::fmt;

use thiserror::Error;

/// Why a pipeline was rejected as empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPipelineKind {
    /// No pipeline was provided at all
    Absent,
    /// A pipeline was provided but it has no steps
    ZeroLength,
}

impl fmt::Display for EmptyPipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyPipelineKind::Absent => write!(f, "no pipeline provided"),
            EmptyPipelineKind::ZeroLength => write!(f, "pipeline has no steps"),
        }
    }
}

/// Errors raised while turning form input into a coerced pipeline
///
/// These never involve the network: a build error means nothing was sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Invalid value for {field}{}: '{value}' is not a valid {field_type} ({reason})", step_suffix(.step))]
    Coercion {
        step: Option<usize>,
        field: String,
        field_type: String,
        value: String,
        reason: String,
    },

    #[error("Malformed step{}: {reason}", step_suffix(.step))]
    MalformedStep { step: Option<usize>, reason: String },

    #[error("Empty pipeline: {0}")]
    EmptyPipeline(EmptyPipelineKind),
}

fn step_suffix(step: &Option<usize>) -> String {
    match step {
        Some(index) => format!(" (step {})", index + 1),
        None => String::new(),
    }
}

impl BuildError {
    /// Attach the index of the failing step within its pipeline
    pub fn at_step(self, index: usize) -> Self {
        match self {
            BuildError::Coercion {
                field,
                field_type,
                value,
                reason,
                ..
            } => BuildError::Coercion {
                step: Some(index),
                field,
                field_type,
                value,
                reason,
            },
            BuildError::MalformedStep { reason, .. } => BuildError::MalformedStep {
                step: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Index of the failing step, when known
    pub fn step(&self) -> Option<usize> {
        match self {
            BuildError::Coercion { step, .. } | BuildError::MalformedStep { step, .. } => *step,
            BuildError::EmptyPipeline(_) => None,
        }
    }

    /// Check if this is a coercion failure
    pub fn is_coercion(&self) -> bool {
        matches!(self, BuildError::Coercion { .. })
    }

    /// The empty-pipeline kind, if this is an empty-pipeline error
    pub fn empty_kind(&self) -> Option<EmptyPipelineKind> {
        match self {
            BuildError::EmptyPipeline(kind) => Some(*kind),
            _ => None,
        }
    }
}
