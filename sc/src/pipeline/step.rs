//! Pipeline steps and the builder that coerces one step

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BuildError;
use super::field::{FieldSpec, ParamValue, coerce};

/// Separator between module and method in an execution path
pub const PATH_SEPARATOR: char = ':';

/// One processing step as edited in the form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub module: String,
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<FieldSpec>,
}

impl Step {
    pub fn new(module: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
            parameters: Vec::new(),
        }
    }

    /// Builder-style helper to append a parameter
    pub fn with_param(mut self, field: FieldSpec) -> Self {
        self.parameters.push(field);
        self
    }
}

/// A step ready to send: `module:method` plus its typed parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercedStep {
    pub execution_path: String,
    pub params: BTreeMap<String, ParamValue>,
}

impl CoercedStep {
    pub fn module(&self) -> &str {
        self.execution_path
            .split_once(PATH_SEPARATOR)
            .map(|(module, _)| module)
            .unwrap_or(&self.execution_path)
    }

    pub fn method(&self) -> &str {
        self.execution_path
            .split_once(PATH_SEPARATOR)
            .map(|(_, method)| method)
            .unwrap_or("")
    }
}

/// Coerce a single step
///
/// Fails on the first bad field; no partially populated step is returned.
pub fn build_step(step: &Step) -> Result<CoercedStep, BuildError> {
    debug!(module = %step.module, method = %step.method, param_count = step.parameters.len(), "build_step: called");
    let module = reference(&step.module, "module")?;
    let method = reference(&step.method, "method")?;

    let mut seen = HashSet::new();
    let mut params = BTreeMap::new();
    for spec in &step.parameters {
        if !seen.insert(spec.field.as_str()) {
            debug!(field = %spec.field, "build_step: duplicate field");
            return Err(BuildError::MalformedStep {
                step: None,
                reason: format!("field '{}' appears more than once", spec.field),
            });
        }
        if let Some(value) = coerce(spec)? {
            params.insert(spec.field.clone(), value);
        }
    }

    let execution_path = format!("{}{}{}", module, PATH_SEPARATOR, method);
    debug!(%execution_path, kept = params.len(), "build_step: done");
    Ok(CoercedStep { execution_path, params })
}

/// Validate a module or method name, returning it without surrounding whitespace
fn reference<'a>(name: &'a str, what: &str) -> Result<&'a str, BuildError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BuildError::MalformedStep {
            step: None,
            reason: format!("{} is empty", what),
        });
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(BuildError::MalformedStep {
            step: None,
            reason: format!("{} '{}' contains '{}'", what, name, PATH_SEPARATOR),
        });
    }
    Ok(name)
}
