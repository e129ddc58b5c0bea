//! Backend response types

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ClientError;

/// Response envelope the backend wraps around every JSON reply
///
/// ```json
/// {"isSuccess": true, "statusCode": 200, "message": "Get Run IDs Success", "data": [...]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub is_success: bool,
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Unwrap the payload, turning a failure envelope into [`ClientError::Api`]
    ///
    /// A missing `data` field decodes as JSON `null`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        debug!(is_success = self.is_success, status = self.status_code, message = %self.message, "Envelope::into_data: called");
        if !self.is_success {
            return Err(ClientError::Api {
                status: self.status_code,
                message: failure_message(&self.message, self.data.as_ref()),
                data: self.data,
            });
        }

        let data = self.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| {
            debug!(error = %e, "Envelope::into_data: payload has unexpected shape");
            ClientError::InvalidResponse(format!("unexpected payload for '{}': {}", self.message, e))
        })
    }
}

fn failure_message(message: &str, data: Option<&Value>) -> String {
    match data {
        Some(Value::String(detail)) if !detail.is_empty() => format!("{}: {}", message, detail),
        _ => message.to_string(),
    }
}

/// Answer from one of the validation endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    Rejected { reasons: Vec<String> },
}

impl ValidationOutcome {
    /// Interpret a validation envelope
    ///
    /// Any well-formed envelope is an answer; only transport problems and
    /// unparseable bodies are errors. The payload may be a bare bool, a
    /// message, a list of messages, or an object with `valid`/`reasons`.
    pub fn from_envelope(envelope: Envelope) -> Self {
        debug!(is_success = envelope.is_success, "ValidationOutcome::from_envelope: called");
        if !envelope.is_success {
            let mut reasons = envelope.data.map(reasons_from).unwrap_or_default();
            if reasons.is_empty() {
                reasons.push(envelope.message);
            }
            return ValidationOutcome::Rejected { reasons };
        }

        match envelope.data {
            None | Some(Value::Null) | Some(Value::Bool(true)) => ValidationOutcome::Passed,
            Some(Value::Bool(false)) => ValidationOutcome::Rejected {
                reasons: vec![format!("{}: configuration is not valid", envelope.message)],
            },
            Some(Value::Array(items)) if items.is_empty() => ValidationOutcome::Passed,
            Some(Value::Object(map)) => {
                let valid = map
                    .get("valid")
                    .or_else(|| map.get("is_valid"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if valid {
                    ValidationOutcome::Passed
                } else {
                    let reasons = map
                        .get("reasons")
                        .or_else(|| map.get("errors"))
                        .cloned()
                        .map(reasons_from)
                        .unwrap_or_default();
                    ValidationOutcome::Rejected {
                        reasons: if reasons.is_empty() { vec![envelope.message] } else { reasons },
                    }
                }
            }
            Some(other) => ValidationOutcome::Rejected {
                reasons: reasons_from(other),
            },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            ValidationOutcome::Passed => &[],
            ValidationOutcome::Rejected { reasons } => reasons,
        }
    }

    /// Lift a rejection into [`ClientError::RemoteValidation`]
    pub fn into_result(self) -> Result<(), ClientError> {
        match self {
            ValidationOutcome::Passed => Ok(()),
            ValidationOutcome::Rejected { reasons } => Err(ClientError::RemoteValidation { reasons }),
        }
    }
}

fn reasons_from(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(reasons_from).collect(),
        other => vec![other.to_string()],
    }
}

/// A dataset directory on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Starting point for a step or pipeline, as offered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub execution_path: String,
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

/// One row of evaluation results; columns are backend-defined
pub type EvaluationRecord = serde_json::Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_into_data_success() {
        let env = envelope(json!({
            "isSuccess": true,
            "statusCode": 200,
            "message": "Get Run IDs Success",
            "data": ["run-a", "run-b"]
        }));

        let ids: Vec<String> = env.into_data().unwrap();
        assert_eq!(ids, vec!["run-a", "run-b"]);
    }

    #[test]
    fn test_into_data_failure_is_error_not_value() {
        let env = envelope(json!({
            "isSuccess": false,
            "statusCode": 500,
            "message": "Get Run IDs Failed",
            "data": "No run IDs found in the database."
        }));

        let err = env.into_data::<Vec<String>>().unwrap_err();
        match err {
            ClientError::Api { status, message, .. } => {
                assert_eq!(status, 500);
                assert!(message.contains("Get Run IDs Failed"));
                assert!(message.contains("No run IDs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_into_data_wrong_shape() {
        let env = envelope(json!({"isSuccess": true, "statusCode": 200, "message": "ok", "data": 42}));
        assert!(matches!(
            env.into_data::<Vec<String>>(),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_data_decodes_as_null() {
        let env = envelope(json!({"isSuccess": true, "statusCode": 200, "message": "ok"}));
        let data: Option<Value> = env.into_data().unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn test_validation_bool() {
        let passed = envelope(json!({"isSuccess": true, "statusCode": 200, "message": "m", "data": true}));
        assert!(ValidationOutcome::from_envelope(passed).is_passed());

        let rejected = envelope(json!({"isSuccess": true, "statusCode": 200, "message": "m", "data": false}));
        let outcome = ValidationOutcome::from_envelope(rejected);
        assert!(!outcome.is_passed());
        assert_eq!(outcome.reasons().len(), 1);
    }

    #[test]
    fn test_validation_failure_envelope_carries_backend_reason() {
        let env = envelope(json!({
            "isSuccess": false,
            "statusCode": 500,
            "message": "Config Validation Failed",
            "data": "missing key: params"
        }));

        let err = ValidationOutcome::from_envelope(env).into_result().unwrap_err();
        assert_eq!(err.validation_reasons(), Some(&["missing key: params".to_string()][..]));
    }

    #[test]
    fn test_validation_object_with_reasons() {
        let env = envelope(json!({
            "isSuccess": true,
            "statusCode": 200,
            "message": "Pipeline Validation Complete",
            "data": {"valid": false, "reasons": ["step 2: unknown method", "step 3: bad radius"]}
        }));

        let outcome = ValidationOutcome::from_envelope(env);
        assert_eq!(outcome.reasons(), ["step 2: unknown method", "step 3: bad radius"]);
    }

    #[test]
    fn test_dataset_entry() {
        let entries: Vec<DatasetEntry> = serde_json::from_value(json!([
            {"name": "tiles", "path": "dataset/tiles", "files": ["a.png", "b.png"]}
        ]))
        .unwrap();
        assert_eq!(entries[0].files.len(), 2);
    }
}
