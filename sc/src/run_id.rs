//! Run identifiers
//!
//! A run id tags one pipeline submission so its results can be looked up
//! later. Callers may pick their own; generated ids use the format
//! `{6-char-hex}-run-{slug}`, e.g. `019430-run-jpeg-sweep`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::ClientError;

/// Caller-supplied tag correlating a run with its results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Wrap an existing id; it must not be blank
    pub fn new(id: impl Into<String>) -> Result<Self, ClientError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ClientError::InvalidRunId("run id is empty".to_string()));
        }
        if id.chars().any(char::is_control) {
            return Err(ClientError::InvalidRunId(format!("run id {:?} contains control characters", id)));
        }
        Ok(Self(id))
    }

    /// Generate a fresh id, optionally labelled
    pub fn generate(label: Option<&str>) -> Self {
        // low bits of a v7 uuid are random; the high bits are a coarse timestamp
        let hex = uuid::Uuid::now_v7().simple().to_string();
        let hex_prefix = &hex[hex.len() - 6..];
        let slug = label.map(slugify).filter(|s| !s.is_empty());
        match slug {
            Some(slug) => Self(format!("{}-run-{}", hex_prefix, slug)),
            None => Self(format!("{}-run", hex_prefix)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the hex prefix of a generated id
    pub fn hex_prefix(&self) -> Option<&str> {
        let prefix = self.0.get(..6)?;
        prefix.chars().all(|c| c.is_ascii_hexdigit()).then_some(prefix)
    }
}

/// Slugify a label for use in ids
fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = ClientError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RunId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("JPEG Sweep"), "jpeg-sweep");
        assert_eq!(slugify("  quality=90 / webp  "), "quality-90-webp");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_generate_with_label() {
        let id = RunId::generate(Some("JPEG Sweep"));
        assert!(id.as_str().ends_with("-run-jpeg-sweep"), "got {id}");
        assert!(id.hex_prefix().is_some());
    }

    #[test]
    fn test_generate_without_label() {
        let id = RunId::generate(None);
        assert!(id.as_str().ends_with("-run"));
        assert_eq!(id.as_str().len(), 10);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RunId::generate(Some("x"));
        let b = RunId::generate(Some("x"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_blank() {
        assert!(RunId::new("").is_err());
        assert!(RunId::new("   ").is_err());
        assert!(RunId::new("a\nb").is_err());
        assert_eq!(RunId::new("my-run").unwrap().as_str(), "my-run");
    }

    #[test]
    fn test_serializes_as_string() {
        let id = RunId::new("run-7").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"run-7\"");
    }

    #[test]
    fn test_deserialize_validates() {
        let id: RunId = serde_json::from_str("\"run-7\"").unwrap();
        assert_eq!(id.as_str(), "run-7");

        assert!(serde_json::from_str::<RunId>("\"\"").is_err());
        assert!(serde_json::from_str::<RunId>("\"  \"").is_err());
        assert!(serde_json::from_str::<RunId>("\"a\\nb\"").is_err());
    }
}
