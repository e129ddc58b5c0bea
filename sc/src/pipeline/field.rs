//! Form field types and coercion of textual input into typed parameter values

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::BuildError;

/// Largest magnitude at which every integer is exactly representable as f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Declared type of a form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
    List,
    /// Any type name the client does not know; values pass through untouched
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Str => "str",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::List => "list",
            FieldType::Other(name) => name,
        }
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "str" => FieldType::Str,
            "int" => FieldType::Int,
            "float" => FieldType::Float,
            "bool" => FieldType::Bool,
            "list" => FieldType::List,
            _ => FieldType::Other(name),
        }
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        FieldType::from(name.to_string())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user-entered parameter, exactly as the form produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Raw input; `None` and `""` both mean "not provided"
    #[serde(default, deserialize_with = "textual")]
    pub value: Option<String>,
}

impl FieldSpec {
    pub fn new(field: impl Into<String>, field_type: impl Into<FieldType>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            field_type: field_type.into(),
            value: Some(value.into()),
        }
    }

    /// A field the user left blank
    pub fn unset(field: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            field: field.into(),
            field_type: field_type.into(),
            value: None,
        }
    }

    /// The value, if one was actually entered
    pub fn provided_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Read a scalar form value as text
///
/// Strings, integers and booleans are taken as written. A non-integer
/// number is rejected: by the time it reaches here `1.0` and `1` (or `0.10`
/// and `0.1`) are indistinguishable, so the text the user typed is gone.
fn textual<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    Option::<Scalar>::deserialize(deserializer)?
        .map(|scalar| match scalar {
            Scalar::Text(text) => Ok(text),
            Scalar::Int(n) => Ok(n.to_string()),
            Scalar::UInt(n) => Ok(n.to_string()),
            Scalar::Bool(b) => Ok(b.to_string()),
            Scalar::Float(n) => Err(serde::de::Error::custom(format!(
                "numeric value {} must be quoted to keep its exact text, e.g. value: \"{}\"",
                n, n
            ))),
        })
        .transpose()
}

/// A decimal number as sent on the wire
///
/// Integral values serialize as JSON integers and not-a-number serializes
/// as `null`, matching what the backend receives from the web frontend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Numeric(pub f64);

impl Numeric {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let n = self.0;
        if n.is_nan() {
            serializer.serialize_none()
        } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            serializer.serialize_i64(n as i64)
        } else {
            serializer.serialize_f64(n)
        }
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(Numeric),
    Bool(bool),
    List(Vec<Numeric>),
    /// Value of an unrecognized field type, passed through as entered
    Raw(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) | ParamValue::Raw(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(n) => Some(n.value()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Numeric]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Coerce one field into its typed value
///
/// Returns `Ok(None)` when the field was left blank, so the backend can apply
/// its own default. Every typed conversion fails fast on bad input, except
/// that an empty `list` segment becomes a not-a-number element.
pub fn coerce(spec: &FieldSpec) -> Result<Option<ParamValue>, BuildError> {
    debug!(field = %spec.field, field_type = %spec.field_type, "coerce: called");
    let Some(raw) = spec.provided_value() else {
        debug!(field = %spec.field, "coerce: no value, omitting");
        return Ok(None);
    };

    let value = match &spec.field_type {
        FieldType::Str => ParamValue::Str(raw.to_string()),
        FieldType::Int => ParamValue::Int(parse_int(raw).map_err(|reason| coercion_error(spec, raw, reason))?),
        FieldType::Float => ParamValue::Float(Numeric(
            parse_decimal(raw).map_err(|reason| coercion_error(spec, raw, reason))?,
        )),
        FieldType::Bool => ParamValue::Bool(raw == "true"),
        FieldType::List => ParamValue::List(parse_list(raw).map_err(|reason| coercion_error(spec, raw, reason))?),
        FieldType::Other(name) => {
            debug!(field = %spec.field, type_name = %name, "coerce: unrecognized type, passing through");
            ParamValue::Raw(raw.to_string())
        }
    };

    Ok(Some(value))
}

fn coercion_error(spec: &FieldSpec, raw: &str, reason: String) -> BuildError {
    debug!(field = %spec.field, %reason, "coerce: rejected value");
    BuildError::Coercion {
        step: None,
        field: spec.field.clone(),
        field_type: spec.field_type.to_string(),
        value: raw.to_string(),
        reason,
    }
}

fn parse_int(raw: &str) -> Result<i64, String> {
    let text = raw.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Ok(n);
    }

    // "5.0" is still an integer as far as the form is concerned
    let n = parse_decimal(text)?;
    if n.fract() != 0.0 {
        return Err("not a whole number".to_string());
    }
    if n.abs() > MAX_SAFE_INTEGER {
        return Err("out of range".to_string());
    }
    Ok(n as i64)
}

fn parse_decimal(raw: &str) -> Result<f64, String> {
    let n = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !n.is_finite() {
        return Err("not a finite number".to_string());
    }
    Ok(n)
}

fn parse_list(raw: &str) -> Result<Vec<Numeric>, String> {
    raw.split(',')
        .enumerate()
        .map(|(i, segment)| {
            let segment = segment.trim();
            if segment.is_empty() {
                debug!(position = i, "parse_list: empty segment, keeping as NaN");
                return Ok(Numeric(f64::NAN));
            }
            parse_decimal(segment)
                .map(Numeric)
                .map_err(|reason| format!("item {} '{}': {}", i + 1, segment, reason))
        })
        .collect()
}
