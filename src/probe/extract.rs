use thiserror::Error;
use tracing::debug;

use crate::record::NA;

/// Why a single field could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("element #{0} not found")]
    ElementNotFound(String),

    #[error("payload field {0} missing")]
    FieldMissing(&'static str),

    #[error("no matching response captured before the timeout")]
    CaptureTimeout,

    #[error("request timing was not observed")]
    TimingUnavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of extracting one field.
pub type Extracted = Result<String, ExtractError>;

/// Fold one extraction into the recorded value: the value itself, or the
/// sentinel with a debug note. Every measured field goes through this, which
/// is what keeps partial failures local to a single field.
pub fn or_na(field: &'static str, value: Extracted) -> String {
    match value {
        Ok(v) => v,
        Err(e) => {
            debug!(field, error = %e, "field unavailable, recording sentinel");
            NA.to_string()
        }
    }
}

/// Look up a payload field and render it as the recorded string.
///
/// Strings are recorded verbatim; numbers and booleans are recorded in their
/// JSON form. An absent body, an absent key, or an explicit null all count
/// as missing.
pub fn json_field(body: Option<&serde_json::Value>, key: &'static str) -> Extracted {
    let value = body
        .and_then(|b| b.get(key))
        .ok_or(ExtractError::FieldMissing(key))?;

    match value {
        serde_json::Value::Null => Err(ExtractError::FieldMissing(key)),
        serde_json::Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}
