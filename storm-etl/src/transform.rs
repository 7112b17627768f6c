use common_types::{DecodeError, StormReport};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    // Spreadsheet exports upstream sometimes ship their column header row as a message
    #[error("payload is a header row")]
    HeaderRowDetected,
    #[error("malformed storm report: {0}")]
    MalformedRecord(#[from] DecodeError),
    #[error("failed to encode storm report: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransformError {
    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransformError::HeaderRowDetected => "header_row",
            TransformError::MalformedRecord(_) => "malformed",
            TransformError::Encode(_) => "encode",
        }
    }
}

/// Turn a raw producer payload into the canonical bytes published on the processed topic.
pub fn transform(payload: &[u8]) -> Result<Vec<u8>, TransformError> {
    let report = parse(payload)?;
    Ok(report.encode()?)
}

/// Decode a raw payload, rejecting header rows before any field conversion.
pub fn parse(payload: &[u8]) -> Result<StormReport, TransformError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(DecodeError::NotAnObject.into());
    };

    if is_header_row(&map) {
        return Err(TransformError::HeaderRowDetected);
    }

    Ok(StormReport::from_map(&map)?)
}

fn is_header_row(map: &Map<String, Value>) -> bool {
    ["Time", "time"].iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|v| v.eq_ignore_ascii_case("time"))
    })
}
