//! Point-in-time checks on a catalog record before it may be executed.

use serde_json::Value;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use super::record::{StrategyRecord, ValidatedStrategy};
use crate::error::ValidationError;

/// Checks structural completeness and executability of catalog records
#[derive(Debug, Clone, Default)]
pub struct StrategyValidator;

impl StrategyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a record. A failure skips only this strategy.
    pub fn validate(&self, record: &StrategyRecord) -> Result<ValidatedStrategy, ValidationError> {
        if let Some(reason) = &record.malformed {
            return Err(ValidationError::MalformedRecord(reason.clone()));
        }

        let id = record
            .id
            .clone()
            .ok_or(ValidationError::MissingField("id"))?;
        if id.is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }

        let name = record
            .name
            .clone()
            .ok_or(ValidationError::MissingField("name"))?;

        let executable_path = record
            .executable_path
            .clone()
            .ok_or(ValidationError::MissingField("executable_path"))?;
        if executable_path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField("executable_path"));
        }

        let raw_parameters = record
            .parameters
            .as_ref()
            .ok_or(ValidationError::MissingField("parameters"))?;

        check_executable(&executable_path)?;
        let parameters = normalize_parameters(raw_parameters)?;

        Ok(ValidatedStrategy {
            id,
            name,
            executable_path,
            parameters,
        })
    }
}

fn check_executable(path: &Path) -> Result<(), ValidationError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ValidationError::ExecutableNotFound(path.to_path_buf()),
        _ => ValidationError::ExecutableInaccessible {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    if !metadata.is_file() {
        return Err(ValidationError::ExecutableNotAFile(path.to_path_buf()));
    }

    File::open(path).map_err(|e| ValidationError::ExecutableInaccessible {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Serialized text is parsed; null becomes an empty object.
fn normalize_parameters(raw: &Value) -> Result<Value, ValidationError> {
    match raw {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| ValidationError::InvalidParameters(e.to_string())),
        other => Ok(other.clone()),
    }
}
