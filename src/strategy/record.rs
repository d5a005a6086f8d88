use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Control-plane identifier; numeric in practice but text is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategyId {
    Number(i64),
    Text(String),
}

impl StrategyId {
    pub fn is_empty(&self) -> bool {
        match self {
            StrategyId::Number(_) => false,
            StrategyId::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyId::Number(n) => write!(f, "{}", n),
            StrategyId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for StrategyId {
    fn from(value: i64) -> Self {
        StrategyId::Number(value)
    }
}

/// One entry of the active-strategy catalog, as received.
///
/// Every field is optional here; completeness is checked by
/// [`StrategyValidator`](super::StrategyValidator).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StrategyRecord {
    #[serde(default)]
    pub id: Option<StrategyId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "python_file_path", alias = "script_path")]
    pub executable_path: Option<PathBuf>,
    /// `Some(Value::Null)` when the key is present with a null value
    #[serde(default, alias = "params", deserialize_with = "present")]
    pub parameters: Option<Value>,
    /// Set when the catalog entry could not be read as a record
    #[serde(skip)]
    pub malformed: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl StrategyRecord {
    /// Read one catalog entry. An entry with wrongly typed fields still yields
    /// a record, carrying the decode error and whatever id and name it had.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<StrategyRecord>(value.clone()) {
            Ok(record) => record,
            Err(e) => Self {
                id: value
                    .get("id")
                    .and_then(|id| StrategyId::deserialize(id).ok()),
                name: value.get("name").and_then(Value::as_str).map(str::to_string),
                malformed: Some(e.to_string()),
                ..Default::default()
            },
        }
    }

    /// Label for log lines, usable before validation
    pub fn label(&self) -> String {
        let id = self
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match &self.name {
            Some(name) => format!("{} (ID: {})", name, id),
            None => format!("ID: {}", id),
        }
    }
}

/// A record that passed validation; the only form the executor accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStrategy {
    pub id: StrategyId,
    pub name: String,
    pub executable_path: PathBuf,
    /// Structured parameters, never a JSON string
    pub parameters: Value,
}

impl ValidatedStrategy {
    /// Parameters as compact JSON text for the job environment
    pub fn parameters_json(&self) -> String {
        self.parameters.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn runner_field_names() {
        let record: StrategyRecord = serde_json::from_value(json!({
            "id": 1,
            "name": "MA-Cross",
            "python_file_path": "/srv/strategies/ma.py",
            "parameters": {"symbol": "SBIN-EQ"}
        }))
        .unwrap();

        assert_eq!(record.id, Some(StrategyId::Number(1)));
        assert_eq!(record.executable_path, Some(PathBuf::from("/srv/strategies/ma.py")));
        assert_eq!(record.parameters, Some(json!({"symbol": "SBIN-EQ"})));
    }

    #[test]
    fn control_plane_field_names_and_extras() {
        let record: StrategyRecord = serde_json::from_value(json!({
            "id": "s-7",
            "name": "Breakout",
            "script_path": "/var/app/storage/strategies/b.py",
            "params": "{\"quantity\": 2}",
            "user_id": 3,
            "last_modified": 1721500000,
            "file_size": 2048
        }))
        .unwrap();

        assert_eq!(record.id, Some(StrategyId::Text("s-7".to_string())));
        assert_eq!(record.parameters, Some(json!("{\"quantity\": 2}")));
        assert_eq!(record.label(), "Breakout (ID: s-7)");
    }

    #[test]
    fn null_parameters_differ_from_missing() {
        let with_null: StrategyRecord =
            serde_json::from_value(json!({"id": 1, "parameters": null})).unwrap();
        let missing: StrategyRecord = serde_json::from_value(json!({"id": 1})).unwrap();

        assert_eq!(with_null.parameters, Some(Value::Null));
        assert_eq!(missing.parameters, None);
        assert_eq!(missing.label(), "ID: 1");
    }

    #[test]
    fn wrongly_typed_entry_keeps_its_label() {
        let record = StrategyRecord::from_value(json!({
            "id": 2,
            "name": "Breakout",
            "script_path": 42,
            "parameters": {}
        }));
        assert!(record.malformed.as_deref().unwrap().contains("invalid type"));
        assert_eq!(record.executable_path, None);
        assert_eq!(record.label(), "Breakout (ID: 2)");

        let record = StrategyRecord::from_value(json!({"id": 1.5, "name": 12345}));
        assert!(record.malformed.is_some());
        assert_eq!(record.label(), "ID: unknown");

        let record = StrategyRecord::from_value(json!("not an object"));
        assert!(record.malformed.is_some());

        let record = StrategyRecord::from_value(json!({"id": 3, "name": "Fine"}));
        assert_eq!(record.malformed, None);
    }
}
