use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Creation time as delivered by the report: epoch millis as a string, an
/// integer or a float. Any other JSON value is kept but carries no time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedTime {
    Millis(i64),
    Float(f64),
    Text(String),
    Other(Value),
}

impl CreatedTime {
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            CreatedTime::Millis(ms) => Some(*ms),
            CreatedTime::Float(ms) if ms.is_finite() => Some(ms.trunc() as i64),
            CreatedTime::Float(_) => None,
            CreatedTime::Text(text) => {
                let text = text.trim();
                text.parse::<i64>().ok().or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|ms| ms.is_finite())
                        .map(|ms| ms.trunc() as i64)
                })
            }
            CreatedTime::Other(_) => None,
        }
    }
}

/// Dataframe cells holding ids or labels may come through as numbers
fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            debug!("Ignoring non-text cell {}", other);
            None
        }
    }
}

fn required_cell<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    cell_text(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("ID must be a string or a number"))
}

fn optional_cell<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(cell_text(Value::deserialize(deserializer)?))
}

/// One workspace item as it appears in the record dataframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "ID", deserialize_with = "required_cell")]
    pub id: String,
    #[serde(
        rename = "TEXT",
        default,
        deserialize_with = "optional_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
    #[serde(
        rename = "TYPE",
        default,
        deserialize_with = "optional_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_type: Option<String>,
    #[serde(rename = "CREATED_TIME", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<CreatedTime>,
    #[serde(
        rename = "PARENT_ID",
        default,
        deserialize_with = "optional_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            record_type: None,
            created_time: None,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    pub fn with_created_millis(mut self, millis: i64) -> Self {
        self.created_time = Some(CreatedTime::Text(millis.to_string()));
        self
    }

    /// Parent reference, with an empty string treated as no parent
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }
}

/// Workspace-wide counters, keyed by upper-snake-case name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAggregateStats(pub BTreeMap<String, Value>);

impl RawAggregateStats {
    pub fn with_counter(mut self, name: &str, value: u64) -> Self {
        self.0.insert(name.to_string(), Value::from(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// A batch of report output: the record dataframe plus the optional
/// aggregate dataframe. Also the on-disk shape of an export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportBatch {
    #[serde(default)]
    pub dataframe_2: Vec<RawRecord>,
    #[serde(default)]
    pub dataframe_3: Option<RawAggregateStats>,
}

impl ExportBatch {
    pub fn new(records: Vec<RawRecord>, stats: Option<RawAggregateStats>) -> Self {
        Self {
            dataframe_2: records,
            dataframe_3: stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_time_accepts_string_and_number() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ID":"a","CREATED_TIME":"1700000000000"}"#).unwrap();
        assert_eq!(record.created_time.unwrap().as_millis(), Some(1_700_000_000_000));

        let record: RawRecord =
            serde_json::from_str(r#"{"ID":"b","CREATED_TIME":1700000000000}"#).unwrap();
        assert_eq!(record.created_time.unwrap().as_millis(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_unparsable_created_time_has_no_millis() {
        let time = CreatedTime::Text("yesterday".to_string());
        assert_eq!(time.as_millis(), None);
    }

    #[test]
    fn test_float_created_time_is_accepted() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ID":"b","CREATED_TIME":1700000000000.0}"#).unwrap();
        assert_eq!(record.created_time.unwrap().as_millis(), Some(1_700_000_000_000));

        let record: RawRecord =
            serde_json::from_str(r#"{"ID":"c","CREATED_TIME":"1700000000000.0"}"#).unwrap();
        assert_eq!(record.created_time.unwrap().as_millis(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_odd_created_time_does_not_fail_the_record() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ID":"d","CREATED_TIME":true}"#).unwrap();
        assert_eq!(record.created_time.unwrap().as_millis(), None);
    }

    #[test]
    fn test_numeric_ids_become_strings() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ID":7,"PARENT_ID":42,"TEXT":null,"TYPE":false}"#).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.parent(), Some("42"));
        assert_eq!(record.text, None);
        assert_eq!(record.record_type, None);
    }

    #[test]
    fn test_record_without_usable_id_is_rejected() {
        assert!(serde_json::from_str::<RawRecord>(r#"{"ID":null}"#).is_err());
        assert!(serde_json::from_str::<RawRecord>(r#"{"TEXT":"no id"}"#).is_err());
    }

    #[test]
    fn test_batch_with_mixed_cell_types_parses() {
        let batch: ExportBatch = serde_json::from_str(
            r#"{"dataframe_2":[
                {"ID":"root","CREATED_TIME":"1700000000000"},
                {"ID":2,"PARENT_ID":"root","CREATED_TIME":1700000000000.0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(batch.dataframe_2.len(), 2);
        assert_eq!(batch.dataframe_2[1].id, "2");
    }

    #[test]
    fn test_empty_parent_is_no_parent() {
        let record = RawRecord::new("a").with_parent("");
        assert_eq!(record.parent(), None);
        let record = RawRecord::new("a").with_parent("root");
        assert_eq!(record.parent(), Some("root"));
    }

    #[test]
    fn test_export_batch_defaults_missing_frames() {
        let batch: ExportBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.dataframe_2.is_empty());
        assert!(batch.dataframe_3.is_none());
    }
}
