// Workspace records and aggregate counters

use canopy_stream::{RawAggregateStats, RawRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Page,
    Collection,
    LinkedDatabase,
    Template,
    Other,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Page => "page",
            RecordType::Collection => "collection",
            RecordType::LinkedDatabase => "linked_database",
            RecordType::Template => "template",
            RecordType::Other => "other",
        }
    }

    /// Missing or blank types default to a page
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|t| t.trim().to_lowercase()) {
            None => RecordType::Page,
            Some(t) => match t.as_str() {
                "" | "page" => RecordType::Page,
                "collection" => RecordType::Collection,
                "linked_database" => RecordType::LinkedDatabase,
                "template" => RecordType::Template,
                _ => RecordType::Other,
            },
        }
    }

    pub fn is_database(&self) -> bool {
        matches!(self, RecordType::Collection | RecordType::LinkedDatabase)
    }
}

/// One workspace item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub created_time: Option<DateTime<Utc>>,
    pub parent_id: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNTITLED.to_string(),
            record_type: RecordType::Page,
            created_time: None,
            parent_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_created_time(mut self, created_time: DateTime<Utc>) -> Self {
        self.created_time = Some(created_time);
        self
    }
}

impl From<&RawRecord> for Record {
    fn from(raw: &RawRecord) -> Self {
        let title = raw
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        let created_time = raw.created_time.as_ref().and_then(|t| {
            let parsed = t.as_millis().and_then(DateTime::from_timestamp_millis);
            if parsed.is_none() {
                debug!("Ignoring unparsable created time {:?} on {}", t, raw.id);
            }
            parsed
        });

        Self {
            id: raw.id.clone(),
            title,
            record_type: RecordType::parse(raw.record_type.as_deref()),
            created_time,
            parent_id: raw.parent().map(str::to_string),
        }
    }
}

/// Workspace-wide counters produced once per analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub members: u64,
    pub guests: u64,
    pub teamspaces: u64,
    pub integrations: u64,
    pub bots: u64,
}

impl AggregateStats {
    pub const MEMBERS: &'static str = "TOTAL_NUM_MEMBERS";
    pub const GUESTS: &'static str = "TOTAL_NUM_GUESTS";
    pub const TEAMSPACES: &'static str = "TOTAL_NUM_TEAMSPACES";
    pub const INTEGRATIONS: &'static str = "TOTAL_NUM_INTEGRATIONS";
    pub const BOTS: &'static str = "TOTAL_NUM_BOTS";
}

impl From<&RawAggregateStats> for AggregateStats {
    fn from(raw: &RawAggregateStats) -> Self {
        let counter = |name: &str| raw.get(name).and_then(counter_value).unwrap_or(0);
        Self {
            members: counter(Self::MEMBERS),
            guests: counter(Self::GUESTS),
            teamspaces: counter(Self::TEAMSPACES),
            integrations: counter(Self::INTEGRATIONS),
            bots: counter(Self::BOTS),
        }
    }
}

/// Numbers and numeric strings count; anything else is treated as absent
fn counter_value(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 0.0 {
        Some(n.round() as u64)
    } else {
        None
    }
}
