//! Sync configuration domain types
//!
//! `SyncConfiguration` is the validated, immutable snapshot a run works on.
//! It is parsed out of a `syncs` row; anything the engine cannot interpret
//! (unknown direction, unknown filter operator, empty mapping) is rejected
//! here before a run starts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::syncs;
use crate::services::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    NotionToSheets,
    SheetsToNotion,
    Both,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::NotionToSheets => "notion_to_sheets",
            SyncDirection::SheetsToNotion => "sheets_to_notion",
            SyncDirection::Both => "both",
        }
    }

    pub fn includes_notion_to_sheets(&self) -> bool {
        matches!(self, SyncDirection::NotionToSheets | SyncDirection::Both)
    }

    pub fn includes_sheets_to_notion(&self) -> bool {
        matches!(self, SyncDirection::SheetsToNotion | SyncDirection::Both)
    }
}

impl FromStr for SyncDirection {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notion_to_sheets" => Ok(SyncDirection::NotionToSheets),
            "sheets_to_notion" => Ok(SyncDirection::SheetsToNotion),
            "both" => Ok(SyncDirection::Both),
            other => Err(SyncError::Validation(format!("unknown sync direction '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Realtime,
    Hourly,
    Daily,
    Weekly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Realtime,
        Frequency::Hourly,
        Frequency::Daily,
        Frequency::Weekly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Realtime => "realtime",
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// Minimum time between two scheduled runs
    pub fn min_interval(&self) -> Duration {
        match self {
            Frequency::Realtime => Duration::minutes(5),
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::weeks(1),
        }
    }

    /// True if a sync last run at `last_sync` should run again at `now`
    pub fn is_due(&self, last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_sync {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.min_interval(),
        }
    }
}

impl FromStr for Frequency {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" => Ok(Frequency::Realtime),
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(SyncError::Validation(format!("unknown frequency '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Active,
    Paused,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Active => "active",
            SyncStatus::Paused => "paused",
            SyncStatus::Error => "error",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SyncStatus::Active),
            "paused" => Ok(SyncStatus::Paused),
            "error" => Ok(SyncStatus::Error),
            other => Err(SyncError::Validation(format!("unknown sync status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    Contains,
    NotEmpty,
}

impl FromStr for FilterOperator {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(FilterOperator::Equals),
            "contains" => Ok(FilterOperator::Contains),
            "not_empty" => Ok(FilterOperator::NotEmpty),
            other => Err(SyncError::Validation(format!("unknown filter operator '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCondition {
    pub operator: FilterOperator,
    pub value: String,
}

/// Field name -> condition, evaluated with AND semantics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    conditions: Vec<(String, FilterCondition)>,
}

impl FilterSet {
    pub fn new(conditions: Vec<(String, FilterCondition)>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterCondition)> {
        self.conditions.iter().map(|(field, cond)| (field.as_str(), cond))
    }

    /// Parse the stored JSON shape `{"field": {"operator": "...", "value": ...}}`.
    ///
    /// `null` means no filters. A missing operator defaults to `equals`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SyncError> {
        let object = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(map) => map,
            _ => return Err(SyncError::Validation("filters must be an object".to_string())),
        };

        let mut conditions = Vec::with_capacity(object.len());
        for (field, raw) in object {
            let operator = match raw.get("operator") {
                None | Some(serde_json::Value::Null) => FilterOperator::Equals,
                Some(serde_json::Value::String(op)) => op.parse()?,
                Some(other) => {
                    return Err(SyncError::Validation(format!(
                        "filter operator for '{}' must be a string, got {}",
                        field, other
                    )));
                }
            };
            let value = match raw.get("value") {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            conditions.push((field.clone(), FilterCondition { operator, value }));
        }

        Ok(Self { conditions })
    }
}

/// Ordered Notion property -> sheet column correspondence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pairs: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn new<P, C>(pairs: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(p, c)| (p.into(), c.into())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// (notion property, sheet column) in mapping order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Sheet columns in mapping order; used as the header row
    pub fn columns(&self) -> Vec<String> {
        self.pairs.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Notion property that a sheet column is mapped from
    pub fn property_for_column(&self, column: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, c)| c == column)
            .map(|(p, _)| p.as_str())
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, SyncError> {
        let object = value
            .as_object()
            .ok_or_else(|| SyncError::Validation("mapping must be an object".to_string()))?;

        let mut pairs = Vec::with_capacity(object.len());
        for (property, column) in object {
            let column = column.as_str().ok_or_else(|| {
                SyncError::Validation(format!("mapping for '{}' must be a column name", property))
            })?;
            pairs.push((property.clone(), column.to_string()));
        }

        Ok(Self { pairs })
    }
}

/// Validated snapshot of one sync configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfiguration {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub notion_database_id: String,
    pub sheet_id: String,
    pub mapping: FieldMapping,
    pub filters: FilterSet,
    pub key_field: Option<String>,
    pub direction: SyncDirection,
    pub frequency: Frequency,
    pub status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
}

impl TryFrom<syncs::Model> for SyncConfiguration {
    type Error = SyncError;

    fn try_from(model: syncs::Model) -> Result<Self, Self::Error> {
        let mapping = FieldMapping::from_json(&model.mapping)?;
        if mapping.is_empty() {
            return Err(SyncError::Validation("mapping is empty".to_string()));
        }
        if model.notion_database_id.trim().is_empty() || model.sheet_id.trim().is_empty() {
            return Err(SyncError::Validation(
                "notion_database_id and sheet_id are required".to_string(),
            ));
        }

        let direction: SyncDirection = model.sync_direction.parse()?;
        let key_field = model.key_field.filter(|k| !k.trim().is_empty());
        validate_key_field(direction, key_field.as_deref(), &mapping)?;

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            notion_database_id: model.notion_database_id,
            sheet_id: model.sheet_id,
            mapping,
            filters: FilterSet::from_json(&model.filters)?,
            key_field,
            direction,
            frequency: model.frequency.parse()?,
            status: model.status.parse()?,
            last_sync: model.last_sync.map(|t| t.with_timezone(&Utc)),
        })
    }
}

/// Directions that write to Notion upsert on `key_field`, which must be a
/// mapped Notion property.
pub fn validate_key_field(
    direction: SyncDirection,
    key_field: Option<&str>,
    mapping: &FieldMapping,
) -> Result<(), SyncError> {
    if !direction.includes_sheets_to_notion() {
        return Ok(());
    }
    let Some(key_field) = key_field.map(str::trim).filter(|k| !k.is_empty()) else {
        return Err(SyncError::Validation(format!(
            "key_field is required for direction '{}'",
            direction.as_str()
        )));
    };
    if !mapping.iter().any(|(property, _)| property == key_field) {
        return Err(SyncError::Validation(format!(
            "key_field '{}' is not a mapped Notion property",
            key_field
        )));
    }
    Ok(())
}

/// OAuth tokens of the configuration's owner, captured with the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub notion_access_token: Option<String>,
    pub google_access_token: Option<String>,
}

impl Credentials {
    pub fn notion(&self) -> Result<&str, SyncError> {
        self.notion_access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("Notion account is not connected".to_string()))
    }

    pub fn google(&self) -> Result<&str, SyncError> {
        self.google_access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("Google account is not connected".to_string()))
    }
}

/// Result of the trigger contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// "success" or "error"
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<u64>,
}

impl RunOutcome {
    pub fn success(rows_processed: u64) -> Self {
        Self {
            status: "success".to_string(),
            message: "Sync completed successfully".to_string(),
            rows_processed: Some(rows_processed),
        }
    }

    pub fn error(err: &SyncError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.to_string(),
            rows_processed: None,
        }
    }
}

/// POST /sync/create body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSyncRequest {
    pub user_id: i32,
    pub name: String,
    pub notion_database_id: String,
    pub sheet_id: String,
    #[serde(default)]
    pub mapping: serde_json::Value,
    #[serde(default)]
    pub filters: serde_json::Value,
    #[serde(default)]
    pub key_field: Option<String>,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_direction")]
    pub sync_direction: String,
}

fn default_frequency() -> String {
    Frequency::Daily.as_str().to_string()
}

fn default_direction() -> String {
    SyncDirection::Both.as_str().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSyncResponse {
    pub id: i32,
    pub message: String,
}
