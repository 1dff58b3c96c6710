//! Notion page, property and patch representations
//!
//! Properties arrive as `{"type": "<kind>", "<kind>": <payload>, ...}`.
//! They are decoded one at a time so a single malformed property never
//! prevents the rest of the page from being read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// A page (row) of a Notion database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NotionPage {
    /// Decode a single property; `None` if the page has no such property
    pub fn property(&self, name: &str) -> Option<Result<PropertyValue, ExtractionError>> {
        self.properties.get(name).map(PropertyValue::from_json)
    }

    /// Text of the page's title property, whatever it is named
    pub fn title(&self) -> Option<String> {
        self.properties.values().find_map(|raw| match PropertyValue::from_json(raw) {
            Ok(PropertyValue::Title(runs)) => Some(join_runs(&runs)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextRun {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// A decoded property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(Vec<RichTextRun>),
    RichText(Vec<RichTextRun>),
    Number(Option<serde_json::Number>),
    Select(Option<SelectOption>),
    Relation(Vec<RelationRef>),
    Date(Option<DateRange>),
    /// Any type the engine has no dedicated handling for
    Other { kind: String, text: Option<String> },
}

/// Failure to decode one property
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    MissingType,
    Malformed { kind: String, reason: String },
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::MissingType => write!(f, "property has no type tag"),
            ExtractionError::Malformed { kind, reason } => {
                write!(f, "malformed {} property: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

impl PropertyValue {
    pub fn from_json(raw: &Value) -> Result<Self, ExtractionError> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ExtractionError::MissingType)?;
        let payload = raw.get(kind).cloned().unwrap_or(Value::Null);

        let decoded = match kind {
            "title" => PropertyValue::Title(decode(kind, payload)?),
            "rich_text" => PropertyValue::RichText(decode(kind, payload)?),
            "number" => PropertyValue::Number(decode(kind, payload)?),
            "select" => PropertyValue::Select(decode(kind, payload)?),
            "relation" => PropertyValue::Relation(decode(kind, payload)?),
            "date" => PropertyValue::Date(decode(kind, payload)?),
            other => PropertyValue::Other {
                kind: other.to_string(),
                text: scalar_text(&payload)
                    .or_else(|| raw.get("plain_text").and_then(scalar_text)),
            },
        };

        Ok(decoded)
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ExtractionError> {
    serde_json::from_value(payload).map_err(|e| ExtractionError::Malformed {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Concatenate plain-text runs in order, no separator
pub fn join_runs(runs: &[RichTextRun]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

/// Declared property types of a database, keyed by property name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Title,
    RichText,
    Number,
    Select,
    Relation,
    Date,
    Other(String),
}

impl PropertyKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "title" => PropertyKind::Title,
            "rich_text" => PropertyKind::RichText,
            "number" => PropertyKind::Number,
            "select" => PropertyKind::Select,
            "relation" => PropertyKind::Relation,
            "date" => PropertyKind::Date,
            other => PropertyKind::Other(other.to_string()),
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::RichText => "rich_text",
            PropertyKind::Number => "number",
            PropertyKind::Select => "select",
            PropertyKind::Relation => "relation",
            PropertyKind::Date => "date",
            PropertyKind::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    pub properties: HashMap<String, PropertyKind>,
}

impl DatabaseSchema {
    pub fn new<N: Into<String>>(properties: impl IntoIterator<Item = (N, PropertyKind)>) -> Self {
        Self {
            properties: properties.into_iter().map(|(n, k)| (n.into(), k)).collect(),
        }
    }

    /// Build from a `GET /databases/{id}` response body
    pub fn from_json(raw: &Value) -> Self {
        let properties = raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(name, prop)| {
                        prop.get("type")
                            .and_then(Value::as_str)
                            .map(|tag| (name.clone(), PropertyKind::from_type_tag(tag)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { properties }
    }

    pub fn kind_of(&self, property: &str) -> Option<&PropertyKind> {
        self.properties.get(property)
    }
}

/// One value to write into a Notion property
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Title(String),
    RichText(String),
    Number(Option<serde_json::Number>),
    Select(Option<String>),
    Date(Option<String>),
}

impl PatchValue {
    pub fn plain_text(&self) -> String {
        match self {
            PatchValue::Title(s) | PatchValue::RichText(s) => s.clone(),
            PatchValue::Number(n) => n.as_ref().map(|n| n.to_string()).unwrap_or_default(),
            PatchValue::Select(s) | PatchValue::Date(s) => s.clone().unwrap_or_default(),
        }
    }

    pub fn to_notion_json(&self) -> Value {
        match self {
            PatchValue::Title(text) => json!({ "title": [{ "text": { "content": text } }] }),
            PatchValue::RichText(text) => json!({ "rich_text": [{ "text": { "content": text } }] }),
            PatchValue::Number(n) => json!({ "number": n }),
            PatchValue::Select(Some(name)) => json!({ "select": { "name": name } }),
            PatchValue::Select(None) => json!({ "select": null }),
            PatchValue::Date(Some(start)) => json!({ "date": { "start": start } }),
            PatchValue::Date(None) => json!({ "date": null }),
        }
    }
}

/// Property values to create or update a page with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub properties: Vec<(String, PatchValue)>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, property: &str) -> Option<&PatchValue> {
        self.properties
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// `properties` object for the create/update page endpoints
    pub fn to_notion_properties(&self) -> Value {
        let mut out = Map::with_capacity(self.properties.len());
        for (name, value) in &self.properties {
            out.insert(name.clone(), value.to_notion_json());
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_title_runs() {
        let raw = json!({
            "id": "title",
            "type": "title",
            "title": [{"plain_text": "Wid"}, {"plain_text": "get"}]
        });
        match PropertyValue::from_json(&raw).unwrap() {
            PropertyValue::Title(runs) => assert_eq!(join_runs(&runs), "Widget"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_null_select_and_date() {
        let select = PropertyValue::from_json(&json!({"type": "select", "select": null})).unwrap();
        assert_eq!(select, PropertyValue::Select(None));
        let date = PropertyValue::from_json(&json!({"type": "date", "date": null})).unwrap();
        assert_eq!(date, PropertyValue::Date(None));
    }

    #[test]
    fn test_malformed_payload_is_extraction_error() {
        let raw = json!({"type": "title", "title": "not-an-array"});
        assert!(matches!(
            PropertyValue::from_json(&raw),
            Err(ExtractionError::Malformed { .. })
        ));
        assert_eq!(
            PropertyValue::from_json(&json!({"title": []})),
            Err(ExtractionError::MissingType)
        );
    }

    #[test]
    fn test_unknown_kind_keeps_scalar_text() {
        let raw = json!({"type": "checkbox", "checkbox": true});
        assert_eq!(
            PropertyValue::from_json(&raw).unwrap(),
            PropertyValue::Other { kind: "checkbox".to_string(), text: Some("true".to_string()) }
        );
    }

    #[test]
    fn test_page_title_finds_title_property() {
        let page: NotionPage = serde_json::from_value(json!({
            "id": "p1",
            "properties": {
                "Qty": {"type": "number", "number": 2},
                "Project": {"type": "title", "title": [{"plain_text": "Alpha"}]}
            }
        }))
        .unwrap();
        assert_eq!(page.title().as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_schema_from_database_response() {
        let schema = DatabaseSchema::from_json(&json!({
            "object": "database",
            "properties": {
                "Name": {"id": "title", "type": "title", "title": {}},
                "Done": {"id": "x", "type": "checkbox", "checkbox": {}}
            }
        }));
        assert_eq!(schema.kind_of("Name"), Some(&PropertyKind::Title));
        assert_eq!(schema.kind_of("Done"), Some(&PropertyKind::Other("checkbox".to_string())));
    }

    #[test]
    fn test_patch_serialization() {
        let patch = RecordPatch {
            properties: vec![
                ("Name".to_string(), PatchValue::Title("Widget".to_string())),
                ("Status".to_string(), PatchValue::Select(None)),
            ],
        };
        let props = patch.to_notion_properties();
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "Widget");
        assert!(props["Status"]["select"].is_null());
    }
}
