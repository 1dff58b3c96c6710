//! Row-level filter evaluation and translation to Notion's filter syntax

use serde_json::{Value, json};
use tracing::warn;

use crate::models::notion::{DatabaseSchema, PropertyKind};
use crate::models::sheets::SheetRow;
use crate::models::sync::{FieldMapping, FilterCondition, FilterOperator, FilterSet};

/// True iff the row satisfies every condition (case-insensitive).
///
/// Stops at the first failing condition. A column missing from the row
/// compares as the empty string.
pub fn matches(row: &SheetRow, filters: &FilterSet) -> bool {
    filters.iter().all(|(field, condition)| {
        let field_value = row.get(field).map(String::as_str).unwrap_or("");
        condition_holds(field_value, condition)
    })
}

fn condition_holds(field_value: &str, condition: &FilterCondition) -> bool {
    let field_value = field_value.to_lowercase();
    let expected = condition.value.to_lowercase();

    match condition.operator {
        FilterOperator::Equals => field_value == expected,
        FilterOperator::Contains => field_value.contains(&expected),
        FilterOperator::NotEmpty => !field_value.trim().is_empty(),
    }
}

/// Single property condition in Notion's filter syntax.
///
/// Returns `None` for combinations Notion cannot express (e.g. `contains` on
/// a number) or values that do not fit the property type.
pub fn property_condition(property: &str, kind: &PropertyKind, condition: &FilterCondition) -> Option<Value> {
    let key = match kind {
        PropertyKind::Title => "title",
        PropertyKind::Number => "number",
        PropertyKind::Select => "select",
        PropertyKind::Date => "date",
        PropertyKind::Relation => "relation",
        PropertyKind::RichText | PropertyKind::Other(_) => "rich_text",
    };

    let body = match (condition.operator, kind) {
        (FilterOperator::NotEmpty, _) => json!({ "is_not_empty": true }),
        (FilterOperator::Equals, PropertyKind::Number) => {
            let number: serde_json::Number = condition.value.trim().parse().ok()?;
            json!({ "equals": number })
        }
        (FilterOperator::Equals, PropertyKind::Relation) => return None,
        (FilterOperator::Equals, _) => json!({ "equals": condition.value }),
        (FilterOperator::Contains, PropertyKind::Title | PropertyKind::RichText | PropertyKind::Other(_)) => {
            json!({ "contains": condition.value })
        }
        (FilterOperator::Contains, _) => return None,
    };

    let mut filter = serde_json::Map::new();
    filter.insert("property".to_string(), json!(property));
    filter.insert(key.to_string(), body);
    Some(Value::Object(filter))
}

/// Query filter for Notion plus the conditions it could not carry.
///
/// `residual` is keyed by sheet column and must be applied to the built
/// rows with [`matches`] before they are written.
#[derive(Debug, Clone, Default)]
pub struct NotionFilter {
    pub native: Option<Value>,
    pub residual: FilterSet,
}

/// Translate a filter set into a Notion query filter.
///
/// Keys naming a mapped sheet column are translated to their Notion
/// property; other keys are taken as property names. Property types come
/// from `schema` and default to rich text. Conditions Notion cannot express
/// are moved to the residual set.
pub fn to_notion_filter(filters: &FilterSet, mapping: &FieldMapping, schema: &DatabaseSchema) -> NotionFilter {
    let mut native: Vec<Value> = Vec::new();
    let mut residual: Vec<(String, FilterCondition)> = Vec::new();

    for (field, condition) in filters.iter() {
        let property = mapping.property_for_column(field).unwrap_or(field);
        let kind = schema.kind_of(property).cloned().unwrap_or(PropertyKind::RichText);
        match property_condition(property, &kind, condition) {
            Some(translated) => native.push(translated),
            None => {
                let column = mapping
                    .iter()
                    .find(|(p, _)| *p == property)
                    .map(|(_, c)| c)
                    .unwrap_or(field);
                warn!(
                    property = %property,
                    kind = %kind.type_tag(),
                    operator = ?condition.operator,
                    column = %column,
                    "Filter cannot be expressed as a Notion filter, applying it to rows"
                );
                residual.push((column.to_string(), condition.clone()));
            }
        }
    }

    let native = match native.len() {
        0 => None,
        1 => native.pop(),
        _ => Some(json!({ "and": native })),
    };
    NotionFilter {
        native,
        residual: FilterSet::new(residual),
    }
}
