//! Field transformer between Notion pages and sheet rows
//!
//! Both directions are pure with respect to their inputs: the same page (or
//! row) and mapping always produce the same output. A property that fails to
//! decode becomes an empty cell rather than failing the record.

use tracing::warn;

use crate::models::notion::{
    DatabaseSchema, NotionPage, PatchValue, PropertyKind, PropertyValue, RecordPatch, join_runs,
};
use crate::models::sheets::SheetRow;
use crate::models::sync::FieldMapping;
use crate::services::relation_resolver::RelationResolver;

/// Text for any non-relation property value
pub fn extract_text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Title(runs) | PropertyValue::RichText(runs) => join_runs(runs),
        PropertyValue::Number(number) => number.as_ref().map(|n| n.to_string()).unwrap_or_default(),
        PropertyValue::Select(option) => option.as_ref().map(|o| o.name.clone()).unwrap_or_default(),
        PropertyValue::Date(range) => range.as_ref().map(|r| r.start.clone()).unwrap_or_default(),
        PropertyValue::Relation(_) => String::new(),
        PropertyValue::Other { text, .. } => text.clone().unwrap_or_default(),
    }
}

/// Notion page -> sheet row, one cell per mapped column
pub async fn to_row(page: &NotionPage, mapping: &FieldMapping, resolver: &RelationResolver<'_>) -> SheetRow {
    let mut row = SheetRow::with_capacity(mapping.len());

    for (property, column) in mapping.iter() {
        let cell = match page.property(property) {
            None => String::new(),
            Some(Ok(PropertyValue::Relation(relations))) => resolver.resolve(&relations).await,
            Some(Ok(value)) => extract_text(&value),
            Some(Err(e)) => {
                warn!(
                    page_id = %page.id,
                    property = %property,
                    error = %e,
                    "Failed to extract property, leaving cell empty"
                );
                String::new()
            }
        };
        row.insert(column.to_string(), cell);
    }

    row
}

/// Sheet row -> property patch typed by the target database schema.
///
/// Relation and other computed properties are not writable from a name and
/// are skipped, as are columns the row does not have.
pub fn to_record(row: &SheetRow, mapping: &FieldMapping, schema: &DatabaseSchema) -> RecordPatch {
    let mut patch = RecordPatch::default();

    for (property, column) in mapping.iter() {
        let Some(cell) = row.get(column) else {
            continue;
        };

        let value = match schema.kind_of(property) {
            Some(PropertyKind::Title) => PatchValue::Title(cell.clone()),
            Some(PropertyKind::RichText) | None => PatchValue::RichText(cell.clone()),
            Some(PropertyKind::Number) => {
                let trimmed = cell.trim();
                if trimmed.is_empty() {
                    PatchValue::Number(None)
                } else {
                    match trimmed.parse::<serde_json::Number>() {
                        Ok(number) => PatchValue::Number(Some(number)),
                        Err(_) => {
                            warn!(
                                property = %property,
                                value = %cell,
                                "Cell is not a number, skipping property"
                            );
                            continue;
                        }
                    }
                }
            }
            Some(PropertyKind::Select) => PatchValue::Select(non_empty(cell)),
            Some(PropertyKind::Date) => PatchValue::Date(non_empty(cell)),
            Some(PropertyKind::Relation) | Some(PropertyKind::Other(_)) => continue,
        };

        patch.properties.push((property.to_string(), value));
    }

    patch
}

fn non_empty(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
