//! Raw stored rows
//!
//! A row is a flat JSON object: scalars as-is, relation, component and
//! media values as an id or an id array, dynamic zones as an array of
//! `{__component, id}` objects and sibling translations as an id array
//! under `localizations`.

use crate::error::{SourceError, SourceResult};
use quarry_core::{EntryId, ModelId};
use serde_json::{Map, Value};

/// One stored row
pub type RawRow = Map<String, Value>;

static NULL: Value = Value::Null;

/// Field of a row, `null` if absent
pub fn field<'r>(row: &'r RawRow, name: &str) -> &'r Value {
    row.get(name).unwrap_or(&NULL)
}

/// Identifier of a row
pub fn row_id(row: &RawRow) -> Option<EntryId> {
    row.get("id").and_then(EntryId::from_json)
}

/// Validate a JSON value as a row for `model`
pub fn into_row(model: &ModelId, value: Value) -> SourceResult<(EntryId, RawRow)> {
    let row = match value {
        Value::Object(map) => map,
        other => {
            return Err(SourceError::Dataset(format!(
                "row for {} must be an object, got {}",
                model, other
            )))
        }
    };
    let id = row_id(&row).ok_or_else(|| {
        SourceError::Dataset(format!("row for {} is missing a non-negative integer id", model))
    })?;
    Ok((id, row))
}

/// Identifiers held by a reference value
pub fn ref_ids(value: &Value) -> Vec<EntryId> {
    match value {
        Value::Array(items) => items.iter().filter_map(ref_id).collect(),
        other => ref_id(other).into_iter().collect(),
    }
}

fn ref_id(value: &Value) -> Option<EntryId> {
    match value {
        Value::Object(map) => map.get("id").and_then(EntryId::from_json),
        other => EntryId::from_json(other),
    }
}

/// `(component kind, id)` pairs of a dynamic-zone value, in order
pub fn zone_refs(value: &Value) -> Vec<(ModelId, EntryId)> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let kind = item.get("__component")?.as_str()?;
            let id = EntryId::from_json(item.get("id")?)?;
            Some((ModelId::new(kind), id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_row_requires_id() {
        let model = ModelId::new("api::tag.tag");
        let (id, row) = into_row(&model, json!({ "id": 4, "name": "rust" })).unwrap();
        assert_eq!(id, EntryId(4));
        assert_eq!(field(&row, "name"), &json!("rust"));
        assert!(field(&row, "missing").is_null());

        assert!(into_row(&model, json!({ "name": "x" })).is_err());
        assert!(into_row(&model, json!([1, 2])).is_err());
    }

    #[test]
    fn test_reference_shapes() {
        assert_eq!(ref_ids(&json!(3)), vec![EntryId(3)]);
        assert_eq!(ref_ids(&json!([1, { "id": 2 }])), vec![EntryId(1), EntryId(2)]);
        assert!(ref_ids(&Value::Null).is_empty());
        assert_eq!(
            zone_refs(&json!([{ "__component": "blocks.text", "id": 9 }, { "id": 1 }])),
            vec![(ModelId::new("blocks.text"), EntryId(9))]
        );
    }
}
