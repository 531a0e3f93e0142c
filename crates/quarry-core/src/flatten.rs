//! Flattening of nested records into identifier references

use crate::record::{EntryId, FieldValue, Record};
use crate::schema::{AttributeSpec, Model, ModelId};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reference to one dynamic-zone element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRef {
    #[serde(rename = "__component")]
    pub component: ModelId,
    pub id: EntryId,
}

/// Field value of a flattened record; never holds a nested record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlatValue {
    Null,
    Ref(EntryId),
    Refs(Vec<EntryId>),
    Zone(Vec<ZoneRef>),
    Scalar(Value),
}

/// A record with every reference reduced to identifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedRecord {
    pub id: EntryId,
    #[serde(rename = "__component", skip_serializing_if = "Option::is_none")]
    pub component: Option<ModelId>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FlatValue>,
}

impl FlattenedRecord {
    pub fn get(&self, name: &str) -> Option<&FlatValue> {
        self.fields.get(name)
    }
}

/// Flatten `record` according to the attributes of `model`
///
/// Fields the model does not declare are flattened by shape, so a nested
/// record never survives into the output.
pub fn flatten(record: &Record, model: &Model) -> FlattenedRecord {
    let fields = record
        .fields
        .iter()
        .map(|(name, value)| {
            let flat = match model.attribute(name) {
                Some(AttributeSpec::Scalar) => scalar(value),
                Some(AttributeSpec::DynamicZone { .. }) => zone(value),
                Some(
                    AttributeSpec::Relation { .. }
                    | AttributeSpec::Component { .. }
                    | AttributeSpec::Media { .. },
                ) => reference(value),
                None => match value {
                    FieldValue::Record(_) | FieldValue::Records(_) => reference(value),
                    other => scalar(other),
                },
            };
            (name.clone(), flat)
        })
        .collect();

    FlattenedRecord {
        id: record.id,
        component: record.component.clone(),
        fields,
    }
}

fn scalar(value: &FieldValue) -> FlatValue {
    match value {
        FieldValue::Null => FlatValue::Null,
        FieldValue::Record(_) | FieldValue::Records(_) => reference(value),
        FieldValue::Scalar(v) => FlatValue::Scalar(v.clone()),
    }
}

fn reference(value: &FieldValue) -> FlatValue {
    match value {
        FieldValue::Null => FlatValue::Null,
        FieldValue::Record(record) => FlatValue::Ref(record.id),
        FieldValue::Records(records) => FlatValue::Refs(records.iter().map(|r| r.id).collect()),
        FieldValue::Scalar(v) => FlatValue::Scalar(strip_objects(v)),
    }
}

/// Replace `{id, ..}` objects with their id; other values pass through
fn strip_objects(value: &Value) -> Value {
    match value {
        Value::Object(map) => match map.get("id") {
            Some(id) => id.clone(),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(strip_objects).collect()),
        other => other.clone(),
    }
}

fn zone(value: &FieldValue) -> FlatValue {
    let elements: &[Record] = match value {
        FieldValue::Null => return FlatValue::Null,
        FieldValue::Record(record) => std::slice::from_ref(record.as_ref()),
        FieldValue::Records(records) => records,
        FieldValue::Scalar(v) => return FlatValue::Scalar(v.clone()),
    };

    let refs = elements
        .iter()
        .filter_map(|element| match &element.component {
            Some(kind) => Some(ZoneRef {
                component: kind.clone(),
                id: element.id,
            }),
            None => {
                tracing::warn!("Dropping dynamic-zone element {} without component kind", element.id);
                None
            }
        })
        .collect();
    FlatValue::Zone(refs)
}
