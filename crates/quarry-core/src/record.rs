//! Fetched records and their field values

use crate::schema::ModelId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the field holding sibling translations on localized records
pub const LOCALIZATIONS_FIELD: &str = "localizations";

/// Identifier of a record, unique within its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Read an identifier from a JSON value, if it is a non-negative integer
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_u64().map(Self)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of a single record field
///
/// Variant order matters for deserialization: an object with an `id` is a
/// nested record, an array of such objects is a record sequence, and
/// anything else is kept as a plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Record(Box<Record>),
    Records(Vec<Record>),
    Scalar(Value),
}

impl FieldValue {
    /// Identifiers referenced by this value
    ///
    /// Bare integers and `{id}` objects inside plain JSON are accepted too,
    /// so values that were already reduced to identifiers still resolve.
    pub fn referenced_ids(&self) -> Vec<EntryId> {
        match self {
            Self::Null => Vec::new(),
            Self::Record(record) => vec![record.id],
            Self::Records(records) => records.iter().map(|r| r.id).collect(),
            Self::Scalar(Value::Array(items)) => items.iter().filter_map(json_ref).collect(),
            Self::Scalar(value) => json_ref(value).into_iter().collect(),
        }
    }

    /// Convert back to plain JSON
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Record(record) => record.to_json(),
            Self::Records(records) => Value::Array(records.iter().map(Record::to_json).collect()),
            Self::Scalar(value) => value.clone(),
        }
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        Self::Record(Box::new(record))
    }
}

impl From<Vec<Record>> for FieldValue {
    fn from(records: Vec<Record>) -> Self {
        Self::Records(records)
    }
}

fn json_ref(value: &Value) -> Option<EntryId> {
    match value {
        Value::Object(map) => map.get("id").and_then(EntryId::from_json),
        other => EntryId::from_json(other),
    }
}

/// One record of a model, as returned by a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: EntryId,

    /// Component kind, set on dynamic-zone elements
    #[serde(rename = "__component", default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ModelId>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: impl Into<EntryId>) -> Self {
        Self {
            id: id.into(),
            component: None,
            fields: BTreeMap::new(),
        }
    }

    /// Mark this record as a dynamic-zone element of the given kind
    pub fn in_zone(mut self, kind: impl Into<ModelId>) -> Self {
        self.component = Some(kind.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(name.into(), FieldValue::Scalar(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Sibling translations carried by this record
    pub fn localizations(&self) -> &[Record] {
        match self.fields.get(LOCALIZATIONS_FIELD) {
            Some(FieldValue::Records(siblings)) => siblings,
            Some(FieldValue::Record(sibling)) => std::slice::from_ref(sibling.as_ref()),
            _ => &[],
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::from(self.id.0));
        if let Some(kind) = &self.component {
            map.insert("__component".to_string(), Value::from(kind.as_str()));
        }
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_deserialize_nested() {
        let record: Record = serde_json::from_value(json!({
            "id": 1,
            "title": "Hello",
            "author": { "id": 7, "name": "Ann" },
            "tags": [{ "id": 2 }, { "id": 3 }],
            "meta": { "views": 10 },
            "cover": null
        }))
        .unwrap();

        assert_eq!(record.id, EntryId(1));
        assert!(matches!(record.get("title"), Some(FieldValue::Scalar(_))));
        assert!(matches!(record.get("author"), Some(FieldValue::Record(r)) if r.id == EntryId(7)));
        assert!(matches!(record.get("tags"), Some(FieldValue::Records(r)) if r.len() == 2));
        assert!(matches!(record.get("meta"), Some(FieldValue::Scalar(_))));
        assert_eq!(record.get("cover"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_zone_element_component_kind() {
        let record: Record =
            serde_json::from_value(json!({ "id": 3, "__component": "blocks.text", "body": "x" }))
                .unwrap();
        assert_eq!(record.component, Some(ModelId::new("blocks.text")));
        assert!(record.get("__component").is_none());
        assert_eq!(record.to_json()["__component"], "blocks.text");
    }

    #[test]
    fn test_referenced_ids() {
        let nested = FieldValue::from(vec![Record::new(7), Record::new(9)]);
        assert_eq!(nested.referenced_ids(), vec![EntryId(7), EntryId(9)]);

        let flat = FieldValue::Scalar(json!([4, { "id": 5 }, "x"]));
        assert_eq!(flat.referenced_ids(), vec![EntryId(4), EntryId(5)]);

        assert!(FieldValue::Null.referenced_ids().is_empty());
    }

    #[test]
    fn test_localizations() {
        let record = Record::new(1).with_field(
            LOCALIZATIONS_FIELD,
            vec![Record::new(2).with_scalar("locale", "fr")],
        );
        assert_eq!(record.localizations().len(), 1);
        assert!(Record::new(5).localizations().is_empty());
    }
}
