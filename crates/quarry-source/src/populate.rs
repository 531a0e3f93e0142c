//! Materialising raw rows into populated records

use crate::error::{SourceError, SourceResult};
use crate::row::{ref_ids, row_id, zone_refs, RawRow};
use quarry_core::{
    AttributeSpec, EntryId, FieldValue, ModelId, Population, Record, SchemaRegistry,
    LOCALIZATIONS_FIELD,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rows keyed by model, then identifier
pub type Tables = BTreeMap<ModelId, BTreeMap<EntryId, RawRow>>;

/// Point lookup of stored rows
pub trait RowLookup {
    fn row(&self, model: &ModelId, id: EntryId) -> SourceResult<Option<RawRow>>;
}

impl RowLookup for Tables {
    fn row(&self, model: &ModelId, id: EntryId) -> SourceResult<Option<RawRow>> {
        Ok(self.get(model).and_then(|rows| rows.get(&id)).cloned())
    }
}

/// How far a record's references are expanded
#[derive(Clone, Copy)]
enum Expand<'p> {
    /// Scalars only, references omitted
    ScalarsOnly,
    /// Expand according to a population spec
    Spec(&'p Population),
}

impl<'p> Expand<'p> {
    /// Expansion for a reference attribute, `None` if it is not populated
    fn child(self, name: &str) -> Option<Expand<'p>> {
        match self {
            Self::ScalarsOnly => None,
            Self::Spec(Population::All) => Some(Self::ScalarsOnly),
            Self::Spec(spec) => spec.field(name).map(|nested| match nested {
                Population::All => Self::ScalarsOnly,
                fields => Self::Spec(fields),
            }),
        }
    }
}

/// Turns flat rows into nested records
///
/// `Population::All` expands every reference attribute one level and keeps
/// only scalars beneath it. `Population::Fields` expands just the listed
/// attributes, each by its own spec; anything unlisted is omitted.
pub struct Populator<'a, L: RowLookup + ?Sized> {
    registry: &'a dyn SchemaRegistry,
    lookup: &'a L,
}

impl<'a, L: RowLookup + ?Sized> Populator<'a, L> {
    pub fn new(registry: &'a dyn SchemaRegistry, lookup: &'a L) -> Self {
        Self { registry, lookup }
    }

    pub fn populate(
        &self,
        model: &ModelId,
        row: &RawRow,
        population: &Population,
    ) -> SourceResult<Record> {
        self.materialize(model, row, Expand::Spec(population))
    }

    fn materialize(&self, model: &ModelId, row: &RawRow, expand: Expand<'_>) -> SourceResult<Record> {
        let schema = self
            .registry
            .get_model(model)
            .ok_or_else(|| SourceError::Dataset(format!("unknown model {}", model)))?;
        let id = row_id(row)
            .ok_or_else(|| SourceError::Dataset(format!("row for {} has no id", model)))?;
        let mut record = Record::new(id);

        for (name, value) in row {
            if name == "id" || name == "__component" {
                continue;
            }

            let spec = schema.attribute(name);
            if spec.is_none() && name == LOCALIZATIONS_FIELD && schema.localized {
                if let Some(child) = expand.child(name) {
                    let siblings = self.expand_refs(model, value, child)?;
                    record.fields.insert(name.clone(), siblings);
                }
                continue;
            }

            let populated = match spec {
                None | Some(AttributeSpec::Scalar) => Some(scalar(value)),
                Some(AttributeSpec::Relation { target })
                | Some(AttributeSpec::Component { target, .. }) => match expand.child(name) {
                    Some(child) => Some(self.expand_refs(target, value, child)?),
                    None => None,
                },
                Some(AttributeSpec::Media { .. }) => match expand.child(name) {
                    Some(child) => Some(self.expand_refs(&self.registry.media_model(), value, child)?),
                    None => None,
                },
                Some(AttributeSpec::DynamicZone { .. }) => match expand.child(name) {
                    Some(child) => Some(self.expand_zone(value, child)?),
                    None => None,
                },
            };

            if let Some(populated) = populated {
                record.fields.insert(name.clone(), populated);
            }
        }

        Ok(record)
    }

    fn expand_refs(&self, target: &ModelId, value: &Value, expand: Expand<'_>) -> SourceResult<FieldValue> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        let mut records = Vec::new();
        for id in ref_ids(value) {
            match self.lookup.row(target, id)? {
                Some(row) => records.push(self.materialize(target, &row, expand)?),
                None => tracing::debug!("Dangling reference to {} {}", target, id),
            }
        }

        if value.is_array() {
            Ok(FieldValue::Records(records))
        } else {
            Ok(records.pop().map(FieldValue::from).unwrap_or(FieldValue::Null))
        }
    }

    fn expand_zone(&self, value: &Value, expand: Expand<'_>) -> SourceResult<FieldValue> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        let mut elements = Vec::new();
        for (kind, id) in zone_refs(value) {
            match self.lookup.row(&kind, id)? {
                Some(row) => {
                    let element = self.materialize(&kind, &row, expand)?;
                    elements.push(element.in_zone(kind));
                }
                None => tracing::debug!("Dangling dynamic-zone element {} {}", kind, id),
            }
        }
        Ok(FieldValue::Records(elements))
    }
}

fn scalar(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        other => FieldValue::Scalar(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::into_row;
    use quarry_core::{Model, ModelRegistry, MEDIA_MODEL};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_model(
                Model::new("api::article.article")
                    .localized()
                    .with_scalar("title")
                    .with_relation("author", "api::author.author")
                    .with_relation("tags", "api::tag.tag")
                    .with_media("cover", false)
                    .with_dynamic_zone("blocks", ["blocks.text"]),
            )
            .with_model(
                Model::new("api::author.author")
                    .with_scalar("name")
                    .with_relation("team", "api::team.team"),
            )
            .with_model(Model::new("api::team.team").with_scalar("name"))
            .with_model(Model::new("api::tag.tag").with_scalar("label"))
            .with_model(Model::new(MEDIA_MODEL).with_scalar("url"))
            .with_model(Model::component("blocks.text").with_scalar("body"))
    }

    fn tables() -> Tables {
        let rows = [
            ("api::article.article", json!({
                "id": 1, "title": "Hello", "author": 7, "tags": [2, 3, 99], "cover": 5,
                "blocks": [{ "__component": "blocks.text", "id": 4 }],
                "localizations": [8]
            })),
            ("api::article.article", json!({ "id": 8, "title": "Bonjour", "localizations": [1] })),
            ("api::author.author", json!({ "id": 7, "name": "Ann", "team": 11 })),
            ("api::team.team", json!({ "id": 11, "name": "Core" })),
            ("api::tag.tag", json!({ "id": 2, "label": "rust" })),
            ("api::tag.tag", json!({ "id": 3, "label": "cli" })),
            (MEDIA_MODEL, json!({ "id": 5, "url": "/cover.png" })),
            ("blocks.text", json!({ "id": 4, "body": "Lorem" })),
        ];
        let mut tables = Tables::new();
        for (model, value) in rows {
            let model = ModelId::new(model);
            let (id, row) = into_row(&model, value).unwrap();
            tables.entry(model).or_default().insert(id, row);
        }
        tables
    }

    fn article(population: &Population) -> serde_json::Value {
        let registry = registry();
        let tables = tables();
        let model = ModelId::new("api::article.article");
        let row = tables.row(&model, EntryId(1)).unwrap().unwrap();
        Populator::new(&registry, &tables)
            .populate(&model, &row, population)
            .unwrap()
            .to_json()
    }

    #[test]
    fn test_populate_all_expands_one_level() {
        let value = article(&Population::All);

        assert_eq!(value["title"], "Hello");
        assert_eq!(value["author"], json!({ "id": 7, "name": "Ann" }));
        assert_eq!(value["tags"], json!([{ "id": 2, "label": "rust" }, { "id": 3, "label": "cli" }]));
        assert_eq!(value["cover"]["url"], "/cover.png");
        assert_eq!(
            value["blocks"],
            json!([{ "id": 4, "__component": "blocks.text", "body": "Lorem" }])
        );
        assert_eq!(value["localizations"], json!([{ "id": 8, "title": "Bonjour" }]));
    }

    #[test]
    fn test_populate_fields_expands_listed_attributes() {
        let mut author = BTreeMap::new();
        author.insert("team".to_string(), Population::All);
        let mut fields = BTreeMap::new();
        fields.insert("author".to_string(), Population::Fields(author));
        fields.insert("tags".to_string(), Population::All);

        let value = article(&Population::Fields(fields));

        assert_eq!(value["author"]["team"], json!({ "id": 11, "name": "Core" }));
        assert_eq!(value["tags"].as_array().unwrap().len(), 2);
        assert!(value.get("cover").is_none());
        assert!(value.get("blocks").is_none());
        assert!(value.get("localizations").is_none());
        assert_eq!(value["title"], "Hello");
    }
}
