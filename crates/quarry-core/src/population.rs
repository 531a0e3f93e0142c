//! Population planning: which nested structures a fetch should expand

use crate::error::Result;
use crate::record::LOCALIZATIONS_FIELD;
use crate::registry::SchemaRegistry;
use crate::schema::{AttributeSpec, ModelId};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Population specification handed to a data source
///
/// `All` expands the attribute (or, at the top level, every reference
/// attribute) by one level without expanding anything beneath it.
/// `Fields` expands only the listed attributes, each with its own spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Population {
    All,
    Fields(BTreeMap<String, Population>),
}

impl Population {
    /// Build from a field map, collapsing an empty map to `All`
    pub fn from_fields(fields: BTreeMap<String, Population>) -> Self {
        if fields.is_empty() {
            Self::All
        } else {
            Self::Fields(fields)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Spec for a nested attribute, if that attribute is populated at all
    pub fn field(&self, name: &str) -> Option<&Population> {
        match self {
            Self::All => None,
            Self::Fields(fields) => fields.get(name),
        }
    }

    /// Deep-merge two specs
    pub fn merge(self, other: Population) -> Population {
        match (self, other) {
            (Self::All, Self::All) => Self::All,
            (Self::All, fields @ Self::Fields(_)) | (fields @ Self::Fields(_), Self::All) => fields,
            (Self::Fields(mut left), Self::Fields(right)) => {
                for (name, spec) in right {
                    let merged = match left.remove(&name) {
                        Some(existing) => existing.merge(spec),
                        None => spec,
                    };
                    left.insert(name, merged);
                }
                Self::Fields(left)
            }
        }
    }
}

impl Serialize for Population {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_bool(true),
            Self::Fields(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, spec) in fields {
                    map.serialize_entry(name, spec)?;
                }
                map.end()
            }
        }
    }
}

/// Builds population specs from the schema
pub struct PopulationPlanner<'a> {
    registry: &'a dyn SchemaRegistry,
    excluded: &'a [ModelId],
}

impl<'a> PopulationPlanner<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, excluded: &'a [ModelId]) -> Self {
        Self { registry, excluded }
    }

    /// Plan population for `model` with `depth` levels remaining
    ///
    /// Returns `None` for excluded models, which must not be populated.
    pub fn plan(&self, model: &ModelId, depth: u32) -> Result<Option<Population>> {
        if depth <= 1 {
            return Ok(Some(Population::All));
        }
        if self.excluded.contains(model) {
            return Ok(None);
        }

        let schema = self.registry.model(model)?;
        let mut fields = BTreeMap::new();

        for attr in schema.mixed_attributes() {
            let nested = match &attr.spec {
                AttributeSpec::Scalar => continue,
                AttributeSpec::Component { target, .. } | AttributeSpec::Relation { target } => {
                    self.plan(target, depth - 1)?
                }
                AttributeSpec::DynamicZone { components } => {
                    let mut merged: Option<Population> = None;
                    for kind in components {
                        if let Some(spec) = self.plan(kind, depth - 1)? {
                            merged = Some(match merged {
                                Some(acc) => acc.merge(spec),
                                None => spec,
                            });
                        }
                    }
                    Some(merged.unwrap_or(Population::All))
                }
                AttributeSpec::Media { .. } => Some(Population::All),
            };

            if let Some(nested) = nested {
                fields.insert(attr.name.clone(), nested);
            }
        }

        if schema.localized {
            let own = Population::from_fields(fields.clone());
            fields.insert(LOCALIZATIONS_FIELD.to_string(), own);
        }

        Ok(Some(Population::from_fields(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ModelRegistry, OPERATOR_MODEL};
    use crate::schema::Model;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_model(
                Model::new("api::article.article")
                    .with_scalar("title")
                    .with_relation("author", "api::author.author")
                    .with_relation("createdBy", OPERATOR_MODEL)
                    .with_component("seo", "shared.seo", false)
                    .with_dynamic_zone("blocks", ["blocks.text", "blocks.gallery"])
                    .with_media("cover", false),
            )
            .with_model(
                Model::new("api::author.author")
                    .with_scalar("name")
                    .with_relation("articles", "api::article.article"),
            )
            .with_model(Model::component("shared.seo").with_scalar("metaTitle"))
            .with_model(Model::component("blocks.text").with_scalar("body"))
            .with_model(Model::component("blocks.gallery").with_media("images", true))
            .with_model(Model::new(OPERATOR_MODEL).with_scalar("email"))
    }

    fn excluded() -> Vec<ModelId> {
        vec![ModelId::new(OPERATOR_MODEL)]
    }

    #[test]
    fn test_depth_one_is_all() {
        let registry = registry();
        let excluded = excluded();
        let planner = PopulationPlanner::new(&registry, &excluded);
        assert_eq!(
            planner.plan(&ModelId::new("api::article.article"), 1).unwrap(),
            Some(Population::All)
        );
    }

    #[test]
    fn test_excluded_model_is_absent() {
        let registry = registry();
        let excluded = excluded();
        let planner = PopulationPlanner::new(&registry, &excluded);
        assert_eq!(planner.plan(&ModelId::new(OPERATOR_MODEL), 3).unwrap(), None);
    }

    #[test]
    fn test_plan_depth_three() {
        let registry = registry();
        let excluded = excluded();
        let planner = PopulationPlanner::new(&registry, &excluded);
        let plan = planner
            .plan(&ModelId::new("api::article.article"), 3)
            .unwrap()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&plan).unwrap(),
            json!({
                "author": { "articles": true },
                "blocks": { "images": true },
                "cover": true,
                "seo": true
            })
        );
    }

    #[test]
    fn test_relation_to_excluded_omitted_when_expanding() {
        let registry = registry()
            .with_model(Model::new("api::note.note").with_relation("owner", OPERATOR_MODEL));
        let excluded = excluded();
        let planner = PopulationPlanner::new(&registry, &excluded);

        // At depth 3 the operator model would itself be expanded, so it is dropped
        let plan = planner.plan(&ModelId::new("api::note.note"), 3).unwrap();
        assert_eq!(plan, Some(Population::All));
    }

    #[test]
    fn test_localized_model_populates_siblings() {
        let registry = ModelRegistry::new().with_model(
            Model::new("api::page.page")
                .localized()
                .with_scalar("title")
                .with_media("hero", false),
        );
        let planner = PopulationPlanner::new(&registry, &[]);
        let plan = planner.plan(&ModelId::new("api::page.page"), 2).unwrap().unwrap();

        assert_eq!(
            serde_json::to_value(&plan).unwrap(),
            json!({ "hero": true, "localizations": { "hero": true } })
        );
    }

    #[test]
    fn test_merge() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Population::All);
        let mut b = BTreeMap::new();
        let mut nested = BTreeMap::new();
        nested.insert("z".to_string(), Population::All);
        b.insert("x".to_string(), Population::Fields(nested.clone()));
        b.insert("y".to_string(), Population::All);

        let merged = Population::Fields(a).merge(Population::Fields(b));
        assert_eq!(merged.field("x"), Some(&Population::Fields(nested)));
        assert_eq!(merged.field("y"), Some(&Population::All));
        assert_eq!(Population::All.merge(Population::All), Population::All);
    }

    #[test]
    fn test_unknown_model_errors() {
        let registry = registry();
        let planner = PopulationPlanner::new(&registry, &[]);
        assert!(planner.plan(&ModelId::new("api::nope.nope"), 2).is_err());
    }
}
