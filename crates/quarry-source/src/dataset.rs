//! JSON dataset documents
//!
//! A dataset bundles a schema and its rows:
//!
//! ```json
//! {
//!   "models": [{ "uid": "api::tag.tag", "attributes": [{ "name": "label", "kind": "scalar" }] }],
//!   "aliases": { "tags": ["api::tag.tag"] },
//!   "records": { "api::tag.tag": [{ "id": 1, "label": "rust" }] }
//! }
//! ```

use crate::error::{SourceError, SourceResult};
use crate::memory::MemorySource;
use quarry_core::{ModelId, ModelRegistry, RegistryDocument, SchemaRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Schema plus rows, as loaded from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(flatten)]
    pub schema: RegistryDocument,

    /// Raw rows per model
    #[serde(default)]
    pub records: BTreeMap<ModelId, Vec<Value>>,
}

impl Dataset {
    pub fn from_json(json: &str) -> SourceResult<Self> {
        let dataset: Self = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Read a dataset file
    pub fn load(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&json)?;
        tracing::debug!(
            "Loaded dataset {} ({} models, {} rows)",
            path.display(),
            dataset.schema.models.len(),
            dataset.row_count()
        );
        Ok(dataset)
    }

    pub fn row_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Check that rows and aliases only name declared models
    pub fn validate(&self) -> SourceResult<()> {
        let registry = self.registry();
        for model in self.records.keys() {
            if registry.get_model(model).is_none() {
                return Err(SourceError::Dataset(format!(
                    "records given for undeclared model {}",
                    model
                )));
            }
        }
        for (alias, targets) in &self.schema.aliases {
            if let Some(missing) = targets.iter().find(|t| registry.get_model(t).is_none()) {
                return Err(SourceError::Dataset(format!(
                    "alias {} points at undeclared model {}",
                    alias, missing
                )));
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::from(self.schema.clone())
    }

    /// Build the registry and an in-memory source holding every row
    pub fn into_memory(self) -> SourceResult<(Arc<dyn SchemaRegistry>, MemorySource)> {
        let registry: Arc<dyn SchemaRegistry> = Arc::new(self.registry());
        let source = MemorySource::new(registry.clone());
        for (model, rows) in self.records {
            for row in rows {
                source.insert(model.clone(), row)?;
            }
        }
        Ok((registry, source))
    }

    /// Copy every row into a SQLite source
    #[cfg(feature = "sqlite")]
    pub fn write_to(&self, source: &crate::sqlite::SqliteSource) -> SourceResult<usize> {
        let mut written = 0;
        for (model, rows) in &self.records {
            for row in rows {
                source.insert(model.clone(), row.clone())?;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn document() -> Value {
        json!({
            "models": [
                {
                    "uid": "api::article.article",
                    "localized": true,
                    "attributes": [
                        { "name": "title", "kind": "scalar" },
                        { "name": "tags", "kind": "relation", "target": "api::tag.tag" },
                        { "name": "blocks", "kind": "dynamiczone", "components": ["blocks.text"] }
                    ]
                },
                { "uid": "api::tag.tag", "attributes": [{ "name": "label", "kind": "scalar" }] },
                { "uid": "blocks.text", "kind": "component", "attributes": [{ "name": "body", "kind": "scalar" }] }
            ],
            "aliases": { "posts": ["api::article.article"] },
            "records": {
                "api::article.article": [{ "id": 1, "title": "Hello", "tags": [2] }],
                "api::tag.tag": [{ "id": 2, "label": "rust" }]
            }
        })
    }

    #[test]
    fn test_load_dataset_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", document()).unwrap();

        let dataset = Dataset::load(file.path()).unwrap();
        assert_eq!(dataset.schema.models.len(), 3);
        assert_eq!(dataset.row_count(), 2);

        let registry = dataset.registry();
        assert_eq!(
            registry.resolve_alias("posts"),
            Some(vec![ModelId::new("api::article.article")])
        );
        assert_eq!(registry.all_model_ids(false).len(), 2);
    }

    #[test]
    fn test_into_memory() {
        let dataset = Dataset::from_json(&document().to_string()).unwrap();
        let (registry, source) = dataset.into_memory().unwrap();
        assert!(registry.get_model(&ModelId::new("blocks.text")).is_some());
        assert_eq!(source.len().unwrap(), 2);
    }

    #[test]
    fn test_rejects_rows_for_unknown_models() {
        let mut doc = document();
        doc["records"]["api::nope.nope"] = json!([{ "id": 1 }]);
        assert!(matches!(
            Dataset::from_json(&doc.to_string()),
            Err(SourceError::Dataset(_))
        ));

        let mut doc = document();
        doc["aliases"]["broken"] = json!(["api::nope.nope"]);
        assert!(Dataset::from_json(&doc.to_string()).is_err());
    }
}
