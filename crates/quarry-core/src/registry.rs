//! Schema registry trait and in-memory implementation

use crate::error::{Error, Result};
use crate::schema::{Model, ModelId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scope sentinel meaning "every exportable model"
pub const WHOLE_DATABASE: &str = "custom:db";

/// Model holding uploaded file assets
pub const MEDIA_MODEL: &str = "plugin::upload.file";

/// Operator account model, never exported
pub const OPERATOR_MODEL: &str = "admin::user";

/// Read-only schema lookups
///
/// Injected into the exporter and threaded through the hierarchy builder
/// and traversal engine.
pub trait SchemaRegistry: Send + Sync {
    /// Get a model by identifier
    fn get_model(&self, uid: &ModelId) -> Option<&Model>;

    /// Identifiers of every model, components included, sorted
    fn model_ids(&self) -> Vec<ModelId>;

    /// Identifiers of every top-level model (components excluded), sorted
    fn all_model_ids(&self, include_extensions: bool) -> Vec<ModelId>;

    /// Resolve an alias to its canonical model identifiers
    fn resolve_alias(&self, alias: &str) -> Option<Vec<ModelId>>;

    /// Model that media attributes point at
    fn media_model(&self) -> ModelId {
        ModelId::new(MEDIA_MODEL)
    }

    /// Get a model, failing if it is unknown
    fn model(&self, uid: &ModelId) -> Result<&Model> {
        self.get_model(uid)
            .ok_or_else(|| Error::ModelNotFound(uid.to_string()))
    }

    /// Resolve `uid` through the alias table to exactly one model identifier
    fn canonical(&self, uid: &ModelId) -> Result<ModelId> {
        match self.resolve_alias(uid.as_str()) {
            Some(mut targets) if targets.len() == 1 => Ok(targets.remove(0)),
            Some(targets) => Err(Error::AmbiguousAlias {
                alias: uid.to_string(),
                count: targets.len(),
            }),
            None => Ok(uid.clone()),
        }
    }
}

/// Serialized form of a registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<ModelId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_model: Option<ModelId>,
}

/// In-memory schema registry
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, Model>,
    aliases: BTreeMap<String, Vec<ModelId>>,
    media_model: ModelId,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: BTreeMap::new(),
            aliases: BTreeMap::new(),
            media_model: ModelId::new(MEDIA_MODEL),
        }
    }

    pub fn from_models(models: impl IntoIterator<Item = Model>) -> Self {
        models.into_iter().fold(Self::new(), Self::with_model)
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.insert(model);
        self
    }

    pub fn with_alias<I, M>(mut self, alias: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModelId>,
    {
        self.aliases
            .insert(alias.into(), targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_media_model(mut self, uid: impl Into<ModelId>) -> Self {
        self.media_model = uid.into();
        self
    }

    /// Add or replace a model
    pub fn insert(&mut self, model: Model) {
        self.models.insert(model.uid.clone(), model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn aliases(&self) -> &BTreeMap<String, Vec<ModelId>> {
        &self.aliases
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl From<RegistryDocument> for ModelRegistry {
    fn from(doc: RegistryDocument) -> Self {
        let mut registry = Self::from_models(doc.models);
        registry.aliases = doc.aliases;
        if let Some(media) = doc.media_model {
            registry.media_model = media;
        }
        registry
    }
}

impl SchemaRegistry for ModelRegistry {
    fn get_model(&self, uid: &ModelId) -> Option<&Model> {
        self.models.get(uid)
    }

    fn model_ids(&self) -> Vec<ModelId> {
        self.models.keys().cloned().collect()
    }

    fn all_model_ids(&self, include_extensions: bool) -> Vec<ModelId> {
        self.models
            .values()
            .filter(|m| !m.is_component())
            .filter(|m| include_extensions || !m.extension)
            .map(|m| m.uid.clone())
            .collect()
    }

    fn resolve_alias(&self, alias: &str) -> Option<Vec<ModelId>> {
        self.aliases.get(alias).cloned()
    }

    fn media_model(&self) -> ModelId {
        self.media_model.clone()
    }
}
