//! Export orchestration: scope resolution, per-model traversal, conversion

use crate::convert::ExportFormat;
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyBuilder;
use crate::limits::{self, DEFAULT_DEPTH, DEFAULT_PAGE_SIZE};
use crate::query::{parse_search, SearchSpec};
use crate::registry::{SchemaRegistry, OPERATOR_MODEL, WHOLE_DATABASE};
use crate::schema::ModelId;
use crate::source::DataSource;
use crate::store::{ExportEnvelope, ExportStore};
use crate::traversal::{ExportStats, FetchMode, Traversal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do when the data source fails a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Treat the failure as end of data for that branch and keep going
    #[default]
    Stop,
    /// Abort the export with `Error::Fetch`
    Propagate,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Records per fetch
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Models never exported, however they are reached
    #[serde(default = "default_excluded")]
    pub excluded_models: Vec<ModelId>,

    /// Relation attributes pointing at these models are stripped
    #[serde(default = "default_excluded")]
    pub disallowed_relation_targets: Vec<ModelId>,

    #[serde(default)]
    pub fetch_error_policy: FetchErrorPolicy,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_excluded() -> Vec<ModelId> {
    vec![ModelId::new(OPERATOR_MODEL)]
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            excluded_models: default_excluded(),
            disallowed_relation_targets: default_excluded(),
            fetch_error_policy: FetchErrorPolicy::Stop,
        }
    }
}

impl ExportOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_error_policy(mut self, policy: FetchErrorPolicy) -> Self {
        self.fetch_error_policy = policy;
        self
    }

    pub fn exclude(mut self, model: impl Into<ModelId>) -> Self {
        self.excluded_models.push(model.into());
        self
    }

    pub fn disallow_relations_to(mut self, model: impl Into<ModelId>) -> Self {
        self.disallowed_relation_targets.push(model.into());
        self
    }

    pub fn is_excluded(&self, model: &ModelId) -> bool {
        self.excluded_models.contains(model)
    }

    pub fn is_disallowed_target(&self, model: &ModelId) -> bool {
        self.disallowed_relation_targets.contains(model)
    }
}

/// A single export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Model id, alias, or `custom:db` for the whole database
    pub scope: String,

    /// Raw search string, see [`parse_search`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Only when set is `search` applied to the root fetch
    #[serde(default)]
    pub apply_search: bool,

    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Include plugin-provided models in a whole-database export
    #[serde(default)]
    pub include_extensions: bool,

    #[serde(default)]
    pub format: String,
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

impl ExportRequest {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            search: None,
            apply_search: false,
            depth: default_depth(),
            include_extensions: false,
            format: ExportFormat::Json.as_str().to_string(),
        }
    }

    /// Export every model in the registry
    pub fn whole_database() -> Self {
        Self::new(WHOLE_DATABASE)
    }

    /// Set and apply a search
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self.apply_search = true;
        self
    }

    pub fn apply_search(mut self, apply: bool) -> Self {
        self.apply_search = apply;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn include_extensions(mut self, include: bool) -> Self {
        self.include_extensions = include;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

/// Result of an export run before conversion
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub envelope: ExportEnvelope,
    pub stats: ExportStats,
}

/// Export orchestrator
pub struct Exporter {
    registry: Arc<dyn SchemaRegistry>,
    source: Arc<dyn DataSource>,
    options: ExportOptions,
}

impl Exporter {
    pub fn new(registry: Arc<dyn SchemaRegistry>, source: Arc<dyn DataSource>) -> Self {
        Self {
            registry,
            source,
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Resolve a scope to the model identifiers it covers
    pub fn resolve_scope(&self, scope: &str, include_extensions: bool) -> Result<Vec<ModelId>> {
        limits::validate_scope(scope)?;

        if scope == WHOLE_DATABASE {
            return Ok(self
                .registry
                .all_model_ids(include_extensions)
                .into_iter()
                .filter(|m| !self.options.is_excluded(m))
                .collect());
        }
        if let Some(targets) = self.registry.resolve_alias(scope) {
            return Ok(targets);
        }

        let model = ModelId::new(scope);
        self.registry.model(&model)?;
        Ok(vec![model])
    }

    /// Run the export and serialize it in the requested format
    pub async fn export_data(&self, request: &ExportRequest) -> Result<String> {
        let format: ExportFormat = request.format.parse()?;
        let outcome = self.export_envelope(request).await?;
        format.convert(&outcome.envelope)
    }

    /// Run the export and return the envelope with run statistics
    pub async fn export_envelope(&self, request: &ExportRequest) -> Result<ExportOutcome> {
        limits::validate_depth(request.depth)?;
        limits::validate_page_size(self.options.page_size)?;

        let search: Option<SearchSpec> = match (&request.search, request.apply_search) {
            (Some(raw), true) => Some(parse_search(raw)?),
            _ => None,
        };
        let models = self.resolve_scope(&request.scope, request.include_extensions)?;

        tracing::info!(
            "Exporting {} model(s) for scope '{}' at depth {}",
            models.len(),
            request.scope,
            request.depth
        );

        let builder = HierarchyBuilder::new(self.registry.as_ref(), &self.options.excluded_models);
        let mut traversal = Traversal::new(
            self.registry.as_ref(),
            self.source.as_ref(),
            &self.options,
        );
        let mut store = ExportStore::new();

        for model in &models {
            let hierarchy = builder.build(model, request.depth)?;
            let before = store.len();
            traversal
                .run(
                    &mut store,
                    &hierarchy.model,
                    &hierarchy,
                    request.depth,
                    FetchMode::Discover {
                        search: search.as_ref(),
                    },
                )
                .await?;
            tracing::info!(
                "Exported {}: {} new record(s)",
                hierarchy.model,
                store.len() - before
            );
        }

        let stats = traversal.into_stats();
        tracing::info!(
            "Export complete: {} record(s) across {} model(s), {} page(s) fetched, {} fetch failure(s)",
            store.len(),
            store.models().count(),
            stats.pages_fetched,
            stats.fetch_failures
        );

        Ok(ExportOutcome {
            envelope: ExportEnvelope::new(store),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntryId, Record};
    use crate::registry::{ModelRegistry, MEDIA_MODEL};
    use crate::schema::Model;
    use crate::testing::{FetchCall, StubSource};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_model(
                Model::new("api::article.article")
                    .with_scalar("title")
                    .with_relation("author", "api::author.author")
                    .with_relation("createdBy", OPERATOR_MODEL),
            )
            .with_model(Model::new("api::author.author").with_scalar("name"))
            .with_model(Model::new(OPERATOR_MODEL).with_scalar("email"))
            .with_model(Model::new(MEDIA_MODEL).extension().with_scalar("url"))
            .with_model(Model::component("shared.seo").with_scalar("metaTitle"))
            .with_alias("content", ["api::article.article", "api::author.author"])
    }

    fn source() -> StubSource {
        StubSource::new()
            .with_records(
                "api::article.article",
                vec![
                    Record::new(1)
                        .with_scalar("title", "One")
                        .with_field("author", Record::new(10).with_scalar("name", "Ann"))
                        .with_field("createdBy", Record::new(99).with_scalar("email", "op@x")),
                    Record::new(2).with_scalar("title", "Two"),
                ],
            )
            .with_records(
                "api::author.author",
                vec![
                    Record::new(10).with_scalar("name", "Ann"),
                    Record::new(11).with_scalar("name", "Bob"),
                ],
            )
            .with_records(MEDIA_MODEL, vec![Record::new(5).with_scalar("url", "/a.png")])
            .with_records(OPERATOR_MODEL, vec![Record::new(99)])
    }

    fn exporter(source: Arc<StubSource>) -> Exporter {
        Exporter::new(Arc::new(registry()), source)
    }

    #[test]
    fn test_resolve_scope() {
        let exporter = exporter(Arc::new(source()));
        assert_eq!(
            exporter.resolve_scope(WHOLE_DATABASE, false).unwrap(),
            vec![
                ModelId::new("api::article.article"),
                ModelId::new("api::author.author")
            ]
        );
        assert_eq!(exporter.resolve_scope(WHOLE_DATABASE, true).unwrap().len(), 3);
        assert_eq!(exporter.resolve_scope("content", false).unwrap().len(), 2);
        assert_eq!(
            exporter.resolve_scope("api::author.author", false).unwrap(),
            vec![ModelId::new("api::author.author")]
        );
        assert!(matches!(
            exporter.resolve_scope("api::nope.nope", false),
            Err(Error::ModelNotFound(_))
        ));
        assert!(exporter.resolve_scope("", false).is_err());
    }

    #[tokio::test]
    async fn test_export_single_model() {
        let source = Arc::new(source());
        let exporter = exporter(source.clone());
        let output = exporter
            .export_data(&ExportRequest::new("api::article.article").with_depth(2))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["version"], 2);
        assert_eq!(value["data"]["api::article.article"]["1"]["author"], 10);
        assert!(value["data"]["api::article.article"]["1"]
            .get("createdBy")
            .is_none());
        assert_eq!(value["data"]["api::author.author"]["10"]["name"], "Ann");
        assert!(value["data"].get(OPERATOR_MODEL).is_none());
        assert!(source.calls_for(OPERATOR_MODEL).is_empty());
    }

    #[tokio::test]
    async fn test_whole_database_merges_models() {
        let source = Arc::new(source());
        let exporter = exporter(source.clone());
        let outcome = exporter
            .export_envelope(&ExportRequest::whole_database().with_depth(2))
            .await
            .unwrap();
        let data = &outcome.envelope.data;

        assert_eq!(data.ids(&ModelId::new("api::article.article")).len(), 2);
        assert_eq!(
            data.ids(&ModelId::new("api::author.author")),
            vec![EntryId(10), EntryId(11)]
        );
        assert!(data.ids(&ModelId::new(MEDIA_MODEL)).is_empty());
        assert_eq!(outcome.stats.fetch_failures, 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_before_fetching() {
        let source = Arc::new(source());
        let exporter = exporter(source.clone());
        let result = exporter
            .export_data(&ExportRequest::new("api::article.article").with_format("xml"))
            .await;

        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_only_applied_when_requested() {
        let source = Arc::new(source());
        let exporter = exporter(source.clone());

        let bad = ExportRequest::new("api::article.article").with_search("sort=title:up");
        assert!(matches!(
            exporter.export_envelope(&bad).await,
            Err(Error::InvalidSearch(_))
        ));

        let ignored = bad.apply_search(false);
        assert!(exporter.export_envelope(&ignored).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_fail_export() {
        let source = Arc::new(source().failing_page("api::article.article", 1));
        let exporter = exporter(source.clone());
        let outcome = exporter
            .export_envelope(&ExportRequest::new("content"))
            .await
            .unwrap();

        assert!(outcome.envelope.data.ids(&ModelId::new("api::article.article")).is_empty());
        assert_eq!(outcome.envelope.data.ids(&ModelId::new("api::author.author")).len(), 2);
        assert_eq!(outcome.stats.fetch_failures, 1);
        assert_eq!(
            source.calls_for("api::article.article"),
            vec![FetchCall::Page {
                model: "api::article.article".to_string(),
                page: 1,
                returned: 0
            }]
        );
    }

    #[tokio::test]
    async fn test_propagate_policy_surfaces_fetch_error() {
        let source = Arc::new(source().failing_page("api::article.article", 1));
        let exporter = exporter(source).with_options(
            ExportOptions::default().with_fetch_error_policy(FetchErrorPolicy::Propagate),
        );
        let result = exporter
            .export_envelope(&ExportRequest::new("api::article.article"))
            .await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_invalid_depth_rejected() {
        let exporter = exporter(Arc::new(source()));
        let result = exporter
            .export_envelope(&ExportRequest::new("api::article.article").with_depth(0))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_options_serde_defaults() {
        let options: ExportOptions = serde_json::from_value(json!({ "page_size": 50 })).unwrap();
        assert_eq!(options.page_size, 50);
        assert!(options.is_excluded(&ModelId::new(OPERATOR_MODEL)));
        assert_eq!(options.fetch_error_policy, FetchErrorPolicy::Stop);
    }
}
