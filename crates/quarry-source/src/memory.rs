//! In-memory data source

use crate::error::{SourceError, SourceResult};
use crate::filter::{matches, sort_rows};
use crate::populate::{Populator, Tables};
use crate::row::{into_row, RawRow};
use async_trait::async_trait;
use quarry_core::{
    DataSource, EntryId, ModelId, PageQuery, Population, Record, Result, SchemaRegistry,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// One fetch served by a [`MemorySource`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchLogEntry {
    Page {
        model: ModelId,
        page: usize,
        page_size: usize,
        returned: usize,
    },
    Ids {
        model: ModelId,
        requested: usize,
        returned: usize,
    },
}

/// In-memory data source
///
/// Rows are kept ordered by identifier. Useful for tests and for exporting
/// JSON datasets without a database.
pub struct MemorySource {
    registry: Arc<dyn SchemaRegistry>,
    tables: RwLock<Tables>,
    failing_pages: RwLock<HashSet<(ModelId, usize)>>,
    fetch_log: RwLock<Vec<FetchLogEntry>>,
}

impl MemorySource {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            tables: RwLock::new(Tables::new()),
            failing_pages: RwLock::new(HashSet::new()),
            fetch_log: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a row; the row must be an object with an integer `id`
    pub fn insert(&self, model: impl Into<ModelId>, row: Value) -> SourceResult<EntryId> {
        let model = model.into();
        let (id, row) = into_row(&model, row)?;
        let mut tables = self
            .tables
            .write()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        tables.entry(model).or_default().insert(id, row);
        Ok(id)
    }

    /// Number of stored rows across all models
    pub fn len(&self) -> SourceResult<usize> {
        let tables = self
            .tables
            .read()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        Ok(tables.values().map(|rows| rows.len()).sum())
    }

    pub fn is_empty(&self) -> SourceResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Make discovery fetches of `page` (1-based) for `model` fail
    pub fn fail_page(&self, model: impl Into<ModelId>, page: usize) -> SourceResult<()> {
        let mut failing = self
            .failing_pages
            .write()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        failing.insert((model.into(), page));
        Ok(())
    }

    /// Every fetch served so far, in order
    pub fn fetch_log(&self) -> SourceResult<Vec<FetchLogEntry>> {
        let log = self
            .fetch_log
            .read()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        Ok(log.clone())
    }

    fn log(&self, entry: FetchLogEntry) -> SourceResult<()> {
        let mut log = self
            .fetch_log
            .write()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        log.push(entry);
        Ok(())
    }

    fn is_failing(&self, model: &ModelId, page: usize) -> SourceResult<bool> {
        let failing = self
            .failing_pages
            .read()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        Ok(failing.contains(&(model.clone(), page)))
    }

    fn page(
        &self,
        model: &ModelId,
        population: &Population,
        query: &PageQuery<'_>,
    ) -> SourceResult<Vec<Record>> {
        let page = query.pagination.page;
        if self.is_failing(model, page)? {
            return Err(SourceError::Injected {
                model: model.to_string(),
                page,
            });
        }

        let tables = self
            .tables
            .read()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        let mut rows: Vec<RawRow> = tables
            .get(model)
            .map(|rows| {
                rows.values()
                    .filter(|row| matches(row, query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_rows(&mut rows, query.sort);

        let populator = Populator::new(self.registry.as_ref(), &*tables);
        let records = rows
            .iter()
            .skip(query.pagination.offset())
            .take(query.pagination.page_size)
            .map(|row| populator.populate(model, row, population))
            .collect::<SourceResult<Vec<_>>>()?;

        self.log(FetchLogEntry::Page {
            model: model.clone(),
            page,
            page_size: query.pagination.page_size,
            returned: records.len(),
        })?;
        Ok(records)
    }

    fn by_ids(
        &self,
        model: &ModelId,
        population: &Population,
        ids: &[EntryId],
    ) -> SourceResult<Vec<Record>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| SourceError::Database(format!("Lock error: {}", e)))?;
        let populator = Populator::new(self.registry.as_ref(), &*tables);

        let records = match tables.get(model) {
            Some(rows) => ids
                .iter()
                .filter_map(|id| rows.get(id))
                .map(|row| populator.populate(model, row, population))
                .collect::<SourceResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        self.log(FetchLogEntry::Ids {
            model: model.clone(),
            requested: ids.len(),
            returned: records.len(),
        })?;
        Ok(records)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch_page(
        &self,
        model: &ModelId,
        population: &Population,
        query: &PageQuery<'_>,
    ) -> Result<Vec<Record>> {
        Ok(self.page(model, population, query)?)
    }

    async fn fetch_by_ids(
        &self,
        model: &ModelId,
        population: &Population,
        ids: &[EntryId],
    ) -> Result<Vec<Record>> {
        Ok(self.by_ids(model, population, ids)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{parse_search, FieldValue, Model, ModelRegistry, Pagination};
    use serde_json::json;

    fn source() -> MemorySource {
        let registry = ModelRegistry::new()
            .with_model(
                Model::new("api::article.article")
                    .with_scalar("title")
                    .with_relation("author", "api::author.author"),
            )
            .with_model(Model::new("api::author.author").with_scalar("name"));
        let source = MemorySource::new(Arc::new(registry));
        for id in (1..=5).rev() {
            source
                .insert(
                    "api::article.article",
                    json!({ "id": id, "title": format!("Post {}", id), "author": 1 }),
                )
                .unwrap();
        }
        source
            .insert("api::author.author", json!({ "id": 1, "name": "Ann" }))
            .unwrap();
        source
    }

    fn article() -> ModelId {
        ModelId::new("api::article.article")
    }

    #[tokio::test]
    async fn test_fetch_page_orders_by_id_and_paginates() {
        let source = source();
        let query = PageQuery::new(None, Pagination::new(2, 2));
        let records = source
            .fetch_page(&article(), &Population::All, &query)
            .await
            .unwrap();

        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(matches!(records[0].get("author"), Some(FieldValue::Record(a)) if a.id == EntryId(1)));
        assert_eq!(source.len().unwrap(), 6);
    }

    #[tokio::test]
    async fn test_fetch_page_applies_search() {
        let source = source();
        let search = parse_search("filters[id][$gte]=2&sort=title:desc").unwrap();
        let query = PageQuery::new(Some(&search), Pagination::new(1, 10));
        let records = source
            .fetch_page(&article(), &Population::All, &query)
            .await
            .unwrap();

        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![5, 4, 3, 2]);
    }

    #[tokio::test]
    async fn test_fetch_by_ids_skips_missing() {
        let source = source();
        let records = source
            .fetch_by_ids(&article(), &Population::All, &[EntryId(2), EntryId(42)])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            source.fetch_log().unwrap(),
            vec![FetchLogEntry::Ids {
                model: article(),
                requested: 2,
                returned: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_injected_page_failure() {
        let source = source();
        source.fail_page(article(), 1).unwrap();
        let query = PageQuery::new(None, Pagination::new(1, 10));
        let result = source.fetch_page(&article(), &Population::All, &query).await;

        assert!(matches!(result, Err(quarry_core::Error::Source(_))));
        assert!(source.fetch_log().unwrap().is_empty());
    }

    #[test]
    fn test_insert_rejects_rows_without_id() {
        let source = source();
        assert!(matches!(
            source.insert("api::article.article", json!({ "title": "x" })),
            Err(SourceError::Dataset(_))
        ));
    }
}
