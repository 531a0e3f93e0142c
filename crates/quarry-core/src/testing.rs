//! Scripted data source for engine tests

use crate::error::{Error, Result};
use crate::population::Population;
use crate::query::PageQuery;
use crate::record::{EntryId, Record};
use crate::schema::ModelId;
use crate::source::DataSource;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// One recorded fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchCall {
    Page { model: String, page: usize, returned: usize },
    Ids { model: String, ids: Vec<u64> },
}

/// Serves pre-populated records, ignoring population and filters
#[derive(Default)]
pub struct StubSource {
    records: BTreeMap<ModelId, Vec<Record>>,
    failing_pages: HashSet<(ModelId, usize)>,
    fail_ids: HashSet<ModelId>,
    calls: Mutex<Vec<FetchCall>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, model: &str, records: Vec<Record>) -> Self {
        self.records
            .entry(ModelId::new(model))
            .or_default()
            .extend(records);
        self
    }

    pub fn failing_page(mut self, model: &str, page: usize) -> Self {
        self.failing_pages.insert((ModelId::new(model), page));
        self
    }

    pub fn failing_ids(mut self, model: &str) -> Self {
        self.fail_ids.insert(ModelId::new(model));
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, model: &str) -> Vec<FetchCall> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                FetchCall::Page { model: m, .. } | FetchCall::Ids { model: m, .. } => m == model,
            })
            .collect()
    }

    fn log(&self, call: FetchCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DataSource for StubSource {
    async fn fetch_page(
        &self,
        model: &ModelId,
        _population: &Population,
        query: &PageQuery<'_>,
    ) -> Result<Vec<Record>> {
        let page = query.pagination.page;
        if self.failing_pages.contains(&(model.clone(), page)) {
            self.log(FetchCall::Page {
                model: model.to_string(),
                page,
                returned: 0,
            });
            return Err(Error::Source("injected page failure".to_string()));
        }

        let records: Vec<Record> = self
            .records
            .get(model)
            .map(|all| {
                all.iter()
                    .skip(query.pagination.offset())
                    .take(query.pagination.page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.log(FetchCall::Page {
            model: model.to_string(),
            page,
            returned: records.len(),
        });
        Ok(records)
    }

    async fn fetch_by_ids(
        &self,
        model: &ModelId,
        _population: &Population,
        ids: &[EntryId],
    ) -> Result<Vec<Record>> {
        self.log(FetchCall::Ids {
            model: model.to_string(),
            ids: ids.iter().map(|id| id.0).collect(),
        });
        if self.fail_ids.contains(model) {
            return Err(Error::Source("injected id failure".to_string()));
        }

        Ok(self
            .records
            .get(model)
            .map(|all| {
                all.iter()
                    .filter(|r| ids.contains(&r.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
