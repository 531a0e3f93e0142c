//! Depth-bounded traversal of the content graph
//!
//! A traversal fetches the records of one model, flattens them into the
//! export store and then descends into every attribute that leads to
//! another model, fetching the referenced records by identifier. The
//! hierarchy decides which child model each attribute leads to; the
//! remaining depth decides how far population reaches on each fetch.

use crate::error::{Error, Result};
use crate::export::{ExportOptions, FetchErrorPolicy};
use crate::flatten::flatten;
use crate::hierarchy::HierarchyNode;
use crate::population::PopulationPlanner;
use crate::query::{PageQuery, Pagination, SearchSpec};
use crate::record::{EntryId, FieldValue, Record};
use crate::registry::SchemaRegistry;
use crate::schema::{AttributeKind, AttributeSpec, Model, ModelId};
use crate::source::DataSource;
use crate::store::ExportStore;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// How the records of a visited model are selected
#[derive(Debug, Clone, PartialEq)]
pub enum FetchMode<'a> {
    /// Page through every record, optionally filtered and sorted
    Discover { search: Option<&'a SearchSpec> },
    /// Fetch exactly these identifiers
    Ids(Vec<EntryId>),
}

impl<'a> FetchMode<'a> {
    pub fn discover() -> Self {
        Self::Discover { search: None }
    }

    /// Identifier mode; ids are deduplicated and sorted ascending
    pub fn ids(ids: impl IntoIterator<Item = EntryId>) -> Self {
        let ids: BTreeSet<EntryId> = ids.into_iter().collect();
        Self::Ids(ids.into_iter().collect())
    }
}

/// Traversal statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub pages_fetched: usize,
    pub records_fetched: usize,
    pub records_merged: usize,
    pub fetch_failures: usize,
    pub max_depth_reached: u32,
}

/// Child model to visit after a page has been merged
struct Descent<'n> {
    node: &'n HierarchyNode,
    ids: BTreeSet<EntryId>,
}

/// Traversal engine
pub struct Traversal<'a> {
    registry: &'a dyn SchemaRegistry,
    source: &'a dyn DataSource,
    options: &'a ExportOptions,
    stats: ExportStats,
}

impl<'a> Traversal<'a> {
    pub fn new(
        registry: &'a dyn SchemaRegistry,
        source: &'a dyn DataSource,
        options: &'a ExportOptions,
    ) -> Self {
        Self {
            registry,
            source,
            options,
            stats: ExportStats::default(),
        }
    }

    pub fn stats(&self) -> &ExportStats {
        &self.stats
    }

    pub fn into_stats(self) -> ExportStats {
        self.stats
    }

    /// Export `model` and everything reachable from it within `depth` levels
    ///
    /// Records already in `store` are never fetched again.
    pub async fn run(
        &mut self,
        store: &mut ExportStore,
        model: &ModelId,
        node: &HierarchyNode,
        depth: u32,
        mode: FetchMode<'_>,
    ) -> Result<()> {
        self.visit(store, model, node, depth, mode, 1).await
    }

    fn visit<'s>(
        &'s mut self,
        store: &'s mut ExportStore,
        model: &'s ModelId,
        node: &'s HierarchyNode,
        depth: u32,
        mode: FetchMode<'s>,
        level: u32,
    ) -> BoxFuture<'s, Result<()>> {
        Box::pin(async move {
            if self.options.is_excluded(model) {
                tracing::debug!("Skipping excluded model {}", model);
                return Ok(());
            }

            let registry = self.registry;
            let schema = registry.model(model)?;
            let planner = PopulationPlanner::new(registry, &self.options.excluded_models);
            let population = match planner.plan(model, depth)? {
                Some(population) => population,
                None => return Ok(()),
            };

            self.stats.max_depth_reached = self.stats.max_depth_reached.max(level);
            let page_size = self.options.page_size;

            match mode {
                FetchMode::Ids(ids) => {
                    for chunk in ids.chunks(page_size) {
                        tracing::debug!(
                            "Fetching {} {} record(s) by id at level {}",
                            chunk.len(),
                            model,
                            level
                        );
                        let records = match self.source.fetch_by_ids(model, &population, chunk).await {
                            Ok(records) => records,
                            Err(err) => {
                                self.fetch_failed(model, err)?;
                                continue;
                            }
                        };
                        self.page_fetched(store, schema, node, depth, level, records)
                            .await?;
                    }
                }
                FetchMode::Discover { search } => {
                    let mut page = 1;
                    loop {
                        let query = PageQuery::new(search, Pagination::new(page, page_size));
                        tracing::debug!("Fetching {} page {} at level {}", model, page, level);
                        let records = match self.source.fetch_page(model, &population, &query).await {
                            Ok(records) => records,
                            Err(err) => {
                                self.fetch_failed(model, err)?;
                                break;
                            }
                        };
                        let returned = records.len();
                        self.page_fetched(store, schema, node, depth, level, records)
                            .await?;
                        if returned < page_size {
                            break;
                        }
                        page += 1;
                    }
                }
            }

            Ok(())
        })
    }

    /// Merge one fetched page and descend into its references
    async fn page_fetched(
        &mut self,
        store: &mut ExportStore,
        schema: &Model,
        node: &HierarchyNode,
        depth: u32,
        level: u32,
        records: Vec<Record>,
    ) -> Result<()> {
        self.stats.pages_fetched += 1;
        self.stats.records_fetched += records.len();

        let mut records = if schema.localized {
            with_localizations(records)
        } else {
            records
        };
        for record in &mut records {
            self.strip_disallowed(schema, record);
        }

        let merged = store.merge_page(&schema.uid, records.iter().map(|r| flatten(r, schema)));
        self.stats.records_merged += merged;

        if depth <= 1 {
            return Ok(());
        }

        for descent in descents(schema, node, &records) {
            let child = &descent.node.model;
            let pending: Vec<EntryId> = descent
                .ids
                .into_iter()
                .filter(|id| !store.contains(child, *id))
                .collect();
            if pending.is_empty() {
                continue;
            }
            self.visit(
                store,
                child,
                descent.node,
                depth - 1,
                FetchMode::Ids(pending),
                level + 1,
            )
            .await?;
        }

        Ok(())
    }

    fn strip_disallowed(&self, schema: &Model, record: &mut Record) {
        for attr in schema.attributes_of_kind(AttributeKind::Relation) {
            if let AttributeSpec::Relation { target } = &attr.spec {
                if self.options.is_disallowed_target(target) && record.remove(&attr.name).is_some() {
                    tracing::trace!("Stripped {}.{} from record {}", schema.uid, attr.name, record.id);
                }
            }
        }
    }

    fn fetch_failed(&mut self, model: &ModelId, err: Error) -> Result<()> {
        self.stats.fetch_failures += 1;
        match self.options.fetch_error_policy {
            FetchErrorPolicy::Stop => {
                tracing::warn!("Fetch failed for {}, skipping remaining records: {}", model, err);
                Ok(())
            }
            FetchErrorPolicy::Propagate => Err(Error::Fetch {
                model: model.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Append sibling translations carried by the page's records
fn with_localizations(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<EntryId> = records.iter().map(|r| r.id).collect();
    let siblings: Vec<Record> = records
        .iter()
        .flat_map(Record::localizations)
        .filter(|sibling| seen.insert(sibling.id))
        .cloned()
        .collect();

    let mut records = records;
    records.extend(siblings);
    records
}

/// Child visits for a page, in descent order
fn descents<'n>(schema: &Model, node: &'n HierarchyNode, records: &[Record]) -> Vec<Descent<'n>> {
    let mut out = Vec::new();

    for kind in AttributeKind::DESCENT_ORDER {
        for attr in schema.attributes_of_kind(kind) {
            if kind == AttributeKind::DynamicZone {
                let mut by_kind: BTreeMap<ModelId, BTreeSet<EntryId>> = BTreeMap::new();
                for value in records.iter().filter_map(|r| r.get(&attr.name)) {
                    for (component, id) in zone_members(value) {
                        by_kind.entry(component).or_default().insert(id);
                    }
                }
                for (component, ids) in by_kind {
                    match node.zone(&attr.name, &component) {
                        Some(child) => out.push(Descent { node: child, ids }),
                        None => tracing::debug!(
                            "No hierarchy entry for {} in {}.{}",
                            component,
                            schema.uid,
                            attr.name
                        ),
                    }
                }
                continue;
            }

            let Some(child) = node.node(&attr.name) else {
                continue;
            };
            let ids: BTreeSet<EntryId> = records
                .iter()
                .filter_map(|r| r.get(&attr.name))
                .flat_map(FieldValue::referenced_ids)
                .collect();
            if !ids.is_empty() {
                out.push(Descent { node: child, ids });
            }
        }
    }

    out
}

/// `(component kind, id)` of every element of a dynamic-zone value
fn zone_members(value: &FieldValue) -> Vec<(ModelId, EntryId)> {
    match value {
        FieldValue::Null => Vec::new(),
        FieldValue::Record(element) => element
            .component
            .clone()
            .map(|kind| (kind, element.id))
            .into_iter()
            .collect(),
        FieldValue::Records(elements) => elements
            .iter()
            .filter_map(|e| e.component.clone().map(|kind| (kind, e.id)))
            .collect(),
        FieldValue::Scalar(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let kind = item.get("__component")?.as_str()?;
                let id = EntryId::from_json(item.get("id")?)?;
                Some((ModelId::new(kind), id))
            })
            .collect(),
        FieldValue::Scalar(_) => Vec::new(),
    }
}
