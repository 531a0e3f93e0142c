//! Accumulating export snapshot

use crate::flatten::FlattenedRecord;
use crate::record::EntryId;
use crate::schema::ModelId;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Envelope format version
pub const EXPORT_VERSION: u32 = 2;

/// Flattened records keyed by model, then by identifier
///
/// Once a `(model, id)` pair is present it is never overwritten: merges
/// keep the first record seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExportStore {
    models: BTreeMap<ModelId, BTreeMap<EntryId, FlattenedRecord>>,
}

impl ExportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, model: &ModelId, id: EntryId) -> bool {
        self.models
            .get(model)
            .is_some_and(|records| records.contains_key(&id))
    }

    pub fn get(&self, model: &ModelId, id: EntryId) -> Option<&FlattenedRecord> {
        self.models.get(model).and_then(|records| records.get(&id))
    }

    /// Records stored for one model, ordered by identifier
    pub fn records(&self, model: &ModelId) -> impl Iterator<Item = &FlattenedRecord> {
        self.models.get(model).into_iter().flat_map(|r| r.values())
    }

    pub fn ids(&self, model: &ModelId) -> Vec<EntryId> {
        self.models
            .get(model)
            .map(|records| records.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelId> {
        self.models.keys()
    }

    /// Total number of records across all models
    pub fn len(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record unless the pair is already present
    ///
    /// Returns `true` if the record was inserted.
    pub fn insert(&mut self, model: &ModelId, record: FlattenedRecord) -> bool {
        let records = self.models.entry(model.clone()).or_default();
        match records.entry(record.id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Merge one page of records for `model`, returning how many were new
    pub fn merge_page(
        &mut self,
        model: &ModelId,
        page: impl IntoIterator<Item = FlattenedRecord>,
    ) -> usize {
        page.into_iter()
            .map(|record| self.insert(model, record))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Merge another store into this one, returning how many records were new
    pub fn merge(&mut self, other: ExportStore) -> usize {
        other
            .models
            .into_iter()
            .map(|(model, records)| self.merge_page(&model, records.into_values()))
            .sum()
    }
}

/// Versioned unit handed to the format converter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEnvelope {
    pub version: u32,
    pub data: ExportStore,
}

impl ExportEnvelope {
    pub fn new(data: ExportStore) -> Self {
        Self {
            version: EXPORT_VERSION,
            data,
        }
    }
}
