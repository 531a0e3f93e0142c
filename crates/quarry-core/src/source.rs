//! Data-source trait consumed by the traversal engine

use crate::error::Result;
use crate::population::Population;
use crate::query::PageQuery;
use crate::record::{EntryId, Record};
use crate::schema::ModelId;
use async_trait::async_trait;

/// Paginated record fetching
///
/// Both methods may return fewer records than requested. Returned records
/// are populated according to `population`.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one page of records, optionally filtered and sorted
    async fn fetch_page(
        &self,
        model: &ModelId,
        population: &Population,
        query: &PageQuery<'_>,
    ) -> Result<Vec<Record>>;

    /// Fetch exactly the records with the given identifiers
    async fn fetch_by_ids(
        &self,
        model: &ModelId,
        population: &Population,
        ids: &[EntryId],
    ) -> Result<Vec<Record>>;
}
