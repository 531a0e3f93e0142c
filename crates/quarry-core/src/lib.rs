//! Quarry Core - Content-graph export engine
//!
//! This crate provides the schema and record types, the population and
//! hierarchy planners, and the traversal engine that turns a depth-bounded
//! walk over a content graph into a flat, versioned export snapshot.
//! Record storage is abstracted behind [`DataSource`].

pub mod convert;
pub mod error;
pub mod export;
pub mod flatten;
pub mod hierarchy;
pub mod limits;
pub mod population;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod source;
pub mod store;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use convert::{convert, ExportFormat};
pub use error::{Error, Result};
pub use export::{ExportOptions, ExportOutcome, ExportRequest, Exporter, FetchErrorPolicy};
pub use flatten::{flatten, FlatValue, FlattenedRecord, ZoneRef};
pub use hierarchy::{HierarchyBuilder, HierarchyChild, HierarchyNode};
pub use population::{Population, PopulationPlanner};
pub use query::{
    parse_search, Condition, Operator, PageQuery, Pagination, SearchSpec, SortDirection, SortSpec,
};
pub use record::{EntryId, FieldValue, Record, LOCALIZATIONS_FIELD};
pub use registry::{
    ModelRegistry, RegistryDocument, SchemaRegistry, MEDIA_MODEL, OPERATOR_MODEL, WHOLE_DATABASE,
};
pub use schema::{Attribute, AttributeKind, AttributeSpec, Model, ModelId, ModelKind};
pub use source::DataSource;
pub use store::{ExportEnvelope, ExportStore, EXPORT_VERSION};
pub use traversal::{ExportStats, FetchMode, Traversal};
