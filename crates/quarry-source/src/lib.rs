//! Quarry Source - Data-source backends for the export engine
//!
//! This crate provides the stores the traversal engine reads from: an
//! in-memory source and, behind the `sqlite` feature, a SQLite source.
//! Both keep rows flat and populate them on fetch.

#![allow(clippy::result_large_err)]

pub mod dataset;
pub mod error;
pub mod filter;
pub mod memory;
pub mod populate;
pub mod row;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dataset::Dataset;
pub use error::{SourceError, SourceResult};
pub use memory::{FetchLogEntry, MemorySource};
pub use populate::{Populator, RowLookup, Tables};
pub use row::RawRow;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;
