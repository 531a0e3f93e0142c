//! SQLite data source

use crate::error::{SourceError, SourceResult};
use crate::filter::{matches, sort_rows};
use crate::populate::{Populator, RowLookup};
use crate::row::{into_row, RawRow};
use async_trait::async_trait;
use quarry_core::{
    DataSource, EntryId, ModelId, PageQuery, Population, Record, Result, SchemaRegistry,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite data source
///
/// Rows live in a single `entries(model, id, data)` table with the row
/// JSON in `data`.
pub struct SqliteSource {
    registry: Arc<dyn SchemaRegistry>,
    conn: Mutex<Connection>,
}

impl SqliteSource {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>, registry: Arc<dyn SchemaRegistry>) -> SourceResult<Self> {
        let conn = Connection::open(path).map_err(|e| SourceError::Database(e.to_string()))?;

        let source = Self {
            registry,
            conn: Mutex::new(conn),
        };
        source.init_tables()?;

        Ok(source)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory(registry: Arc<dyn SchemaRegistry>) -> SourceResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| SourceError::Database(e.to_string()))?;

        let source = Self {
            registry,
            conn: Mutex::new(conn),
        };
        source.init_tables()?;

        Ok(source)
    }

    fn init_tables(&self) -> SourceResult<()> {
        let conn = self.conn.lock().map_err(|e| SourceError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                model TEXT NOT NULL,
                id INTEGER NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (model, id)
            );
            "#,
        )?;

        Ok(())
    }

    /// Insert or replace a row; the row must be an object with an integer `id`
    pub fn insert(&self, model: impl Into<ModelId>, row: Value) -> SourceResult<EntryId> {
        let model = model.into();
        let (id, row) = into_row(&model, row)?;
        let data = serde_json::to_string(&row)?;

        let conn = self.conn.lock().map_err(|e| SourceError::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO entries (model, id, data) VALUES (?1, ?2, ?3)",
            params![model.as_str(), sql_id(id)?, data],
        )?;

        Ok(id)
    }

    /// Number of stored rows across all models
    pub fn len(&self) -> SourceResult<usize> {
        let conn = self.conn.lock().map_err(|e| SourceError::Database(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> SourceResult<bool> {
        Ok(self.len()? == 0)
    }

    fn page(
        &self,
        model: &ModelId,
        population: &Population,
        query: &PageQuery<'_>,
    ) -> SourceResult<Vec<Record>> {
        let conn = self.conn.lock().map_err(|e| SourceError::Database(e.to_string()))?;
        let lookup = ConnLookup(&*conn);
        let pagination = query.pagination;

        let rows = if query.filters.is_empty() && query.sort.is_none() {
            let mut stmt = conn.prepare_cached(
                "SELECT data FROM entries WHERE model = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
            )?;
            let data = stmt.query_map(
                params![
                    model.as_str(),
                    pagination.page_size as i64,
                    pagination.offset() as i64
                ],
                |row| row.get::<_, String>(0),
            )?;
            let mut rows = Vec::new();
            for row in data {
                rows.push(parse_row(&row?)?);
            }
            rows
        } else {
            let mut stmt = conn.prepare_cached("SELECT data FROM entries WHERE model = ?1")?;
            let data = stmt.query_map(params![model.as_str()], |row| row.get::<_, String>(0))?;
            let mut rows = Vec::new();
            for row in data {
                let row = parse_row(&row?)?;
                if matches(&row, query.filters) {
                    rows.push(row);
                }
            }
            sort_rows(&mut rows, query.sort);
            rows.into_iter()
                .skip(pagination.offset())
                .take(pagination.page_size)
                .collect()
        };

        let populator = Populator::new(self.registry.as_ref(), &lookup);
        rows.iter()
            .map(|row| populator.populate(model, row, population))
            .collect()
    }

    fn by_ids(
        &self,
        model: &ModelId,
        population: &Population,
        ids: &[EntryId],
    ) -> SourceResult<Vec<Record>> {
        let conn = self.conn.lock().map_err(|e| SourceError::Database(e.to_string()))?;
        let lookup = ConnLookup(&*conn);
        let populator = Populator::new(self.registry.as_ref(), &lookup);

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = lookup.row(model, *id)? {
                records.push(populator.populate(model, &row, population)?);
            }
        }
        Ok(records)
    }
}

/// Point lookups against an open connection
struct ConnLookup<'c>(&'c Connection);

impl RowLookup for ConnLookup<'_> {
    fn row(&self, model: &ModelId, id: EntryId) -> SourceResult<Option<RawRow>> {
        let mut stmt = self
            .0
            .prepare_cached("SELECT data FROM entries WHERE model = ?1 AND id = ?2")?;
        let data: Option<String> = stmt
            .query_row(params![model.as_str(), sql_id(id)?], |row| row.get(0))
            .optional()?;
        data.map(|d| parse_row(&d)).transpose()
    }
}

fn parse_row(data: &str) -> SourceResult<RawRow> {
    match serde_json::from_str(data)? {
        Value::Object(map) => Ok(map),
        _ => Err(SourceError::Database("stored row is not a JSON object".to_string())),
    }
}

fn sql_id(id: EntryId) -> SourceResult<i64> {
    i64::try_from(id.0).map_err(|_| SourceError::Database(format!("id {} out of range", id)))
}

#[async_trait]
impl DataSource for SqliteSource {
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
