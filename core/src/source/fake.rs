//! Hand-rolled in-memory [SourceConnector] fake used across unit and
//! integration tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::model::{Cell, ChangeRow, ColumnName, TableName};

use super::{ChangePredicate, SourceConnector};

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub columns: Vec<ColumnName>,
    pub rows: Vec<ChangeRow>,
}

/// An in-memory stand-in for a remote database. Tests populate `tables`
/// directly and call `select_changed`/`update_tracking_batch` through the
/// trait, exactly as the production code would.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    pub tables: HashMap<TableName, FakeTable>,
    pub marked: Vec<(TableName, ColumnName, Cell)>,
    pub fail_introspect: Vec<TableName>,
    /// Mirrors [super::mssql::MssqlConnector]'s own `site_key_column`: the
    /// column a `BySite`/`AllBySite` predicate filters rows on.
    pub site_key_column: HashMap<TableName, ColumnName>,
}

impl FakeConnector {
    pub fn with_table(mut self, table: TableName, columns: Vec<ColumnName>, rows: Vec<ChangeRow>) -> Self {
        self.tables.insert(table, FakeTable { columns, rows });
        self
    }

    pub fn with_site_key(mut self, table: TableName, column: ColumnName) -> Self {
        self.site_key_column.insert(table, column);
        self
    }
}

#[async_trait]
impl SourceConnector for FakeConnector {
    async fn introspect(&mut self, table: &TableName) -> Result<Vec<ColumnName>> {
        if self.fail_introspect.contains(table) {
            return Err(SyncError::NotFound(table.clone()));
        }
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| SyncError::NotFound(table.clone()))
    }

    async fn select_changed(
        &mut self,
        table: &TableName,
        predicate: ChangePredicate,
    ) -> Result<Vec<ChangeRow>> {
        let Some(fake_table) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        let site = match &predicate {
            ChangePredicate::BySite(site) | ChangePredicate::AllBySite(site) => Some(site),
            ChangePredicate::Generic | ChangePredicate::All => None,
        };

        let Some(site) = site else {
            return Ok(fake_table.rows.clone());
        };

        let Some(key_column) = self.site_key_column.get(table) else {
            return Ok(fake_table.rows.clone());
        };

        Ok(fake_table
            .rows
            .iter()
            .filter(|row| row.get(key_column).is_some_and(|cell| cell.0 == site.0))
            .cloned()
            .collect())
    }

    async fn update_tracking_batch(
        &mut self,
        table: &TableName,
        pk_column: &ColumnName,
        pk_values: &[Cell],
    ) -> Result<u64> {
        for value in pk_values {
            self.marked.push((table.clone(), pk_column.clone(), value.clone()));
        }
        Ok(pk_values.len() as u64)
    }
}
