//! The Source Connector component: reads changed rows from the remote
//! database and writes tracking-state updates back to it.

pub mod mssql;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Cell, ChangeRow, ColumnName, SiteCode, TableName};

/// How a table's changed rows should be scoped for one detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePredicate {
    /// `transfer_state = 0 OR (transfer_state = 2 AND row_updated_timestamp > transfer_timestamp)`
    /// applied with no site filter.
    Generic,
    /// The same predicate, additionally filtered to one site's key column.
    BySite(SiteCode),
    /// No filter at all -- every row in the table, used by the Bootstrap
    /// Loader's initial full extraction.
    All,
    /// `All`, filtered to one site's key column.
    AllBySite(SiteCode),
}

/// Everything the Change Detector needs from a remote database connection.
/// Implemented by [mssql::MssqlConnector] in production and by an in-memory
/// fake in tests.
#[async_trait]
pub trait SourceConnector: Send {
    /// Returns the table's column names in source-declared order, or
    /// [crate::error::SyncError::NotFound] if the table doesn't exist.
    async fn introspect(&mut self, table: &TableName) -> Result<Vec<ColumnName>>;

    /// Reads every row matching `predicate` for `table`, already decoded to
    /// [Cell] values via [crate::encoding].
    async fn select_changed(
        &mut self,
        table: &TableName,
        predicate: ChangePredicate,
    ) -> Result<Vec<ChangeRow>>;

    /// Marks the given primary-key values as transferred (`transfer_state = 2`,
    /// `transfer_timestamp = now()`), chunked into batches of at most 1000 by
    /// the implementation. Returns the total number of rows updated.
    async fn update_tracking_batch(
        &mut self,
        table: &TableName,
        pk_column: &ColumnName,
        pk_values: &[Cell],
    ) -> Result<u64>;
}
