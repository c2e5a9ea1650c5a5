use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::site::{ColumnName, SiteCode, TableName};

/// A cell's already-converted textual form: decimals as canonical decimal
/// strings, timestamps as ISO-8601, bytes as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell(pub String);

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell(s)
    }
}

/// `{table, columns, values}` -- one changed row read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub table: TableName,
    pub columns: Vec<ColumnName>,
    pub values: Vec<Cell>,
}

impl ChangeRow {
    pub fn get(&self, column: &ColumnName) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }
}

/// Whether a table's changes were scoped to one site or apply to every site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Generic,
    Site(SiteCode),
}

/// The rows changed for one table in one scope, plus the column order they
/// were read in.
pub type TableChanges = (Vec<ColumnName>, Vec<ChangeRow>);

/// `ChangeSet(site)`: table -> (columns, rows), the unit delivered in one artifact.
pub type ChangeSet = HashMap<TableName, TableChanges>;

/// The full result of one tick's Change Detector pass, before aggregation:
/// every `(table, scope)` pair that had at least one changed row.
pub type DetectedChanges = HashMap<(Scope, TableName), TableChanges>;
