use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::TrackingTriplet;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(TableName);
string_newtype!(ColumnName);
string_newtype!(SiteCode);

/// Site code -> recipient address, loaded from the `site_configs` config-store table.
pub type SiteBinding = HashMap<SiteCode, String>;

/// Everything the engine needs to decide which tables to scan and how to
/// partition site-dependent ones. Not one of the four config-store tables --
/// loaded from a sibling YAML file. See DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncParameters {
    pub tables: Vec<TableName>,
    #[serde(default)]
    pub site_dependent_tables: HashSet<TableName>,
    #[serde(default)]
    pub site_key_column: HashMap<TableName, ColumnName>,
    pub primary_key_column: ColumnName,
    pub sites: Vec<SiteCode>,
    /// The remote cursor's column names. Defaults to
    /// `transfer_state`/`transfer_timestamp`/`row_updated_timestamp`, but
    /// ERP schemas that name them differently (e.g. `ZTRANSFERT_0`) can
    /// override any or all of the three here.
    #[serde(default)]
    pub tracking_triplet: TrackingTriplet,
}

impl SyncParameters {
    pub fn is_site_dependent(&self, table: &TableName) -> bool {
        self.site_dependent_tables.contains(table)
    }

    /// The column used as primary key when marking rows transferred: the
    /// configured site-key column for site-dependent tables, otherwise the
    /// global `primary_key_column`.
    pub fn pk_column_for(&self, table: &TableName) -> Option<&ColumnName> {
        if self.is_site_dependent(table) {
            self.site_key_column.get(table)
        } else {
            Some(&self.primary_key_column)
        }
    }
}
