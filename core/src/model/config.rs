use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::site::ColumnName;

/// `{dsn?, host, port, database, schema, username, password, driver}`.
/// Either `dsn` or (`host`, `database`) must be present -- enforced by
/// [crate::config_store::ConfigStore::load_source_config], not here, since
/// this type is also constructed directly by tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub dsn: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub driver: String,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.dsn.is_none() && (self.host.is_empty() || self.database.is_empty()) {
            return Err(
                "SourceConfig requires either `dsn` or both `host` and `database`".to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTransport {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub starttls: bool,
}

/// The three source columns that together form the remote cursor. Column
/// *names* are configurable -- some ERP schemas name them `ZTRANSFERT_0` /
/// `ZTRANSDATE_0` / `UPDDATTIM_0`, but this crate treats those as one
/// possible configuration rather than a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingTriplet {
    pub transfer_state: ColumnName,
    pub transfer_timestamp: ColumnName,
    pub row_updated_timestamp: ColumnName,
}

impl Default for TrackingTriplet {
    fn default() -> Self {
        TrackingTriplet {
            transfer_state: ColumnName::from("transfer_state"),
            transfer_timestamp: ColumnName::from("transfer_timestamp"),
            row_updated_timestamp: ColumnName::from("row_updated_timestamp"),
        }
    }
}

impl TrackingTriplet {
    /// True if all three columns are present in the table's introspected column list.
    pub fn present_in(&self, columns: &[ColumnName]) -> bool {
        columns.contains(&self.transfer_state)
            && columns.contains(&self.transfer_timestamp)
            && columns.contains(&self.row_updated_timestamp)
    }
}

/// Staging directory locations, from the `configurations_folders` config-store row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingFolders {
    pub base_dir: PathBuf,
}

impl StagingFolders {
    pub fn db_dir(&self, site: &super::site::SiteCode) -> PathBuf {
        self.base_dir.join("db").join(&site.0)
    }

    pub fn delta_dir(&self) -> PathBuf {
        self.base_dir.join("delta")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}
