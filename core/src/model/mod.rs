pub mod config;
pub mod row;
pub mod site;

pub use config::{EmailTransport, SourceConfig, StagingFolders, TrackingTriplet};
pub use row::{Cell, ChangeRow, ChangeSet, Scope};
pub use site::{ColumnName, SiteBinding, SiteCode, SyncParameters, TableName};
