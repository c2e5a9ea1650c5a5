use std::{error::Error, fmt, result};

use crate::model::site::TableName;

pub type Result<T, E = SyncError> = result::Result<T, E>;

/// The error taxonomy of the sync engine. Every variant is confined by its
/// caller to the smallest scope that makes sense (cell, row, table, site) --
/// only [SyncError::Config] ever reaches `main` and exits the process.
#[derive(Debug)]
pub enum SyncError {
    /// Invalid or missing configuration at startup. Fatal.
    Config(String),
    /// The table is not present in the source schema.
    NotFound(TableName),
    /// The tracking triplet is missing; the table is skipped for this tick.
    Ineligible(TableName),
    /// Network, authentication, or other transient RDBMS/SMTP error.
    Transient(String),
    /// A single cell failed to decode under the configured encoding.
    Encoding(String),
    /// SMTP delivery to a site's recipient failed.
    Delivery(String),
    /// Anything else -- confined to the table or site that raised it.
    Internal(String),
}

impl Error for SyncError {}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncError::Config(s) => write!(f, "configuration error: {s}"),
            SyncError::NotFound(t) => write!(f, "table {t} not found in source schema"),
            SyncError::Ineligible(t) => write!(f, "table {t} is missing the tracking triplet"),
            SyncError::Transient(s) => write!(f, "transient error: {s}"),
            SyncError::Encoding(s) => write!(f, "encoding error: {s}"),
            SyncError::Delivery(s) => write!(f, "delivery error: {s}"),
            SyncError::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Internal(e.to_string())
    }
}

impl From<csv::Error> for SyncError {
    fn from(e: csv::Error) -> Self {
        SyncError::Internal(e.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(e: serde_yaml::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}

impl From<diesel::result::Error> for SyncError {
    fn from(e: diesel::result::Error) -> Self {
        SyncError::Config(format!("config store: {e}"))
    }
}

impl From<diesel::result::ConnectionError> for SyncError {
    fn from(e: diesel::result::ConnectionError) -> Self {
        SyncError::Config(format!("config store connection: {e}"))
    }
}

impl From<tiberius::error::Error> for SyncError {
    fn from(e: tiberius::error::Error) -> Self {
        match e {
            tiberius::error::Error::Io { .. } | tiberius::error::Error::Routing { .. } => {
                SyncError::Transient(e.to_string())
            }
            other => SyncError::Internal(other.to_string()),
        }
    }
}

impl From<lettre::error::Error> for SyncError {
    fn from(e: lettre::error::Error) -> Self {
        SyncError::Delivery(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for SyncError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        SyncError::Delivery(e.to_string())
    }
}

impl From<lettre::address::AddressError> for SyncError {
    fn from(e: lettre::address::AddressError) -> Self {
        SyncError::Delivery(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Internal(e.to_string())
    }
}
