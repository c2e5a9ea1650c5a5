//! Reads the four read-only configuration tables out of a local embedded
//! SQLite database. This crate never writes to this database -- it is
//! provisioned and populated externally, outside this repository's scope.

pub mod schema;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::{Result, SyncError};
use crate::model::{EmailTransport, SiteBinding, SourceConfig, StagingFolders};
use crate::model::site::SiteCode;

#[derive(Queryable)]
struct DatabaseConfigurationRow {
    #[allow(dead_code)]
    id: i32,
    dsn: Option<String>,
    #[allow(dead_code)]
    connection_type: Option<String>,
    host: Option<String>,
    port: Option<i32>,
    database: Option<String>,
    db_schema: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Queryable)]
struct EmailConfigRow {
    #[allow(dead_code)]
    id: i32,
    smtp_server: String,
    smtp_username: String,
    smtp_password: String,
    smtp_port: i32,
    #[allow(dead_code)]
    to_email: Option<String>,
}

#[derive(Queryable)]
struct SiteConfigRow {
    #[allow(dead_code)]
    id: i32,
    site: String,
    email: String,
}

#[derive(Queryable)]
struct ConfigurationsFolderRow {
    #[allow(dead_code)]
    id: i32,
    base_dir: String,
}

/// A connection to the local config-store SQLite database, and the typed
/// loaders built over it. Every load method expects exactly one row in its
/// table and returns [SyncError::Config] otherwise.
pub struct ConfigStore {
    conn: SqliteConnection,
}

impl ConfigStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let conn = SqliteConnection::establish(database_url)?;
        Ok(Self { conn })
    }

    pub fn load_source_config(&mut self) -> Result<SourceConfig> {
        use schema::database_configuration::dsl::*;
        let rows: Vec<DatabaseConfigurationRow> =
            database_configuration.load(&mut self.conn)?;
        let row = one_row(rows, "database_configuration")?;

        let config = SourceConfig {
            dsn: row.dsn,
            host: row.host.unwrap_or_default(),
            port: row.port.unwrap_or(1433) as u16,
            database: row.database.unwrap_or_default(),
            schema: row.db_schema.unwrap_or_default(),
            username: row.username,
            password: row.password,
            driver: "ODBC Driver 17 for SQL Server".to_string(),
        };
        config
            .validate()
            .map_err(SyncError::Config)?;
        Ok(config)
    }

    pub fn load_email_transport(&mut self) -> Result<EmailTransport> {
        use schema::email_configs::dsl::*;
        let rows: Vec<EmailConfigRow> = email_configs.load(&mut self.conn)?;
        let row = one_row(rows, "email_configs")?;

        Ok(EmailTransport {
            smtp_host: row.smtp_server,
            smtp_port: row.smtp_port as u16,
            username: Some(row.smtp_username.clone()),
            password: Some(row.smtp_password),
            from_address: row.smtp_username,
            starttls: true,
        })
    }

    pub fn load_site_bindings(&mut self) -> Result<SiteBinding> {
        use schema::site_configs::dsl::*;
        let rows: Vec<SiteConfigRow> = site_configs.load(&mut self.conn)?;
        if rows.is_empty() {
            return Err(SyncError::Config(
                "site_configs has no rows; at least one site is required".to_string(),
            ));
        }
        Ok(rows
            .into_iter()
            .map(|r| (SiteCode::from(r.site), r.email))
            .collect())
    }

    pub fn load_staging_folders(&mut self) -> Result<StagingFolders> {
        use schema::configurations_folders::dsl::*;
        let rows: Vec<ConfigurationsFolderRow> =
            configurations_folders.load(&mut self.conn)?;
        let row = one_row(rows, "configurations_folders")?;
        Ok(StagingFolders {
            base_dir: row.base_dir.into(),
        })
    }
}

fn one_row<T>(mut rows: Vec<T>, table: &str) -> Result<T> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(SyncError::Config(format!("{table} has no rows; exactly one is required"))),
        n => Err(SyncError::Config(format!(
            "{table} has {n} rows; exactly one is required"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store_with(statements: &[&str]) -> ConfigStore {
        let mut store = ConfigStore::connect(":memory:").unwrap();
        for stmt in statements {
            diesel::sql_query(*stmt).execute(&mut store.conn).unwrap();
        }
        store
    }

    #[test]
    fn loads_source_config_from_single_row() {
        let mut store = memory_store_with(&[
            "CREATE TABLE database_configuration (
                id INTEGER, dsn TEXT, connection_type TEXT, host TEXT,
                port INTEGER, database TEXT, db_schema TEXT, username TEXT,
                password TEXT
             )",
            "INSERT INTO database_configuration VALUES
                (1, NULL, 'tcp', 'db.example.com', 1433, 'Prod', 'dbo', 'svc', 'secret')",
        ]);
        let config = store.load_source_config().unwrap();
        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.database, "Prod");
        assert_eq!(config.port, 1433);
    }

    #[test]
    fn rejects_empty_site_configs() {
        let mut store = memory_store_with(&[
            "CREATE TABLE site_configs (id INTEGER, site TEXT, email TEXT)",
        ]);
        let err = store.load_site_bindings().unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn loads_multiple_site_bindings() {
        let mut store = memory_store_with(&[
            "CREATE TABLE site_configs (id INTEGER, site TEXT, email TEXT)",
            "INSERT INTO site_configs VALUES (1, 'SITE_A', 'a@example.com')",
            "INSERT INTO site_configs VALUES (2, 'SITE_B', 'b@example.com')",
        ]);
        let bindings = store.load_site_bindings().unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings.get(&SiteCode::from("SITE_A")).unwrap(),
            "a@example.com"
        );
    }
}
