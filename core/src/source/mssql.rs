//! `tiberius`-backed [SourceConnector] implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config, Query, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::warn;

use crate::encoding::{decode_cell, encode_bytes, encode_decimal, encode_timestamp};
use crate::error::{Result, SyncError};
use crate::model::config::TrackingTriplet;
use crate::model::{Cell, ChangeRow, ColumnName, SiteCode, SourceConfig, TableName};

use super::{ChangePredicate, SourceConnector};

/// Chunk size for `update_tracking_batch`'s `UPDATE ... WHERE pk IN (...)` statements.
const TRACKING_BATCH_SIZE: usize = 1000;

pub struct MssqlConnector {
    client: Client<Compat<TcpStream>>,
    schema: String,
    tracking: TrackingTriplet,
    site_key_column: HashMap<TableName, ColumnName>,
}

impl MssqlConnector {
    /// Establishes a TCP connection and authenticates, using a DSN if one
    /// is configured or an explicit host/port/database tuple otherwise.
    /// `tiberius` only speaks SQL-auth or AAD over TCP, never NTLM
    /// passthrough, so a configured trusted-connection mode still requires
    /// `username`/`password` to be set.
    pub async fn connect(
        config: &SourceConfig,
        tracking: TrackingTriplet,
        site_key_column: HashMap<TableName, ColumnName>,
    ) -> Result<Self> {
        let mut client_config = Config::new();

        if let Some(dsn) = &config.dsn {
            client_config.host(dsn);
        } else {
            client_config.host(&config.host);
            client_config.port(config.port);
        }
        client_config.database(&config.database);
        client_config.trust_cert();

        match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                client_config.authentication(AuthMethod::sql_server(user, pass));
            }
            _ => {
                return Err(SyncError::Config(
                    "MssqlConnector requires username and password; trusted/NTLM \
                     connections are not representable over tiberius's TCP transport"
                        .to_string(),
                ));
            }
        }

        let tcp = TcpStream::connect(client_config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let client = match Client::connect(client_config, tcp.compat_write()).await {
            Ok(client) => client,
            Err(tiberius::error::Error::Routing { host, port }) => {
                let mut redirected = Config::new();
                redirected.host(&host);
                redirected.port(port);
                redirected.database(&config.database);
                redirected.trust_cert();
                if let (Some(user), Some(pass)) = (&config.username, &config.password) {
                    redirected.authentication(AuthMethod::sql_server(user, pass));
                }
                let tcp = TcpStream::connect(redirected.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(redirected, tcp.compat_write()).await?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            client,
            schema: config.schema.clone(),
            tracking,
            site_key_column,
        })
    }

    fn qualified(&self, table: &TableName) -> String {
        format!("[{}].[{}]", self.schema, table.0)
    }

    /// Returns the predicate's SQL text (using `@P1`-style placeholders for
    /// any site code it needs) and the values to bind to those placeholders,
    /// in order. Never interpolates the site code itself into the text.
    fn predicate_sql(&self, table: &TableName, predicate: &ChangePredicate) -> Result<(String, Vec<String>)> {
        let base = format!(
            "([{ts}] = 0 OR ([{ts}] = 2 AND [{ru}] > [{tt}]))",
            ts = self.tracking.transfer_state.0,
            ru = self.tracking.row_updated_timestamp.0,
            tt = self.tracking.transfer_timestamp.0,
        );
        let key_column = |table: &TableName| -> Result<&ColumnName> {
            self.site_key_column.get(table).ok_or_else(|| {
                SyncError::Internal(format!(
                    "table {table} has no configured site key column for a site-scoped predicate"
                ))
            })
        };
        match predicate {
            ChangePredicate::Generic => Ok((base, Vec::new())),
            ChangePredicate::BySite(site) => {
                let key_col = key_column(table)?;
                Ok((
                    format!("{base} AND [{}] = @P1", key_col.0),
                    vec![site.0.clone()],
                ))
            }
            ChangePredicate::All => Ok(("1 = 1".to_string(), Vec::new())),
            ChangePredicate::AllBySite(site) => {
                let key_col = key_column(table)?;
                Ok((format!("[{}] = @P1", key_col.0), vec![site.0.clone()]))
            }
        }
    }
}

#[async_trait]
impl SourceConnector for MssqlConnector {
    async fn introspect(&mut self, table: &TableName) -> Result<Vec<ColumnName>> {
        let sql = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 ORDER BY ORDINAL_POSITION";
        let mut query = Query::new(sql);
        query.bind(self.schema.as_str());
        query.bind(table.0.as_str());
        let mut stream = query.query(&mut self.client).await?;
        let mut columns = Vec::new();
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                let name: &str = row
                    .try_get(0)?
                    .ok_or_else(|| SyncError::Internal("null COLUMN_NAME".to_string()))?;
                columns.push(ColumnName::from(name));
            }
        }
        if columns.is_empty() {
            return Err(SyncError::NotFound(table.clone()));
        }
        Ok(columns)
    }

    async fn select_changed(
        &mut self,
        table: &TableName,
        predicate: ChangePredicate,
    ) -> Result<Vec<ChangeRow>> {
        let columns = self.introspect(table).await?;
        let (predicate_sql, predicate_params) = self.predicate_sql(table, &predicate)?;
        let column_list = columns
            .iter()
            .map(|c| format!("[{}]", c.0))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {column_list} FROM {} WHERE {predicate_sql}",
            self.qualified(table)
        );

        let mut query = Query::new(sql);
        for param in &predicate_params {
            query.bind(param.as_str());
        }
        let mut stream = query.query(&mut self.client).await?;
        let mut rows = Vec::new();
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                let mut values = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    let (cell, err) = cell_from_row(&row, i)?;
                    if let Some(err) = err {
                        warn!(%table, column = %column.0, error = %err, "cell decode error");
                    }
                    values.push(cell);
                }
                rows.push(ChangeRow {
                    table: table.clone(),
                    columns: columns.clone(),
                    values,
                });
            }
        }
        Ok(rows)
    }

    async fn update_tracking_batch(
        &mut self,
        table: &TableName,
        pk_column: &ColumnName,
        pk_values: &[Cell],
    ) -> Result<u64> {
        let mut total = 0u64;
        for chunk in pk_values.chunks(TRACKING_BATCH_SIZE) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("@P{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET [{}] = 2, [{}] = SYSDATETIME() WHERE [{}] IN ({placeholders})",
                self.qualified(table),
                self.tracking.transfer_state.0,
                self.tracking.transfer_timestamp.0,
                pk_column.0,
            );
            let mut query = Query::new(sql);
            for cell in chunk {
                query.bind(cell.0.as_str());
            }
            let result = query.execute(&mut self.client).await?;
            total += result.rows_affected().iter().sum::<u64>();
        }
        Ok(total)
    }
}

fn cell_from_row(row: &tiberius::Row, index: usize) -> Result<(Cell, Option<SyncError>)> {
    use tiberius::ColumnType;

    let column = &row.columns()[index];
    match column.column_type() {
        ColumnType::Decimaln | ColumnType::Numericn | ColumnType::Money | ColumnType::Money4 => {
            Ok((
                row.try_get::<rust_decimal::Decimal, usize>(index)?
                    .map(encode_decimal)
                    .unwrap_or_else(|| Cell(String::new())),
                None,
            ))
        }
        ColumnType::Datetime
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::Datetime4 => Ok((
            row.try_get::<chrono::NaiveDateTime, usize>(index)?
                .map(encode_timestamp)
                .unwrap_or_else(|| Cell(String::new())),
            None,
        )),
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => Ok((
            row.try_get::<&[u8], usize>(index)?
                .map(encode_bytes)
                .unwrap_or_else(|| Cell(String::new())),
            None,
        )),
        _ => {
            if let Some(text) = row.try_get::<&str, usize>(index)? {
                Ok((Cell(text.to_string()), None))
            } else if let Some(bytes) = row.try_get::<&[u8], usize>(index)? {
                Ok(decode_cell(bytes))
            } else {
                match column.column_type() {
                    ColumnType::Int1 | ColumnType::Int2 | ColumnType::Int4 | ColumnType::Int8 => {
                        Ok((
                            row.try_get::<i64, usize>(index)?
                                .map(|v| Cell(v.to_string()))
                                .unwrap_or_else(|| Cell(String::new())),
                            None,
                        ))
                    }
                    ColumnType::Bit => Ok((
                        row.try_get::<bool, usize>(index)?
                            .map(|v| Cell(v.to_string()))
                            .unwrap_or_else(|| Cell(String::new())),
                        None,
                    )),
                    ColumnType::Float4 | ColumnType::Float8 => Ok((
                        row.try_get::<f64, usize>(index)?
                            .map(|v| Cell(v.to_string()))
                            .unwrap_or_else(|| Cell(String::new())),
                        None,
                    )),
                    other => {
                        warn!(?other, "unhandled column type, emitting empty cell");
                        Ok((Cell(String::new()), None))
                    }
                }
            }
        }
    }
}
