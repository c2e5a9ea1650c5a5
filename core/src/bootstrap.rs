//! The Bootstrap Loader: runs once per process start, before the
//! Supervisor's first tick. For each site and table with a present
//! tracking triplet, does a full extraction (ignoring transfer state) and
//! marks every row transferred, mirroring the CDC marking logic but without
//! the incremental predicate.
//!
//! Idempotency is achieved at the process level, not by re-checking the
//! source: a zero-byte sentinel file gates whether Bootstrap runs at all for
//! a site. Bootstrap itself does not build or send an artifact.

use tracing::{info, warn};

use crate::error::Result;
use crate::model::config::{StagingFolders, TrackingTriplet};
use crate::model::{Cell, SiteCode, SyncParameters};
use crate::source::{ChangePredicate, SourceConnector};
use crate::tracking;

const SENTINEL_FILE: &str = ".bootstrapped";

fn sentinel_path(folders: &StagingFolders, site: &SiteCode) -> std::path::PathBuf {
    folders.db_dir(site).join(SENTINEL_FILE)
}

/// True if bootstrap has already run for `site` and should be skipped.
pub fn already_bootstrapped(folders: &StagingFolders, site: &SiteCode) -> bool {
    sentinel_path(folders, site).exists()
}

/// Runs the full extraction for every site that hasn't been bootstrapped
/// yet, then writes that site's sentinel file. Sites already bootstrapped
/// are skipped entirely -- this function does not re-read or validate the
/// source for them.
pub async fn run_bootstrap(
    conn: &mut dyn SourceConnector,
    params: &SyncParameters,
    tracking_triplet: &TrackingTriplet,
    folders: &StagingFolders,
) -> Result<()> {
    for site in &params.sites {
        if already_bootstrapped(folders, site) {
            continue;
        }

        bootstrap_site(conn, params, tracking_triplet, site).await?;

        let dir = folders.db_dir(site);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(sentinel_path(folders, site), b"")?;
        info!(%site, "bootstrap complete");
    }
    Ok(())
}

async fn bootstrap_site(
    conn: &mut dyn SourceConnector,
    params: &SyncParameters,
    tracking_triplet: &TrackingTriplet,
    site: &SiteCode,
) -> Result<()> {
    for table in &params.tables {
        let columns = match conn.introspect(table).await {
            Ok(columns) => columns,
            Err(err) => {
                warn!(%table, %site, error = %err, "bootstrap introspection failed, skipping table");
                continue;
            }
        };

        if !tracking_triplet.present_in(&columns) {
            warn!(%table, %site, "table is missing the tracking triplet, skipping for bootstrap");
            continue;
        }

        let Some(pk_column) = params.pk_column_for(table) else {
            warn!(%table, %site, "site-dependent table has no configured site key column, skipping");
            continue;
        };

        let predicate = if params.is_site_dependent(table) {
            ChangePredicate::AllBySite(site.clone())
        } else {
            ChangePredicate::All
        };

        let rows = conn.select_changed(table, predicate).await?;
        if rows.is_empty() {
            continue;
        }

        let pk_values: Vec<Cell> = rows
            .iter()
            .filter_map(|row| row.get(pk_column).cloned())
            .collect();
        tracking::mark_transferred(conn, table, pk_column, &pk_values).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::TrackingTriplet;
    use crate::model::{ChangeRow, ColumnName, TableName};
    use crate::source::fake::FakeConnector;
    use std::collections::{HashMap, HashSet};
    use tempfile_dir::TestDir;

    mod tempfile_dir {
        use std::path::{Path, PathBuf};

        pub struct TestDir(PathBuf);

        impl TestDir {
            pub fn new(label: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("sitesync-bootstrap-test-{}-{}", label, std::process::id()));
                let _ = std::fs::remove_dir_all(&path);
                std::fs::create_dir_all(&path).unwrap();
                TestDir(path)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TestDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[tokio::test]
    async fn bootstrap_writes_sentinel_and_marks_rows() {
        let dir = TestDir::new("first-run");
        let folders = StagingFolders { base_dir: dir.path().to_path_buf() };

        let table = TableName::from("PRODUCTS");
        let columns = vec![
            ColumnName::from("id"),
            ColumnName::from("transfer_state"),
            ColumnName::from("transfer_timestamp"),
            ColumnName::from("row_updated_timestamp"),
        ];
        let rows = vec![ChangeRow {
            table: table.clone(),
            columns: columns.clone(),
            values: vec![Cell("1".into()), Cell("0".into()), Cell("".into()), Cell("".into())],
        }];
        let mut conn = FakeConnector::default().with_table(table.clone(), columns, rows);

        let params = SyncParameters {
            tables: vec![table],
            site_dependent_tables: HashSet::new(),
            site_key_column: HashMap::new(),
            primary_key_column: ColumnName::from("id"),
            sites: vec![SiteCode::from("SITE_A")],
            tracking_triplet: TrackingTriplet::default(),
        };

        run_bootstrap(&mut conn, &params, &TrackingTriplet::default(), &folders)
            .await
            .unwrap();

        assert!(already_bootstrapped(&folders, &SiteCode::from("SITE_A")));
        assert_eq!(conn.marked.len(), 1);
    }

    #[tokio::test]
    async fn already_bootstrapped_site_is_skipped() {
        let dir = TestDir::new("already-done");
        let folders = StagingFolders { base_dir: dir.path().to_path_buf() };
        let site = SiteCode::from("SITE_A");

        std::fs::create_dir_all(folders.db_dir(&site)).unwrap();
        std::fs::write(folders.db_dir(&site).join(".bootstrapped"), b"").unwrap();

        let mut conn = FakeConnector::default();
        let params = SyncParameters {
            tables: vec![TableName::from("PRODUCTS")],
            site_dependent_tables: HashSet::new(),
            site_key_column: HashMap::new(),
            primary_key_column: ColumnName::from("id"),
            sites: vec![site],
            tracking_triplet: TrackingTriplet::default(),
        };

        run_bootstrap(&mut conn, &params, &TrackingTriplet::default(), &folders)
            .await
            .unwrap();

        assert!(conn.marked.is_empty());
    }
}
