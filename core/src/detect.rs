//! The Change Detector: for each table, introspects it, skips it if the
//! tracking triplet is absent, builds the appropriate predicate, reads the
//! changed rows, and hands the primary-key projection to the Tracking
//! Writer.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::config::TrackingTriplet;
use crate::model::row::{DetectedChanges, Scope};
use crate::model::{Cell, ChangeRow, ColumnName, SyncParameters};
use crate::source::{ChangePredicate, SourceConnector};
use crate::tracking;

/// Runs one full detection pass over every table in `params.tables`, in
/// declared-list order, and every site in `params.sites`, in declared order.
/// Site-dependent tables are scoped per site; all others are read once under
/// [Scope::Generic]. Tables missing the tracking triplet are skipped with a
/// warning rather than aborting the tick.
pub async fn detect_changes(
    conn: &mut dyn SourceConnector,
    params: &SyncParameters,
    tracking_triplet: &TrackingTriplet,
) -> Result<DetectedChanges> {
    let mut detected = DetectedChanges::new();

    for table in &params.tables {
        let columns = match conn.introspect(table).await {
            Ok(columns) => columns,
            Err(err) => {
                warn!(%table, error = %err, "table introspection failed, skipping for this tick");
                continue;
            }
        };

        if !tracking_triplet.present_in(&columns) {
            warn!(%table, "table is missing the tracking triplet, skipping");
            continue;
        }

        let Some(pk_column) = params.pk_column_for(table) else {
            warn!(%table, "site-dependent table has no configured site key column, skipping");
            continue;
        };

        if params.is_site_dependent(table) {
            for site in &params.sites {
                let predicate = ChangePredicate::BySite(site.clone());
                let rows = conn.select_changed(table, predicate).await?;
                if rows.is_empty() {
                    continue;
                }
                mark_and_insert(
                    conn,
                    &mut detected,
                    Scope::Site(site.clone()),
                    table.clone(),
                    columns.clone(),
                    rows,
                    pk_column,
                )
                .await?;
            }
        } else {
            let rows = conn
                .select_changed(table, ChangePredicate::Generic)
                .await?;
            if rows.is_empty() {
                continue;
            }
            mark_and_insert(
                conn,
                &mut detected,
                Scope::Generic,
                table.clone(),
                columns.clone(),
                rows,
                pk_column,
            )
            .await?;
        }
    }

    info!(
        table_scope_pairs = detected.len(),
        "change detection pass complete"
    );
    Ok(detected)
}

async fn mark_and_insert(
    conn: &mut dyn SourceConnector,
    detected: &mut DetectedChanges,
    scope: Scope,
    table: crate::model::TableName,
    columns: Vec<ColumnName>,
    rows: Vec<ChangeRow>,
    pk_column: &ColumnName,
) -> Result<()> {
    let pk_values: Vec<Cell> = rows
        .iter()
        .filter_map(|row| row.get(pk_column).cloned())
        .collect();

    tracking::mark_transferred(conn, &table, pk_column, &pk_values).await?;

    detected.insert((scope, table), (columns, rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SiteCode, TableName};
    use crate::source::fake::FakeConnector;
    use std::collections::{HashMap as Map, HashSet};

    fn sample_row(table: &TableName, columns: &[ColumnName], values: &[&str]) -> ChangeRow {
        ChangeRow {
            table: table.clone(),
            columns: columns.to_vec(),
            values: values.iter().map(|v| Cell(v.to_string())).collect(),
        }
    }

    #[tokio::test]
    async fn generic_table_is_read_once_under_generic_scope() {
        let table = TableName::from("PRODUCTS");
        let columns = vec![
            ColumnName::from("id"),
            ColumnName::from("transfer_state"),
            ColumnName::from("transfer_timestamp"),
            ColumnName::from("row_updated_timestamp"),
        ];
        let rows = vec![sample_row(&table, &columns, &["1", "0", "", ""])];
        let mut conn = FakeConnector::default().with_table(table.clone(), columns, rows);

        let params = SyncParameters {
            tables: vec![table.clone()],
            site_dependent_tables: HashSet::new(),
            site_key_column: Map::new(),
            primary_key_column: ColumnName::from("id"),
            sites: vec![SiteCode::from("SITE_A")],
            tracking_triplet: TrackingTriplet::default(),
        };

        let detected = detect_changes(&mut conn, &params, &TrackingTriplet::default())
            .await
            .unwrap();

        assert_eq!(detected.len(), 1);
        assert!(detected.contains_key(&(Scope::Generic, table)));
        assert_eq!(conn.marked.len(), 1);
    }

    #[tokio::test]
    async fn ineligible_table_without_tracking_triplet_is_skipped() {
        let table = TableName::from("LEGACY");
        let columns = vec![ColumnName::from("id")];
        let mut conn = FakeConnector::default().with_table(table.clone(), columns, vec![]);

        let params = SyncParameters {
            tables: vec![table],
            site_dependent_tables: HashSet::new(),
            site_key_column: Map::new(),
            primary_key_column: ColumnName::from("id"),
            sites: vec![],
            tracking_triplet: TrackingTriplet::default(),
        };

        let detected = detect_changes(&mut conn, &params, &TrackingTriplet::default())
            .await
            .unwrap();
        assert!(detected.is_empty());
    }

    #[tokio::test]
    async fn site_dependent_table_is_partitioned_per_site() {
        let table = TableName::from("ORDERS");
        let columns = vec![
            ColumnName::from("site_code"),
            ColumnName::from("transfer_state"),
            ColumnName::from("transfer_timestamp"),
            ColumnName::from("row_updated_timestamp"),
        ];
        let rows = vec![
            sample_row(&table, &columns, &["SITE_A", "0", "", ""]),
            sample_row(&table, &columns, &["SITE_B", "0", "", ""]),
        ];
        let mut conn = FakeConnector::default()
            .with_table(table.clone(), columns, rows)
            .with_site_key(table.clone(), ColumnName::from("site_code"));

        let mut site_key_column = Map::new();
        site_key_column.insert(table.clone(), ColumnName::from("site_code"));
        let mut site_dependent_tables = HashSet::new();
        site_dependent_tables.insert(table.clone());

        let site_a = SiteCode::from("SITE_A");
        let site_b = SiteCode::from("SITE_B");
        let params = SyncParameters {
            tables: vec![table.clone()],
            site_dependent_tables,
            site_key_column,
            primary_key_column: ColumnName::from("id"),
            sites: vec![site_a.clone(), site_b.clone()],
            tracking_triplet: TrackingTriplet::default(),
        };

        let detected = detect_changes(&mut conn, &params, &TrackingTriplet::default())
            .await
            .unwrap();

        assert_eq!(detected.len(), 2);

        let (_, rows_a) = &detected[&(Scope::Site(site_a), table.clone())];
        assert_eq!(rows_a.len(), 1);
        assert_eq!(rows_a[0].get(&ColumnName::from("site_code")).unwrap().0, "SITE_A");

        let (_, rows_b) = &detected[&(Scope::Site(site_b), table)];
        assert_eq!(rows_b.len(), 1);
        assert_eq!(rows_b[0].get(&ColumnName::from("site_code")).unwrap().0, "SITE_B");

        // Marking happens per-site against each site's own row set.
        assert_eq!(conn.marked.len(), 2);
    }
}
