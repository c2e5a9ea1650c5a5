//! The Artifact Builder: writes one UTF-8-with-BOM delimited-text file per
//! non-empty [ChangeSet], with per-table headers interleaved into the row
//! stream rather than one global header.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::WriterBuilder;

use crate::error::Result;
use crate::model::{ChangeSet, SiteCode, TableName};

/// Summary of one written artifact, used for the tick's structured log
/// summary and the delivery email body.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub site: SiteCode,
    pub table_counts: Vec<(TableName, usize)>,
}

/// Writes `change_set` to `<delta_dir>/sync_<site>_<UTCyyyymmdd_HHMMSS>.csv`.
/// Returns `None` if `change_set` is empty (no artifact is written).
///
/// `declared_table_order` is `SyncParameters.tables` (or any superset of
/// `change_set`'s keys in that declared order); tables are written in that
/// order rather than sorted, so sections appear in the same order across
/// every tick regardless of `HashMap` iteration order.
pub fn build_artifact(
    delta_dir: &Path,
    site: &SiteCode,
    change_set: &ChangeSet,
    declared_table_order: &[TableName],
    now: chrono::DateTime<Utc>,
) -> Result<Option<Artifact>> {
    if change_set.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(delta_dir)?;
    let file_name = format!("sync_{}_{}.csv", site, now.format("%Y%m%d_%H%M%S"));
    let path = delta_dir.join(file_name);

    let mut file = std::fs::File::create(&path)?;
    file.write_all(b"\xEF\xBB\xBF")?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    let mut table_counts = Vec::with_capacity(change_set.len());

    let tables = declared_table_order
        .iter()
        .filter(|table| change_set.contains_key(*table));

    for table in tables {
        let (columns, rows) = &change_set[table];

        let mut header = vec![table.0.clone()];
        header.extend(columns.iter().map(|c| c.0.clone()));
        writer.write_record(&header)?;

        for row in rows {
            let mut record = vec![table.0.clone()];
            record.extend(row.values.iter().map(|v| v.0.clone()));
            writer.write_record(&record)?;
        }

        table_counts.push((table.clone(), rows.len()));
    }

    writer.flush()?;

    Ok(Some(Artifact {
        path,
        site: site.clone(),
        table_counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, ChangeRow, ColumnName};

    #[test]
    fn empty_change_set_writes_nothing() {
        let dir = tempdir();
        let result = build_artifact(
            dir.path(),
            &SiteCode::from("SITE_A"),
            &ChangeSet::new(),
            &[],
            Utc::now(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn writes_bom_and_interleaved_headers() {
        let dir = tempdir();
        let table = TableName::from("PRODUCTS");
        let columns = vec![ColumnName::from("id"), ColumnName::from("name")];
        let row = ChangeRow {
            table: table.clone(),
            columns: columns.clone(),
            values: vec![Cell("1".to_string()), Cell("Widget".to_string())],
        };
        let mut change_set = ChangeSet::new();
        change_set.insert(table.clone(), (columns, vec![row]));

        let artifact = build_artifact(
            dir.path(),
            &SiteCode::from("SITE_A"),
            &change_set,
            std::slice::from_ref(&table),
            Utc::now(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(artifact.table_counts, vec![(table, 1)]);
        let bytes = std::fs::read(&artifact.path).unwrap();
        assert_eq!(&bytes[0..3], b"\xEF\xBB\xBF");
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "PRODUCTS,id,name");
        assert_eq!(lines.next().unwrap(), "PRODUCTS,1,Widget");
    }

    #[test]
    fn tables_are_written_in_declared_order_not_sorted() {
        let dir = tempdir();
        let orders = TableName::from("ORDERS");
        let countries = TableName::from("COUNTRIES");
        let columns = vec![ColumnName::from("id")];

        let mut change_set = ChangeSet::new();
        change_set.insert(
            countries.clone(),
            (columns.clone(), vec![row(&countries, &columns)]),
        );
        change_set.insert(orders.clone(), (columns.clone(), vec![row(&orders, &columns)]));

        // Declared order puts ORDERS before COUNTRIES, the opposite of
        // alphabetical order.
        let declared = vec![orders.clone(), countries.clone()];

        let artifact = build_artifact(
            dir.path(),
            &SiteCode::from("SITE_A"),
            &change_set,
            &declared,
            Utc::now(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            artifact.table_counts,
            vec![(orders, 1), (countries, 1)]
        );
    }

    fn row(table: &TableName, columns: &[ColumnName]) -> ChangeRow {
        ChangeRow {
            table: table.clone(),
            columns: columns.to_vec(),
            values: columns.iter().map(|_| Cell("x".to_string())).collect(),
        }
    }

    // Minimal temp-dir helper, dropped (and its directory removed) at the
    // end of each test.
    fn tempdir() -> TestDir {
        TestDir::new()
    }

    struct TestDir(PathBuf);

    impl TestDir {
        fn new() -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("sitesync-artifact-test-{}", std::process::id()));
            std::fs::create_dir_all(&path).unwrap();
            TestDir(path)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
