//! The Tracking Writer: marks rows transferred strictly after they've been
//! read and strictly before they're handed to the Aggregator. A thin
//! wrapper over [SourceConnector::update_tracking_batch]; the 1000-row
//! chunking itself lives in the connector so it can be done inside the
//! connector's own transactional units of work.

use crate::error::Result;
use crate::model::{Cell, ColumnName, TableName};
use crate::source::SourceConnector;

pub async fn mark_transferred(
    conn: &mut dyn SourceConnector,
    table: &TableName,
    pk_column: &ColumnName,
    pk_values: &[Cell],
) -> Result<u64> {
    if pk_values.is_empty() {
        return Ok(0);
    }
    conn.update_tracking_batch(table, pk_column, pk_values).await
}

/// Splits `values` into chunks of at most `batch_size`, the pure piece of
/// the batching policy.
pub fn chunk_pks(values: &[Cell], batch_size: usize) -> Vec<&[Cell]> {
    values.chunks(batch_size.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeConnector;

    #[test]
    fn chunks_respect_batch_size_with_remainder() {
        let values: Vec<Cell> = (0..2347).map(|i| Cell(i.to_string())).collect();
        let chunks = chunk_pks(&values, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 347);
    }

    #[tokio::test]
    async fn empty_pk_list_marks_nothing() {
        let mut conn = FakeConnector::default();
        let n = mark_transferred(
            &mut conn,
            &TableName::from("PRODUCTS"),
            &ColumnName::from("id"),
            &[],
        )
        .await
        .unwrap();
        assert_eq!(n, 0);
        assert!(conn.marked.is_empty());
    }

    #[tokio::test]
    async fn marks_every_pk_value() {
        let mut conn = FakeConnector::default();
        let values = vec![Cell("1".to_string()), Cell("2".to_string())];
        let n = mark_transferred(
            &mut conn,
            &TableName::from("PRODUCTS"),
            &ColumnName::from("id"),
            &values,
        )
        .await
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(conn.marked.len(), 2);
    }
}
