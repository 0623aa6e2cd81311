// Partition Filter
//
// Selects the rows of a partition that lie beyond its watermark.

use crate::dataset::Row;
use crate::watermark::Watermark;

/// Rows dated strictly after `watermark`, in input order.
///
/// Pure: the same rows and watermark always give the same output.
pub fn filter_new_rows(rows: &[Row], watermark: &Watermark) -> Vec<Row> {
    rows.iter()
        .filter(|row| watermark.admits(row.date_key))
        .cloned()
        .collect()
}
