use crate::config::NumberFormat;
use crate::error::{CubeError, CubeResult};
use crate::process::table::{Cell, Layout, Table};
use crate::process::utils::clean_str;
use crate::process::RawTable;
use tracing::debug;

/// Turn raw string rows into a long table. Empty fields become missing; the
/// value column becomes numeric under `fixed` and stays text under
/// `formatted`. Every other column is left as text.
pub fn to_long_table(raw: RawTable, value_column: &str, format: NumberFormat) -> CubeResult<Table> {
    let value_idx = raw.headers.iter().position(|h| h == value_column);
    if value_idx.is_none() {
        debug!(value_column, "value column not in header; leaving all columns as text");
    }

    let mut rows = Vec::with_capacity(raw.rows.len());
    for (row_no, raw_row) in raw.rows.into_iter().enumerate() {
        let mut row = Vec::with_capacity(raw_row.len());
        for (col, field) in raw_row.into_iter().enumerate() {
            let cell = if field.is_empty() {
                Cell::Missing
            } else if Some(col) == value_idx && format == NumberFormat::Fixed {
                Cell::Number(parse_fixed(&field).ok_or_else(|| {
                    CubeError::Parse(format!(
                        "data row {}: '{}' in column '{}' is not a number",
                        row_no + 1,
                        field,
                        value_column
                    ))
                })?)
            } else {
                Cell::Text(field)
            };
            row.push(cell);
        }
        rows.push(row);
    }

    let mut table = Table::new(raw.headers, rows, Layout::Long);
    table.metadata = raw.metadata;
    Ok(table)
}

/// Every field as text, empty fields missing.
pub fn to_text_table(raw: RawTable, layout: Layout) -> Table {
    let rows = raw
        .rows
        .into_iter()
        .map(|r| {
            r.into_iter()
                .map(|f| if f.is_empty() { Cell::Missing } else { Cell::Text(f) })
                .collect()
        })
        .collect();
    let mut table = Table::new(raw.headers, rows, layout);
    table.metadata = raw.metadata;
    table
}

/// Plain decimal with a `.` point and no grouping.
fn parse_fixed(s: &str) -> Option<f64> {
    clean_str(s).parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::table::TableMetadata;

    fn raw(rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: vec!["Date".into(), "D0".into(), "Value".into()],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            metadata: TableMetadata::default(),
        }
    }

    #[test]
    fn fixed_coerces_value_column_only() -> CubeResult<()> {
        let t = to_long_table(
            raw(&[&["2024", "1000", "0.91"], &["2024", "2000", ""]]),
            "Value",
            NumberFormat::Fixed,
        )?;
        assert_eq!(t.rows[0][0], Cell::Text("2024".into()));
        assert_eq!(t.rows[0][1], Cell::Text("1000".into()));
        assert_eq!(t.rows[0][2], Cell::Number(0.91));
        assert_eq!(t.rows[1][2], Cell::Missing);
        Ok(())
    }

    #[test]
    fn formatted_keeps_separators_as_text() -> CubeResult<()> {
        let t = to_long_table(
            raw(&[&["2024-05", "CHF", "1'234'567.8"]]),
            "Value",
            NumberFormat::Formatted,
        )?;
        assert_eq!(t.rows[0][2], Cell::Text("1'234'567.8".into()));
        Ok(())
    }

    #[test]
    fn fixed_rejects_grouped_numbers() {
        let err = to_long_table(
            raw(&[&["2024-05", "CHF", "1'234.5"]]),
            "Value",
            NumberFormat::Fixed,
        )
        .unwrap_err();
        assert!(matches!(err, CubeError::Parse(msg) if msg.contains("data row 1")));
    }

    #[test]
    fn missing_value_column_leaves_text() -> CubeResult<()> {
        let t = to_long_table(raw(&[&["2024-05", "CHF", "x"]]), "Wert", NumberFormat::Fixed)?;
        assert_eq!(t.rows[0][2], Cell::Text("x".into()));
        Ok(())
    }
}
