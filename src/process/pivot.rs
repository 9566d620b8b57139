use crate::error::{CubeError, CubeResult};
use crate::process::table::{Cell, Layout, Table};
use std::collections::HashMap;
use tracing::debug;

/// Long → wide. Rows are grouped by every column except the value and spread
/// columns; each distinct spread value becomes a column. Groups and spread
/// columns keep their first-appearance order. When `spread_column` is `None`
/// the column right before the value column is spread.
///
/// Two rows landing in the same (group, spread) cell is an error: nothing is
/// aggregated.
pub fn pivot(long: &Table, value_column: &str, spread_column: Option<&str>) -> CubeResult<Table> {
    let value_idx = long
        .column_index(value_column)
        .ok_or_else(|| CubeError::Reshape(format!("value column '{}' not found", value_column)))?;
    let spread_idx = match spread_column {
        Some(name) => long
            .column_index(name)
            .ok_or_else(|| CubeError::Reshape(format!("spread column '{}' not found", name)))?,
        None => value_idx.checked_sub(1).ok_or_else(|| {
            CubeError::Reshape(format!(
                "no dimension column precedes '{}' to spread",
                value_column
            ))
        })?,
    };
    if spread_idx == value_idx {
        return Err(CubeError::Reshape(format!(
            "'{}' cannot be both the value and the spread column",
            value_column
        )));
    }

    let key_idx: Vec<usize> = (0..long.columns.len())
        .filter(|&i| i != value_idx && i != spread_idx)
        .collect();
    let spread_name = &long.columns[spread_idx];

    let mut groups: Vec<Vec<Cell>> = Vec::new();
    let mut group_index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut spread_values: Vec<String> = Vec::new();
    let mut spread_index: HashMap<String, usize> = HashMap::new();
    let mut cells: HashMap<(usize, usize), Cell> = HashMap::new();

    for (row_no, row) in long.rows.iter().enumerate() {
        let key: Vec<String> = key_idx.iter().map(|&i| row[i].render()).collect();
        let g = match group_index.get(&key) {
            Some(&g) => g,
            None => {
                groups.push(key_idx.iter().map(|&i| row[i].clone()).collect());
                group_index.insert(key.clone(), groups.len() - 1);
                groups.len() - 1
            }
        };

        let spread = &row[spread_idx];
        if spread.is_missing() {
            return Err(CubeError::Reshape(format!(
                "data row {} has no value in spread column '{}'",
                row_no + 1,
                spread_name
            )));
        }
        let spread = spread.render();
        let s = match spread_index.get(&spread) {
            Some(&s) => s,
            None => {
                spread_values.push(spread.clone());
                spread_index.insert(spread.clone(), spread_values.len() - 1);
                spread_values.len() - 1
            }
        };

        if cells.insert((g, s), row[value_idx].clone()).is_some() {
            return Err(CubeError::Reshape(format!(
                "duplicate {}={} for group [{}]",
                spread_name,
                spread,
                key.join(", ")
            )));
        }
    }

    let mut columns: Vec<String> = key_idx.iter().map(|&i| long.columns[i].clone()).collect();
    if let Some(clash) = spread_values.iter().find(|v| columns.contains(*v)) {
        return Err(CubeError::Reshape(format!(
            "spread value '{}' collides with a key column",
            clash
        )));
    }
    columns.extend(spread_values.iter().cloned());

    let rows: Vec<Vec<Cell>> = groups
        .into_iter()
        .enumerate()
        .map(|(g, mut row)| {
            for s in 0..spread_values.len() {
                row.push(cells.remove(&(g, s)).unwrap_or(Cell::Missing));
            }
            row
        })
        .collect();
    debug!(
        groups = rows.len(),
        spread_columns = spread_values.len(),
        spread = %spread_name,
        "pivoted table"
    );

    let mut wide = Table::new(columns, rows, Layout::Wide);
    wide.metadata = long.metadata.clone();
    Ok(wide)
}

/// Wide → long: the first `key_columns` columns are kept, every remaining
/// column header becomes a `spread_name` value next to its cell under
/// `value_name`. Cells missing in the wide table come back as missing rows.
pub fn melt(wide: &Table, key_columns: usize, spread_name: &str, value_name: &str) -> CubeResult<Table> {
    if key_columns > wide.columns.len() {
        return Err(CubeError::Reshape(format!(
            "{} key columns requested but the table has {}",
            key_columns,
            wide.columns.len()
        )));
    }

    let mut columns: Vec<String> = wide.columns[..key_columns].to_vec();
    columns.push(spread_name.to_string());
    columns.push(value_name.to_string());

    let spread_headers = &wide.columns[key_columns..];
    let mut rows = Vec::with_capacity(wide.rows.len() * spread_headers.len());
    for row in &wide.rows {
        for (header, cell) in spread_headers.iter().zip(&row[key_columns..]) {
            let mut long_row: Vec<Cell> = row[..key_columns].to_vec();
            long_row.push(Cell::Text(header.clone()));
            long_row.push(cell.clone());
            rows.push(long_row);
        }
    }

    let mut long = Table::new(columns, rows, Layout::Long);
    long.metadata = wide.metadata.clone();
    Ok(long)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn long_rates() -> Table {
        let mut rows = Vec::new();
        let mut v = 0.5;
        for date in ["2024-04", "2024-05"] {
            for currency in ["CHF", "EUR"] {
                for term in ["1J", "2J", "3J"] {
                    rows.push(vec![text(date), text(currency), text(term), Cell::Number(v)]);
                    v += 0.25;
                }
            }
        }
        Table::new(
            vec!["Date".into(), "D0".into(), "D1".into(), "Value".into()],
            rows,
            Layout::Long,
        )
    }

    #[test]
    fn spreads_column_before_value_by_default() -> CubeResult<()> {
        let wide = pivot(&long_rates(), "Value", None)?;
        assert_eq!(wide.layout, Layout::Wide);
        assert_eq!(wide.columns, vec!["Date", "D0", "1J", "2J", "3J"]);
        assert_eq!(wide.num_rows(), 4);
        assert_eq!(
            wide.rows[0],
            vec![text("2024-04"), text("CHF"), Cell::Number(0.5), Cell::Number(0.75), Cell::Number(1.0)]
        );
        assert_eq!(wide.get(3, "3J"), Some(&Cell::Number(3.25)));
        Ok(())
    }

    #[test]
    fn explicit_spread_column() -> CubeResult<()> {
        let wide = pivot(&long_rates(), "Value", Some("D0"))?;
        assert_eq!(wide.columns, vec!["Date", "D1", "CHF", "EUR"]);
        assert_eq!(wide.num_rows(), 6);
        assert_eq!(wide.get(0, "CHF"), Some(&Cell::Number(0.5)));
        assert_eq!(wide.get(0, "EUR"), Some(&Cell::Number(1.25)));
        Ok(())
    }

    #[test]
    fn round_trip_preserves_values() -> CubeResult<()> {
        let long = long_rates();
        let wide = pivot(&long, "Value", Some("D1"))?;
        let back = melt(&wide, 2, "D1", "Value")?;
        assert_eq!(back.columns, long.columns);
        assert_eq!(back.rows, long.rows);
        Ok(())
    }

    #[test]
    fn duplicate_pair_is_an_error_not_an_average() {
        let mut long = long_rates();
        let dup = long.rows[0].clone();
        long.rows.push(dup);
        let err = pivot(&long, "Value", None).unwrap_err();
        assert!(matches!(err, CubeError::Reshape(msg) if msg.contains("duplicate D1=1J")));
    }

    #[test]
    fn absent_pairs_become_missing() -> CubeResult<()> {
        let mut long = long_rates();
        long.rows.remove(1); // 2024-04 / CHF / 2J
        let wide = pivot(&long, "Value", None)?;
        assert_eq!(wide.get(0, "2J"), Some(&Cell::Missing));
        assert_eq!(wide.get(1, "2J"), Some(&Cell::Number(1.5)));
        Ok(())
    }

    #[test]
    fn rejects_unusable_columns() {
        let long = long_rates();
        assert!(matches!(pivot(&long, "Wert", None), Err(CubeError::Reshape(_))));
        assert!(matches!(pivot(&long, "Value", Some("D9")), Err(CubeError::Reshape(_))));
        assert!(matches!(pivot(&long, "Value", Some("Value")), Err(CubeError::Reshape(_))));

        let value_first = Table::new(
            vec!["Value".into(), "D0".into()],
            vec![vec![Cell::Number(1.0), text("x")]],
            Layout::Long,
        );
        assert!(matches!(pivot(&value_first, "Value", None), Err(CubeError::Reshape(_))));
    }

    #[test]
    fn spread_value_clashing_with_key_is_rejected() {
        let long = Table::new(
            vec!["Date".into(), "D0".into(), "Value".into()],
            vec![vec![text("2024-05"), text("Date"), Cell::Number(1.0)]],
            Layout::Long,
        );
        assert!(matches!(pivot(&long, "Value", None), Err(CubeError::Reshape(msg)) if msg.contains("collides")));
    }

    #[test]
    fn melt_checks_key_count() {
        let wide = pivot(&long_rates(), "Value", None).unwrap();
        assert!(melt(&wide, 9, "D1", "Value").is_err());
    }
}
