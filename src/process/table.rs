use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// One cell of a materialized table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Text form used for grouping keys and CSV output.
    pub fn render(&self) -> String {
        match self {
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => f.write_str("NaN"),
            other => f.write_str(&other.render()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Long,
    Wide,
}

/// Facts from the response preamble, when the portal sent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadata {
    pub cube_id: Option<String>,
    pub published: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub layout: Layout,
    pub metadata: TableMetadata,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>, layout: Layout) -> Self {
        Self {
            columns,
            rows,
            layout,
            metadata: TableMetadata::default(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows as column-name → value objects, for JSON output.
    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        let value = match cell {
                            Cell::Number(n) => serde_json::Number::from_f64(*n)
                                .map(JsonValue::Number)
                                .unwrap_or(JsonValue::Null),
                            Cell::Text(s) => JsonValue::String(s.clone()),
                            Cell::Missing => JsonValue::Null,
                        };
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Aligned text preview of the first `n` rows.
    pub fn head(&self, n: usize) -> String {
        let shown: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(n)
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        let idx_width = shown.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                shown
                    .iter()
                    .map(|r| r[i].len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = format!("{:width$}", "", width = idx_width);
        for (name, w) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", name, w = w));
        }
        for (i, row) in shown.iter().enumerate() {
            out.push('\n');
            out.push_str(&format!("{:<width$}", i, width = idx_width));
            for (cell, w) in row.iter().zip(&widths) {
                out.push_str(&format!("  {:>w$}", cell, w = w));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["Date".into(), "D0".into(), "Value".into()],
            vec![
                vec![Cell::Text("2024-05".into()), Cell::Text("USD".into()), Cell::Number(0.91)],
                vec![Cell::Text("2024-05".into()), Cell::Text("EUR".into()), Cell::Missing],
            ],
            Layout::Long,
        )
    }

    #[test]
    fn lookup_by_column_name() {
        let t = sample();
        assert_eq!(t.get(0, "D0"), Some(&Cell::Text("USD".into())));
        assert_eq!(t.get(1, "Value"), Some(&Cell::Missing));
        assert_eq!(t.get(2, "Value"), None);
        assert_eq!(t.get(0, "Nope"), None);
        let values: Vec<Option<f64>> = t.column("Value").unwrap().iter().map(|c| c.as_f64()).collect();
        assert_eq!(values, vec![Some(0.91), None]);
    }

    #[test]
    fn records_map_missing_to_null() {
        let records = sample().to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Value"], serde_json::json!(0.91));
        assert_eq!(records[1]["Value"], JsonValue::Null);
        assert_eq!(records[1]["D0"], serde_json::json!("EUR"));
    }

    #[test]
    fn head_aligns_columns() {
        let preview = sample().head(5);
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "      Date   D0  Value");
        assert_eq!(lines[1], "0  2024-05  USD   0.91");
        assert_eq!(lines[2], "1  2024-05  EUR    NaN");
    }
}
