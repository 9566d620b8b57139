// src/process/mod.rs
pub mod convert;
pub mod pivot;
pub mod table;
pub mod utils;
pub mod write;

use crate::config::FilterConfiguration;
use crate::error::{CubeError, CubeResult};
use csv::ReaderBuilder;
use std::collections::HashSet;
use table::{Table, TableMetadata};
use tracing::{debug, trace, warn};

pub use pivot::{melt, pivot};
pub use table::{Cell, Layout};
pub use write::{output_file_name, read_table, write_table};

/// Header and data rows exactly as the response carried them.
#[derive(Debug)]
pub struct RawTable {
    /// Column names, verbatim from the header row.
    pub headers: Vec<String>,
    /// Each data row, one string per field; same length as `headers`.
    pub rows: Vec<Vec<String>>,
    /// Cube id and publishing date from the preamble, if any.
    pub metadata: TableMetadata,
}

const PREAMBLE_KEYS: &[&str] = &["CubeId", "PublishingDate"];

/// Split the response into preamble metadata and the CSV text that follows.
///
/// The portal prefixes the table with lines like
/// `"CubeId";"rendeiduebd"` and `"PublishingDate";"2024-06-03 09:00"`,
/// then a blank line. Bodies without that block pass through untouched.
fn split_preamble(body: &str) -> (TableMetadata, &str) {
    let mut metadata = TableMetadata::default();
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        let delimiter = utils::sniff_delimiter(trimmed) as char;
        let mut parts = trimmed.splitn(2, delimiter).map(utils::clean_str);
        let key = parts.next().unwrap_or_default();
        if !PREAMBLE_KEYS.contains(&key.as_str()) {
            break;
        }
        let value = parts.next().unwrap_or_default();
        match key.as_str() {
            "CubeId" => metadata.cube_id = Some(value),
            "PublishingDate" => {
                metadata.published = utils::parse_publishing_date(&value);
                if metadata.published.is_none() {
                    warn!(value = %value, "failed to parse PublishingDate");
                }
            }
            _ => {}
        }
        trace!(key = %key, "preamble line");
        offset += line.len();
    }

    (metadata, &body[offset..])
}

/// Parse a CSV body into header + rows, checking that every row has as many
/// fields as the header.
pub fn parse_body(body: &str) -> CubeResult<RawTable> {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);
    let (metadata, text) = split_preamble(body);

    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CubeError::Parse("response contains no header row".into()))?;
    let delimiter = utils::sniff_delimiter(header_line);

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        if is_blank_line(text, &record) {
            continue;
        }
        let fields: Vec<String> = record.iter().map(str::to_string).collect();

        let expected = match headers.as_ref() {
            Some(h) => h.len(),
            None => {
                let mut seen = HashSet::new();
                if let Some(dup) = fields.iter().find(|f| !seen.insert(f.as_str())) {
                    return Err(CubeError::Parse(format!("duplicate column name '{}'", dup)));
                }
                headers = Some(fields);
                continue;
            }
        };
        if fields.len() != expected {
            let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
            return Err(CubeError::Parse(format!(
                "line {} has {} fields, header has {}",
                line,
                fields.len(),
                expected
            )));
        }
        rows.push(fields);
    }

    let headers = headers.ok_or_else(|| CubeError::Parse("response contains no header row".into()))?;
    if rows.is_empty() {
        return Err(CubeError::EmptyResult);
    }
    debug!(columns = headers.len(), rows = rows.len(), "parsed response body");

    Ok(RawTable {
        headers,
        rows,
        metadata,
    })
}

/// Whitespace-only line. A lone `""` field is data, not a blank line.
fn is_blank_line(text: &str, record: &csv::StringRecord) -> bool {
    if record.len() != 1 || record.get(0) != Some("") {
        return false;
    }
    record
        .position()
        .and_then(|p| text.get(p.byte() as usize..))
        .and_then(|rest| rest.lines().next())
        .map_or(true, |line| line.trim().is_empty())
}

/// Response body → table in the layout `config` asks for.
pub fn materialize(body: &str, config: &FilterConfiguration) -> CubeResult<Table> {
    let raw = parse_body(body)?;
    let long = convert::to_long_table(raw, config.value_column(), config.number_format())?;
    if config.wants_pivot() {
        pivot(&long, config.value_column(), config.spread_column.as_deref())
    } else {
        Ok(long)
    }
}
