use crate::config::FilterConfiguration;
use crate::error::{CubeError, CubeResult};
use crate::process::convert::to_text_table;
use crate::process::parse_body;
use crate::process::table::{Layout, Table};
use crate::process::utils::file_name_part;
use csv::WriterBuilder;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::debug;

/// `<cube>_<selection|all>[_<from>_<to>].csv`: identical parameters give the
/// same name, so a rerun overwrites the previous file.
pub fn output_file_name(cube_id: &str, config: &FilterConfiguration) -> String {
    let selection = config
        .selection
        .as_deref()
        .map(file_name_part)
        .unwrap_or_else(|| "all".to_string());
    let mut name = format!("{}_{}", file_name_part(cube_id), selection);
    if let Some((from, to)) = config.date_range() {
        name.push_str(&format!("_{}_{}", file_name_part(from), file_name_part(to)));
    }
    name.push_str(".csv");
    name
}

/// Write `table` as `;`-separated CSV to `dir/file_name`, creating `dir` if
/// needed. Goes through a `.tmp` sibling so a failed write never leaves a
/// truncated file under the final name.
pub fn write_table(dir: &Path, file_name: &str, table: &Table) -> CubeResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let final_path = dir.join(file_name);
    let tmp = dir.join(format!("{}.tmp", file_name));

    if let Err(e) = write_csv(&tmp, table).and_then(|()| fs::rename(&tmp, &final_path).map_err(CubeError::from)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    debug!(path = %final_path.display(), rows = table.num_rows(), "table written");
    Ok(final_path)
}

fn write_csv(path: &Path, table: &Table) -> CubeResult<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .from_writer(BufWriter::new(file));
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        if row.len() != table.columns.len() {
            return Err(CubeError::Parse(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                table.columns.len()
            )));
        }
        writer.write_record(row.iter().map(|c| c.render()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a file written by [`write_table`]; cells come back as text.
pub fn read_table(path: &Path, layout: Layout) -> CubeResult<Table> {
    let text = fs::read_to_string(path)?;
    Ok(to_text_table(parse_body(&text)?, layout))
}
