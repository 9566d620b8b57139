use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use snbcube::{
    config::{Frequency, Lang, NumberFormat, OutputFormat, RunConfig},
    cubes::CubeCatalog,
    logging,
    process::{self, Layout},
    session::{CubeOutcome, Session},
    Table,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{debug, info, warn};

/// Fetch data cubes from the SNB data portal as long or wide tables.
#[derive(Parser, Debug)]
#[command(
    name = "snbcube",
    version,
    about = "SNB data streamliner: extract and structure SNB data cubes.",
    after_help = "SNB data portal: https://data.snb.ch/en"
)]
struct Args {
    /// Cube ids to fetch (e.g. rendeiduebd)
    #[arg(required_unless_present = "info")]
    cubes: Vec<String>,

    /// Increase output verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Save each cube as CSV under the output directory instead of keeping it in memory
    #[arg(short, long)]
    save: bool,

    /// List the known cube ids with their descriptions
    #[arg(long)]
    info: bool,

    /// Print the request URLs without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// YAML run configuration (baseUrl, outputDir, pauseMs, timeoutSecs, filter)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alternative `cube_id;description` list
    #[arg(long)]
    cubes_list: Option<PathBuf>,

    /// Directory for saved CSV files
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Portal API base URL (default https://data.snb.ch/api, or $SNB_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Table layout
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Response language
    #[arg(long, value_enum)]
    lang: Option<Lang>,

    /// First period, e.g. 2020-01
    #[arg(long = "from")]
    from_date: Option<String>,

    /// Last period, e.g. 2024-05
    #[arg(long = "to")]
    to_date: Option<String>,

    /// Observation frequency
    #[arg(long, value_enum)]
    frequency: Option<Frequency>,

    /// Number format of the value column
    #[arg(long, value_enum)]
    number_format: Option<NumberFormat>,

    /// Comma-separated dimension slugs, forwarded as-is
    #[arg(long)]
    selection: Option<String>,

    /// Column holding the observations (default Value)
    #[arg(long)]
    value_column: Option<String>,

    /// Column whose values become headers when pivoting
    #[arg(long)]
    spread_column: Option<String>,

    /// Extra query parameter forwarded verbatim, as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Pause between cubes of a batch, in milliseconds
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Rows shown per cube
    #[arg(long, default_value_t = 5)]
    rows: usize,

    /// Print tables as JSON records instead of a preview
    #[arg(long)]
    json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// File config, then `SNB_BASE_URL`, then flags.
fn run_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };

    if let Ok(url) = std::env::var("SNB_BASE_URL") {
        cfg.base_url = url;
    }
    if let Some(url) = &args.base_url {
        cfg.base_url = url.clone();
    }
    if let Some(dir) = &args.out_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(ms) = args.pause_ms {
        cfg.pause_ms = ms;
    }
    if let Some(secs) = args.timeout {
        cfg.timeout_secs = Some(secs);
    }

    let f = &mut cfg.filter;
    if let Some(format) = args.format {
        f.output_format = Some(format);
    }
    if let Some(lang) = args.lang {
        f.lang = lang;
    }
    if let Some(from) = &args.from_date {
        f.from_date = Some(from.clone());
    }
    if let Some(to) = &args.to_date {
        f.to_date = Some(to.clone());
    }
    if let Some(freq) = args.frequency {
        f.frequency = Some(freq);
    }
    if let Some(nf) = args.number_format {
        f.output_number_format = Some(nf);
    }
    if let Some(sel) = &args.selection {
        f.selection = Some(sel.clone());
    }
    if let Some(col) = &args.value_column {
        f.value_column = Some(col.clone());
    }
    if let Some(col) = &args.spread_column {
        f.spread_column = Some(col.clone());
    }
    for (k, v) in &args.params {
        f.extra.insert(k.clone(), v.clone());
    }
    Ok(cfg)
}

fn print_table(cube_id: &str, description: Option<&str>, table: &Table, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&table.to_records())?);
        return Ok(());
    }
    match description {
        Some(d) => println!("== {} ({})", cube_id, d),
        None => println!("== {}", cube_id),
    }
    println!("{}", table.head(args.rows));
    println!("[{} rows x {} columns]", table.num_rows(), table.columns.len());
    Ok(())
}

/// Print each failure; true when at least one cube made it.
fn report<T>(outcomes: &[CubeOutcome<T>]) -> bool {
    for o in outcomes {
        if let Err(e) = &o.result {
            eprintln!("{}: {}", o.cube_id, e);
        }
    }
    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    if ok > 0 && ok < outcomes.len() {
        eprintln!("{} of {} cubes failed", outcomes.len() - ok, outcomes.len());
    }
    ok > 0
}

/// Show each saved file as read back from disk. A file that cannot be read
/// is reported for its cube only.
fn preview_saved(
    outcomes: &[CubeOutcome<PathBuf>],
    layout: Layout,
    catalog: &CubeCatalog,
    args: &Args,
) -> Result<()> {
    for o in outcomes {
        let Ok(path) = &o.result else { continue };
        println!("saved {} -> {}", o.cube_id, path.display());
        match process::read_table(path, layout) {
            Ok(table) => print_table(&o.cube_id, catalog.describe(&o.cube_id), &table, args)?,
            Err(e) => {
                warn!(cube = %o.cube_id, path = %path.display(), error = %e, "saved file not readable");
                eprintln!("{}: saved but preview failed: {}", o.cube_id, e);
            }
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<bool> {
    let catalog = match &args.cubes_list {
        Some(path) => CubeCatalog::from_path(path)?,
        None => CubeCatalog::bundled()?,
    };
    debug!(cubes = catalog.len(), "catalog ready");

    if args.info {
        println!("{}", catalog.listing());
        if args.cubes.is_empty() {
            return Ok(true);
        }
    }

    let cfg = run_config(args)?;
    let filter = &cfg.filter;
    let session = Session::open(&catalog, &cfg).context("opening session")?;

    if args.dry_run {
        let mut any_ok = false;
        for cube_id in &args.cubes {
            match session.locator(cube_id, filter) {
                Ok(url) => {
                    println!("{}", url);
                    any_ok = true;
                }
                Err(e) => eprintln!("{}: {}", cube_id, e),
            }
        }
        return Ok(any_ok);
    }

    let layout = if filter.wants_pivot() {
        Layout::Wide
    } else {
        Layout::Long
    };

    if args.save {
        let outcomes = session.download_to_files(args.cubes.as_slice(), filter);
        preview_saved(&outcomes, layout, &catalog, args)?;
        Ok(report(&outcomes))
    } else {
        let outcomes = session.download_to_tables(args.cubes.as_slice(), filter);
        for o in &outcomes {
            if let Ok(table) = &o.result {
                print_table(&o.cube_id, catalog.describe(&o.cube_id), table, args)?;
            }
        }
        Ok(report(&outcomes))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "startup");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
