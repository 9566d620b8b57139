// src/config.rs

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_BASE_URL: &str = "https://data.snb.ch/api";
pub const DEFAULT_OUTPUT_DIR: &str = "data/raw";
pub const DEFAULT_VALUE_COLUMN: &str = "Value";
const DEFAULT_PAUSE_MS: u64 = 500;

/// Layout requested for the materialized table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "nonPivoted")]
    #[value(name = "nonPivoted", alias = "long")]
    NonPivoted,
    #[serde(rename = "pivoted")]
    #[value(name = "pivoted", alias = "wide")]
    Pivoted,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::NonPivoted => "nonPivoted",
            OutputFormat::Pivoted => "pivoted",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    De,
    Fr,
    It,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::De => "de",
            Lang::Fr => "fr",
            Lang::It => "it",
        }
    }
}

/// Observation frequency: daily, monthly, quarterly or annual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
pub enum Frequency {
    #[serde(rename = "D")]
    #[value(name = "D", alias = "d")]
    Daily,
    #[serde(rename = "M")]
    #[value(name = "M", alias = "m")]
    Monthly,
    #[serde(rename = "Q")]
    #[value(name = "Q", alias = "q")]
    Quarterly,
    #[serde(rename = "A")]
    #[value(name = "A", alias = "a")]
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::Monthly => "M",
            Frequency::Quarterly => "Q",
            Frequency::Annual => "A",
        }
    }
}

/// `fixed` yields plain decimals, `formatted` keeps the portal's thousands separators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    #[default]
    Fixed,
    Formatted,
}

impl NumberFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberFormat::Fixed => "fixed",
            NumberFormat::Formatted => "formatted",
        }
    }
}

/// Filter parameters for one cube request.
///
/// Every wire field is optional; absent fields are not sent and the portal
/// applies its own default. `lang` is part of the URL path and defaults to
/// English. `value_column` and `spread_column` only steer the local pivot and
/// never reach the wire. Keys the portal understands but this struct does not
/// name go into `extra` and are forwarded verbatim.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfiguration {
    pub output_format: Option<OutputFormat>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub lang: Lang,
    #[serde(rename = "frequence")]
    pub frequency: Option<Frequency>,
    pub output_number_format: Option<NumberFormat>,
    pub selection: Option<String>,
    pub value_column: Option<String>,
    pub spread_column: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl FilterConfiguration {
    pub fn wants_pivot(&self) -> bool {
        self.output_format == Some(OutputFormat::Pivoted)
    }

    pub fn number_format(&self) -> NumberFormat {
        self.output_number_format.unwrap_or_default()
    }

    pub fn value_column(&self) -> &str {
        self.value_column.as_deref().unwrap_or(DEFAULT_VALUE_COLUMN)
    }

    /// Date range only counts as narrowing when at least one bound is set.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        if self.from_date.is_none() && self.to_date.is_none() {
            return None;
        }
        Some((
            self.from_date.as_deref().unwrap_or("start"),
            self.to_date.as_deref().unwrap_or("end"),
        ))
    }

    /// Copy of this configuration as it goes on the wire when the pivot is
    /// done locally: the portal is always asked for the long form.
    pub fn for_local_reshape(&self) -> FilterConfiguration {
        let mut wire = self.clone();
        wire.output_format = Some(OutputFormat::NonPivoted);
        wire
    }
}

/// Everything a run needs besides the cube ids. Loaded from an optional YAML
/// file; CLI flags and `SNB_BASE_URL` are applied on top by the binary.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub pause_ms: u64,
    pub timeout_secs: Option<u64>,
    pub filter: FilterConfiguration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            pause_ms: DEFAULT_PAUSE_MS,
            timeout_secs: None,
            filter: FilterConfiguration::default(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
