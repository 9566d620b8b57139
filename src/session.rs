// src/session.rs

use crate::config::{FilterConfiguration, RunConfig};
use crate::cubes::CubeCatalog;
use crate::error::{CubeError, CubeResult};
use crate::fetch::{Fetch, HttpFetcher};
use crate::process::{self, table::Table};
use crate::request::{build_locator, parse_base_url};
use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument};
use url::Url;

/// Result for one cube of a batch.
#[derive(Debug)]
pub struct CubeOutcome<T> {
    pub cube_id: String,
    pub result: CubeResult<T>,
}

impl<T> CubeOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// One download session: owns the fetcher (and with it the HTTP connection
/// pool) until dropped, borrows the catalog.
pub struct Session<'a, F: Fetch = HttpFetcher> {
    catalog: &'a CubeCatalog,
    fetcher: F,
    base_url: Url,
    output_dir: PathBuf,
    pause: Duration,
}

impl<'a> Session<'a, HttpFetcher> {
    /// Open an HTTP session configured by `config`.
    pub fn open(catalog: &'a CubeCatalog, config: &RunConfig) -> CubeResult<Self> {
        let fetcher = HttpFetcher::new(config.timeout())?;
        let session = Self::with_fetcher(catalog, fetcher, &config.base_url)?
            .output_dir(&config.output_dir)
            .pause(config.pause());
        info!(base_url = %session.base_url, "session started");
        Ok(session)
    }
}

impl<'a, F: Fetch> Session<'a, F> {
    pub fn with_fetcher(catalog: &'a CubeCatalog, fetcher: F, base_url: &str) -> CubeResult<Self> {
        Ok(Self {
            catalog,
            fetcher,
            base_url: parse_base_url(base_url)?,
            output_dir: PathBuf::from(crate::config::DEFAULT_OUTPUT_DIR),
            pause: Duration::ZERO,
        })
    }

    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Pause between consecutive requests of a batch.
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// URL the session would request for `cube_id`. The portal is always asked
    /// for the long form; pivoting happens locally.
    pub fn locator(&self, cube_id: &str, config: &FilterConfiguration) -> CubeResult<Url> {
        build_locator(
            &self.base_url,
            self.catalog,
            cube_id,
            &config.for_local_reshape(),
        )
    }

    /// Download one cube into memory.
    #[instrument(level = "info", skip(self, config))]
    pub fn download_to_table(&self, cube_id: &str, config: &FilterConfiguration) -> CubeResult<Table> {
        let url = self.locator(cube_id, config)?;
        let start = Instant::now();
        let body = self.fetcher.fetch(&url)?;
        debug!(bytes = body.len(), elapsed = ?start.elapsed(), "fetched");
        let table = process::materialize(&body, config)?;
        info!(rows = table.num_rows(), columns = table.columns.len(), "cube stored in memory");
        Ok(table)
    }

    /// Download one cube and save it under the output directory.
    #[instrument(level = "info", skip(self, config))]
    pub fn download_to_file(&self, cube_id: &str, config: &FilterConfiguration) -> CubeResult<PathBuf> {
        let table = self.download_to_table(cube_id, config)?;
        let name = process::output_file_name(cube_id, config);
        let path = process::write_table(&self.output_dir, &name, &table)?;
        info!(path = %path.display(), "cube saved");
        Ok(path)
    }

    /// Download every cube in turn and save each; one failure never stops
    /// the rest.
    pub fn download_to_files<S: AsRef<str>>(
        &self,
        cube_ids: &[S],
        config: &FilterConfiguration,
    ) -> Vec<CubeOutcome<PathBuf>> {
        self.run_batch(cube_ids, |id| self.download_to_file(id, config))
    }

    /// In-memory counterpart of [`Session::download_to_files`].
    pub fn download_to_tables<S: AsRef<str>>(
        &self,
        cube_ids: &[S],
        config: &FilterConfiguration,
    ) -> Vec<CubeOutcome<Table>> {
        self.run_batch(cube_ids, |id| self.download_to_table(id, config))
    }

    fn run_batch<S, T>(
        &self,
        cube_ids: &[S],
        mut op: impl FnMut(&str) -> CubeResult<T>,
    ) -> Vec<CubeOutcome<T>>
    where
        S: AsRef<str>,
    {
        let mut outcomes = Vec::with_capacity(cube_ids.len());
        let mut requested = false;
        for cube_id in cube_ids {
            let cube_id = cube_id.as_ref();
            let known = self.catalog.contains(cube_id);
            if known && requested && !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
            let result = op(cube_id);
            if let Err(e) = &result {
                error!(cube = cube_id, error = %e, "cube failed");
            }
            requested |= known;
            outcomes.push(CubeOutcome {
                cube_id: cube_id.to_string(),
                result,
            });
        }
        let ok = outcomes.iter().filter(|o| o.is_ok()).count();
        info!(ok, failed = outcomes.len() - ok, "batch done");
        outcomes
    }
}

impl<F: Fetch> Drop for Session<'_, F> {
    fn drop(&mut self) {
        info!("session closed");
    }
}
