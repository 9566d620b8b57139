// src/cubes.rs

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{collections::HashMap, fs::File, io::Read, path::Path};
use tracing::debug;

/// Cube list shipped with the binary: `cube_id;description`.
const BUNDLED_CUBES: &str = include_str!("../metadata/cubes_list.csv");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeEntry {
    pub id: String,
    pub description: String,
}

/// Read-only lookup of the cube ids the portal serves, in file order.
#[derive(Debug, Clone)]
pub struct CubeCatalog {
    headers: (String, String),
    entries: Vec<CubeEntry>,
    index: HashMap<String, usize>,
}

impl CubeCatalog {
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_CUBES.as_bytes()).context("parsing bundled cube list")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening cube list {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("parsing cube list {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        let headers = (
            header.get(0).unwrap_or("cube_id").to_string(),
            header.get(1).unwrap_or("description").to_string(),
        );

        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("cube list record {}", idx))?;
            let id = match record.get(0) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };
            let description = record.get(1).unwrap_or_default().to_string();
            if index.insert(id.clone(), entries.len()).is_some() {
                anyhow::bail!("duplicate cube id '{}' in cube list", id);
            }
            entries.push(CubeEntry { id, description });
        }
        debug!(cubes = entries.len(), "loaded cube catalog");

        Ok(Self {
            headers,
            entries,
            index,
        })
    }

    pub fn contains(&self, cube_id: &str) -> bool {
        self.index.contains_key(cube_id)
    }

    pub fn describe(&self, cube_id: &str) -> Option<&str> {
        self.index
            .get(cube_id)
            .map(|&i| self.entries[i].description.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two-column listing for `--info`; the id column is padded to the
    /// longest id and the header is title-cased.
    pub fn listing(&self) -> String {
        let width = self.entries.iter().map(|e| e.id.len()).max().unwrap_or(0);
        let mut out = format!(
            "{:<width$} {}",
            title_case(&self.headers.0),
            title_case(&self.headers.1),
            width = width
        );
        for entry in &self.entries {
            out.push('\n');
            out.push_str(&format!(
                "{:<width$} {}",
                entry.id,
                entry.description,
                width = width
            ));
        }
        out
    }
}

fn title_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "cube_id;description\nrendeiduebd;Bond yields\nrentm;Interest rates\n";

    #[test]
    fn lookup_by_id() -> Result<()> {
        let catalog = CubeCatalog::from_reader(SAMPLE.as_bytes())?;
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("rentm"));
        assert!(!catalog.contains("RENTM"));
        assert!(!catalog.contains("nope"));
        assert_eq!(catalog.describe("rendeiduebd"), Some("Bond yields"));
        assert_eq!(catalog.describe("nope"), None);
        Ok(())
    }

    #[test]
    fn listing_pads_ids_and_titles_header() -> Result<()> {
        let catalog = CubeCatalog::from_reader(SAMPLE.as_bytes())?;
        let listing = catalog.listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "Cube Id     Description");
        assert_eq!(lines[1], "rendeiduebd Bond yields");
        assert_eq!(lines[2], "rentm       Interest rates");
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dup = "cube_id;description\na;one\na;two\n";
        assert!(CubeCatalog::from_reader(dup.as_bytes()).is_err());
    }

    #[test]
    fn bundled_list_parses() -> Result<()> {
        let catalog = CubeCatalog::bundled()?;
        assert!(!catalog.is_empty());
        assert!(catalog.contains("devlandm"));
        assert!(catalog.contains("iucurracpa"));
        assert!(catalog.contains("rendeiduebd"));
        Ok(())
    }
}
