// src/request.rs

use crate::config::FilterConfiguration;
use crate::cubes::CubeCatalog;
use crate::error::{CubeError, CubeResult};
use url::Url;

/// Query parameters in the order they go on the wire: recognized keys first
/// in a fixed order, then pass-through keys sorted by name. Absent keys are
/// left out.
pub fn query_pairs(config: &FilterConfiguration) -> Vec<(String, String)> {
    let recognized = [
        ("outputFormat", config.output_format.map(|f| f.as_str().to_string())),
        ("fromDate", config.from_date.clone()),
        ("toDate", config.to_date.clone()),
        (
            "outputNumberFormat",
            config.output_number_format.map(|f| f.as_str().to_string()),
        ),
        ("frequence", config.frequency.map(|f| f.as_str().to_string())),
        ("selection", config.selection.clone()),
    ];

    let mut pairs: Vec<(String, String)> = recognized
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();
    pairs.extend(config.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    pairs
}

pub fn parse_base_url(base: &str) -> CubeResult<Url> {
    let url = Url::parse(base).map_err(|e| CubeError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(CubeError::InvalidBaseUrl {
            url: base.to_string(),
            reason: "cannot carry path segments".into(),
        });
    }
    Ok(url)
}

/// Build `<base>/cube/<cube_id>/data/csv/<lang>?<query>` for a cube the
/// catalog knows about. No values are checked beyond the cube id; the portal
/// answers bad selections or date ranges itself.
pub fn build_locator(
    base: &Url,
    catalog: &CubeCatalog,
    cube_id: &str,
    config: &FilterConfiguration,
) -> CubeResult<Url> {
    if !catalog.contains(cube_id) {
        return Err(CubeError::UnknownCube(cube_id.to_string()));
    }

    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| CubeError::InvalidBaseUrl {
            url: base.to_string(),
            reason: "cannot carry path segments".into(),
        })?
        .pop_if_empty()
        .extend(["cube", cube_id, "data", "csv", config.lang.as_str()]);

    let pairs = query_pairs(config);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}
