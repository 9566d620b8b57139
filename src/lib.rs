//! Fetch data cubes from the SNB data portal and reshape them into long or
//! wide tables.

pub mod config;
pub mod cubes;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod process;
pub mod request;
pub mod session;

pub use config::{FilterConfiguration, RunConfig};
pub use cubes::CubeCatalog;
pub use error::{CubeError, CubeResult};
pub use process::{materialize, table::Table};
pub use request::build_locator;
pub use session::{CubeOutcome, Session};
