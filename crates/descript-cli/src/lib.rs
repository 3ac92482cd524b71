//! Descript CLI host: extracts managed scripts from HTML pages, runs
//! partition plans over them and renders the resulting containers.

pub mod config;
pub mod extract;
pub mod materialize;
pub mod plan;
pub mod repl;
pub mod types;

pub use config::resolve_plan_path;
pub use extract::{extract_from_file, extract_scripts};
pub use materialize::{render, OutputFormat};
pub use plan::{Plan, PlanReport, Step};
pub use types::{CliError, CliResult};
