//! Error types and exit codes for the command-line host.

use descript::RegistryError;

/// Process exit codes.
pub mod exit_codes {
    pub const FAILURE: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const INVALID_PLAN: i32 = 3;
    pub const REGISTRY: i32 = 4;
}

/// All errors that can occur in the host.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("No page loaded. Use /load <page.html> first")]
    NoPageLoaded,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        use exit_codes::*;
        match self {
            CliError::Io(_) | CliError::Selector(_) => FAILURE,
            CliError::Json(_) | CliError::InvalidPlan(_) => INVALID_PLAN,
            CliError::Registry(_) => REGISTRY,
            CliError::InvalidCommand(_) | CliError::NoPageLoaded => USAGE,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
