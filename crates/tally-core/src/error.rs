//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A transaction or argument that should have been rejected upstream
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data for {what}: need at least {needed}, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("Model fit did not converge after {iterations} iterations: {reason}")]
    NonConvergence { iterations: usize, reason: String },

    /// Savings rate requested for a period with zero income
    #[error("Savings rate is undefined when income is zero")]
    UndefinedRate,

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable kind, used when stage failures are reported
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::InsufficientData { .. } => "insufficient_data",
            Error::NonConvergence { .. } => "non_convergence",
            Error::UndefinedRate => "undefined_rate",
            Error::Csv(_) => "csv",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
