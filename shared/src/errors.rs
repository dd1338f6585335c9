use std::time::Duration;
use thiserror::Error;

/// Timeout constants for network operations
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Standard error types for the Ocean CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or malformed environment / credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Required command parameters were not supplied
    #[error("Missing required argument(s) for {command}: {}", missing.join(", "))]
    MissingArgument {
        command: String,
        missing: Vec<String>,
    },

    /// A supplied argument could not be used
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Two registry entries share a name or alias
    #[error("Duplicate command name or alias: {0}")]
    DuplicateCommand(String),

    #[error("Invalid command descriptor for {command}: {reason}")]
    InvalidDescriptor { command: String, reason: String },

    /// Compute initialize step returned nothing usable
    #[error("Compute initialization failed: {0}")]
    Initialization(String),

    #[error("Compute start failed: {0}")]
    Start(String),

    /// Paid compute needs either a terminal or an explicit accept flag
    #[error("Payment confirmation requires an interactive terminal; pass --accept true to proceed")]
    NonInteractiveConfirmation,

    /// Remote service answered with a non-success status
    #[error("Remote service error ({status}): {message}")]
    RemoteService { status: u16, message: String },

    /// Network connection failed
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Contract call or RPC failure
    #[error("Chain error: {0}")]
    Chain(String),

    #[error("No contract addresses known for chain {chain_id}")]
    ContractsUnavailable { chain_id: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub fn chain(err: impl std::fmt::Display) -> Self {
        CliError::Chain(err.to_string())
    }

    pub fn missing(command: &str, missing: Vec<String>) -> Self {
        CliError::MissingArgument {
            command: command.to_string(),
            missing,
        }
    }

    /// Errors that should make a one-shot invocation exit non-zero
    pub fn is_fatal_for_process(&self) -> bool {
        matches!(
            self,
            CliError::Configuration(_)
                | CliError::DuplicateCommand(_)
                | CliError::InvalidDescriptor { .. }
                | CliError::NonInteractiveConfirmation
        )
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CliError::Timeout(err.to_string())
        } else if err.is_connect() {
            CliError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            CliError::RemoteService {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            CliError::Network(err.to_string())
        }
    }
}

/// Result type alias using CliError
pub type CliResult<T> = Result<T, CliError>;
