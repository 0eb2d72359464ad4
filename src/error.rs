//! Error taxonomy shared by the dispatcher, the configuration resolver and the
//! network clients.
//!
//! Commands themselves return `anyhow::Result`, the dispatcher downcasts to
//! [`CliError`] to pick an exit status. Anything that is not a `CliError` is
//! treated as an unexpected failure.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// No registered command matches the given name (case-insensitive).
    #[error("Command not supported: '{name}'")]
    CommandNotFound { name: String },

    /// Tokens left over after parsing and deprecated-name filtering.
    #[error("Unexpected arguments for command '{command}': {}", .unexpected.join(" "))]
    ArgumentParsing {
        command: String,
        unexpected: Vec<String>,
    },

    #[error("Missing required parameters: {}. Usage: {usage}", .names.join(", "))]
    RequiredParameterMissing { names: Vec<String>, usage: String },

    /// A resolved setting has a value that cannot be used (bad URL, ...).
    #[error("Invalid value for '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },

    /// The user has not yet approved the device code. Never leaves the poll loop.
    #[error("authorization pending")]
    AuthorizationPending,

    /// The server asked the client to poll less often. Never leaves the poll loop.
    #[error("polling too fast")]
    SlowDown,

    #[error("Authorization failed: {error}{}", .description.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
    AuthorizationFailed {
        error: String,
        description: Option<String>,
    },

    #[error("Authorization timed out after {seconds}s, please try again")]
    AuthorizationExpired { seconds: u64 },

    /// Non-2xx response; the body is carried verbatim.
    #[error("{operation} failed with status {status}: {body}")]
    RestCall {
        operation: String,
        status: StatusCode,
        body: String,
    },

    /// Transport-level failure; the cause is reported through the error chain.
    #[error("{operation} failed")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// Expected, user-correctable failure raised by a command.
    #[error("{0}")]
    Command(String),
}

impl CliError {
    pub fn rest_call(operation: impl Into<String>, status: StatusCode, body: String) -> Self {
        Self::RestCall {
            operation: operation.into(),
            status,
            body,
        }
    }

    pub fn http(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            operation: operation.into(),
            source,
        }
    }

    /// Errors caused by how the command was invoked rather than by what it did.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            CliError::CommandNotFound { .. }
                | CliError::ArgumentParsing { .. }
                | CliError::RequiredParameterMissing { .. }
                | CliError::InvalidSetting { .. }
        )
    }
}

pub type CliResult<T> = Result<T, CliError>;
