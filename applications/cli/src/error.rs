/// Terminal front end errors
use thiserror::Error;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// First word of a command line is not a known command
    #[error("Unknown command: {0} (type `help` for a list)")]
    UnknownCommand(String),

    /// Command is known but its arguments are not
    #[error("Invalid argument for `{command}`: {reason}")]
    InvalidArgument {
        /// Command being parsed
        command: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Track number outside the current list
    #[error("No track #{0} (the list has {1})")]
    NoSuchTrack(usize, usize),
}

impl CliError {
    pub(crate) fn invalid(command: &'static str, reason: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            command,
            reason: reason.into(),
        }
    }
}
