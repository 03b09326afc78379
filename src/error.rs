use std::process::ExitCode;

use crate::agent::Category;

/// Errors raised by the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompanionError {
    #[error("rejected: empty input")]
    EmptyInputRejected,

    #[error("no response configured for category {0}")]
    InvalidCategory(Category),

    #[error("scheduler already cancelled")]
    SchedulerAlreadyCancelled,

    #[error("reply timer unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("invalid lexicon: {0}")]
    InvalidLexicon(String),
}

/// Errors that cause companion to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{message}")]
    WithCode { code: u8, message: String },

    #[error("{0}")]
    Other(String),
}

impl ExitError {
    pub fn new(code: u8, message: String) -> Self {
        ExitError::WithCode { code, message }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExitError::Config(_) => ExitCode::from(2),
            ExitError::InvalidInput(_) => ExitCode::from(3),
            ExitError::WithCode { code, .. } => ExitCode::from(*code),
            ExitError::Other(_) => ExitCode::from(1),
        }
    }
}

impl From<CompanionError> for ExitError {
    fn from(err: CompanionError) -> Self {
        match err {
            CompanionError::InvalidLexicon(msg) => ExitError::Config(msg),
            CompanionError::EmptyInputRejected => ExitError::InvalidInput(err.to_string()),
            other => ExitError::Other(other.to_string()),
        }
    }
}
