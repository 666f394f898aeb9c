//! Error taxonomy surfaced by the client
//!
//! Every call either succeeds with a well-formed result or fails with exactly
//! one [`QuickbooksError`]. Backend-reported failures carry an [`ErrorRecord`].

use std::fmt;

/// Default error code when a backend fault omits one
pub const DEFAULT_ERROR_CODE: &str = "BAD_REQUEST";

/// Body of a backend-reported failure. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    pub cause: String,
    pub sub_code: Option<String>,
}

impl ErrorRecord {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cause: String::new(),
            sub_code: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = cause.into();
        self
    }

    pub fn with_sub_code(mut self, sub_code: impl Into<String>) -> Self {
        self.sub_code = Some(sub_code.into());
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.code, self.cause, self.message)
    }
}

/// Network-level failure reported by a [`Transport`](super::transport::Transport)
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// The classified outcome of a failed call
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuickbooksError {
    /// Programming or setup error; never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response could not be parsed in the expected wire format
    #[error("communication error: {message}")]
    Communication { message: String, raw: String },

    /// Credential invalid or expired; the credential has been invalidated
    #[error("authentication failure: {0}")]
    AuthenticationFailure(ErrorRecord),

    /// Transient backend fault
    #[error("backend asked to try later: {0}")]
    TryLater(ErrorRecord),

    #[error("duplicate item: {0}")]
    DuplicateItem(ErrorRecord),

    #[error("not found: {0}")]
    NotFound(ErrorRecord),

    #[error("api error: {0}")]
    Api(ErrorRecord),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Discriminant of [`QuickbooksError`], convenient for assertions and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Communication,
    AuthenticationFailure,
    TryLater,
    DuplicateItem,
    NotFound,
    Api,
    UnsupportedOperation,
    InvalidRequest,
    Cancelled,
}

impl QuickbooksError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuickbooksError::Configuration(_) => ErrorKind::Configuration,
            QuickbooksError::Transport(_) => ErrorKind::Transport,
            QuickbooksError::Communication { .. } => ErrorKind::Communication,
            QuickbooksError::AuthenticationFailure(_) => ErrorKind::AuthenticationFailure,
            QuickbooksError::TryLater(_) => ErrorKind::TryLater,
            QuickbooksError::DuplicateItem(_) => ErrorKind::DuplicateItem,
            QuickbooksError::NotFound(_) => ErrorKind::NotFound,
            QuickbooksError::Api(_) => ErrorKind::Api,
            QuickbooksError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            QuickbooksError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            QuickbooksError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Transient backend faults and network failures share one bounded budget
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuickbooksError::TryLater(_) | QuickbooksError::Transport(_))
    }

    /// Generic API errors and their subtypes
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            QuickbooksError::Api(_) | QuickbooksError::DuplicateItem(_) | QuickbooksError::NotFound(_)
        )
    }

    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            QuickbooksError::AuthenticationFailure(record)
            | QuickbooksError::TryLater(record)
            | QuickbooksError::DuplicateItem(record)
            | QuickbooksError::NotFound(record)
            | QuickbooksError::Api(record) => Some(record),
            _ => None,
        }
    }
}

/// Result alias used across the client
pub type Result<T> = std::result::Result<T, QuickbooksError>;
