/// Unified error handling for tandem
///
/// Covers configuration errors raised at load time, per-endpoint connect
/// failures collected by the dispatcher, and the errors surfaced to callers
/// of the router.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::modes::RoleSet;

/// Main error type for router operations
#[derive(Debug, Error)]
pub enum RouterError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every candidate of the resolved role-set failed
    #[error("No available database in {role_set} role-set: {failures}")]
    NoAvailableEndpoint {
        role_set: RoleSet,
        failures: FailureMap,
    },

    /// The selection budget ran out before a candidate succeeded
    #[error("Selection deadline exceeded after {elapsed:?}: {failures}")]
    DeadlineExceeded {
        elapsed: Duration,
        failures: FailureMap,
    },

    /// Statement execution failed on an already selected connection
    #[error("Execution error: {0}")]
    Exec(#[source] DriverError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Errors reported by a database driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Query error: {code} - {message}")]
    Query { code: String, message: String },

    #[error("Connection closed")]
    Closed,
}

/// Why a single endpoint could not serve a selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    /// The driver refused or failed to connect
    #[error("{0}")]
    Driver(String),

    /// The connect attempt did not finish in time
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The connection reported an error state
    #[error("unhealthy connection: {0}")]
    Unhealthy(String),
}

/// Per-endpoint failure details, keyed by endpoint identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureMap(BTreeMap<String, ConnectFailure>);

impl FailureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identity: &str, failure: ConnectFailure) {
        self.0.insert(identity.to_string(), failure);
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&ConnectFailure> {
        self.0.get(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConnectFailure)> {
        self.0.iter().map(|(identity, failure)| (identity.as_str(), failure))
    }
}

impl fmt::Display for FailureMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no candidates");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(identity, failure)| format!("{identity} => {failure}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Result type alias for router operations
pub type RouterResult<T> = Result<T, RouterError>;

impl RouterError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        RouterError::Config(ConfigError::ValidationError(message.into()))
    }

    /// Failure map attached to selection errors
    pub fn failures(&self) -> Option<&FailureMap> {
        match self {
            RouterError::NoAvailableEndpoint { failures, .. }
            | RouterError::DeadlineExceeded { failures, .. } => Some(failures),
            _ => None,
        }
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::NoAvailableEndpoint { failures, .. } => !failures.is_empty(),
            RouterError::DeadlineExceeded { .. } => true,
            RouterError::Exec(DriverError::Io(_)) => true,
            RouterError::Exec(DriverError::Closed) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RouterError::Config(_) => ErrorSeverity::Critical,
            RouterError::NoAvailableEndpoint { .. } => ErrorSeverity::Critical,
            RouterError::DeadlineExceeded { .. } => ErrorSeverity::Error,
            RouterError::Exec(_) => ErrorSeverity::Warning,
        }
    }
}

impl DriverError {
    /// Create a connect error
    pub fn connect<S: Into<String>>(message: S) -> Self {
        DriverError::Connect(message.into())
    }

    /// Create a query error
    pub fn query<S: Into<String>>(code: S, message: S) -> Self {
        DriverError::Query {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
