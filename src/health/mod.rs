/// Connection health checks and the cached-connection reuse policy
use crate::core::Connection;
use crate::error::ConnectFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health status of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { reason: String },
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy { reason } => write!(f, "Unhealthy: {}", reason),
        }
    }
}

impl HealthStatus {
    /// Check if the status represents a healthy connection
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Convert an unhealthy status into a dispatcher failure
    pub fn into_failure(self) -> Option<ConnectFailure> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Unhealthy { reason } => Some(ConnectFailure::Unhealthy(reason)),
        }
    }
}

/// Inspect a connection's error state
pub fn check_connection<C: Connection>(connection: &C) -> HealthStatus {
    match connection.error_state() {
        None => HealthStatus::Healthy,
        Some(reason) => HealthStatus::Unhealthy { reason },
    }
}

/// How cached connections are treated once they exist.
///
/// The default trusts a cached connection for the lifetime of the router,
/// even if it goes bad later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReusePolicy {
    /// Check a cached connection's error state before handing it out
    pub validate_on_reuse: bool,
    /// Drop a connection from the registry when a statement on it fails
    pub evict_on_exec_failure: bool,
}

impl ReusePolicy {
    pub fn trusting() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            validate_on_reuse: true,
            evict_on_exec_failure: true,
        }
    }
}
