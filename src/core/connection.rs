/// Driver abstraction and bounded connect attempts
///
/// The router never talks to a database itself. It drives a [`Driver`] that
/// knows how to open a [`Connection`] to an [`Endpoint`], and turns every
/// attempt into a typed result the dispatcher can fall back on.
use super::Endpoint;
use crate::error::{ConnectFailure, DriverError};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Statement parameter passed through to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Bytes(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Param::Null)
    }
}

/// An established connection to one endpoint
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Driver-specific statement result
    type Output: Send;

    /// Error details if the connection is in an error state
    fn error_state(&self) -> Option<String>;

    /// Execute a statement with positional parameters
    async fn execute(&self, statement: &str, params: &[Param]) -> Result<Self::Output, DriverError>;

    /// Release the underlying resources
    async fn close(&self);
}

/// Opens connections to endpoints
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Connection, DriverError>;
}

/// Open a connection to `endpoint`, bounded by `limit`.
///
/// A fresh connection that reports an error state is closed before the
/// failure is returned.
pub async fn connect_endpoint<D: Driver>(
    driver: &D,
    endpoint: &Endpoint,
    limit: Duration,
) -> Result<D::Connection, ConnectFailure> {
    debug!("Connecting to {} (timeout {:?})", endpoint.identity, limit);
    let started = Instant::now();

    let connection = match timeout(limit, driver.connect(endpoint)).await {
        Ok(Ok(connection)) => connection,
        Ok(Err(e)) => {
            debug!("Driver error connecting to {}: {}", endpoint.identity, e);
            return Err(ConnectFailure::Driver(e.to_string()));
        }
        Err(_) => {
            debug!("Timeout connecting to {}", endpoint.identity);
            return Err(ConnectFailure::Timeout(limit));
        }
    };

    if let Some(details) = connection.error_state() {
        connection.close().await;
        return Err(ConnectFailure::Unhealthy(details));
    }

    debug!(
        "Connected to {} in {}",
        endpoint.identity,
        crate::utils::format_duration(started.elapsed())
    );
    Ok(connection)
}
