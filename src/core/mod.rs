/// Core abstractions shared by the selector, dispatcher and router
pub mod connection;
pub mod registry;
pub mod topology;

pub use connection::{Connection, Driver, Param};
pub use registry::ConnectionRegistry;
pub use topology::{Topology, MAX_WEIGHT};

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Replication role of a database endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepts reads and writes
    Master,
    /// Accepts reads only
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// Login credentials handed to the driver
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One addressable database backend
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Unique connection string, e.g. a DSN
    pub identity: String,
    pub role: Role,
    pub credentials: Credentials,
    /// Driver-specific options
    pub options: BTreeMap<String, String>,
    /// Selection weight, always >= 1 once part of a topology
    pub weight: u32,
    /// Overrides the router-wide connect timeout
    pub connect_timeout: Option<Duration>,
}

impl Endpoint {
    pub fn new<S: Into<String>>(identity: S, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
            credentials: Credentials::default(),
            options: BTreeMap::new(),
            weight: 1,
            connect_timeout: None,
        }
    }

    pub fn master<S: Into<String>>(identity: S) -> Self {
        Self::new(identity, Role::Master)
    }

    pub fn slave<S: Into<String>>(identity: S) -> Self {
        Self::new(identity, Role::Slave)
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, weight {})", self.identity, self.role, self.weight)
    }
}
