/// Routing modes and the operation → role-set policy
pub mod balancer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy controlling which role-set reads are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Reads hit masters and slaves, writes hit masters
    #[default]
    MasterSlave,
    /// Every operation hits masters
    MasterOnly,
    /// Reads hit slaves only, writes still hit masters
    SlaveOnly,
}

/// Operation intent declared by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// Endpoints eligible for one selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSet {
    Master,
    Slave,
    MasterAndSlave,
}

/// Resolve the role-set an operation is drawn from.
///
/// Writes always go to masters, whatever the routing mode.
pub fn resolve_role_set(operation: OperationKind, mode: RoutingMode) -> RoleSet {
    match (operation, mode) {
        (OperationKind::Write, _) => RoleSet::Master,
        (OperationKind::Read, RoutingMode::MasterSlave) => RoleSet::MasterAndSlave,
        (OperationKind::Read, RoutingMode::MasterOnly) => RoleSet::Master,
        (OperationKind::Read, RoutingMode::SlaveOnly) => RoleSet::Slave,
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::MasterSlave => write!(f, "master_slave"),
            RoutingMode::MasterOnly => write!(f, "master_only"),
            RoutingMode::SlaveOnly => write!(f, "slave_only"),
        }
    }
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "master_slave" => Ok(RoutingMode::MasterSlave),
            "master_only" | "master" => Ok(RoutingMode::MasterOnly),
            "slave_only" | "slave" => Ok(RoutingMode::SlaveOnly),
            other => Err(format!(
                "Unknown routing mode '{}': expected master_slave, master_only or slave_only",
                other
            )),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Write => write!(f, "write"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(OperationKind::Read),
            "write" => Ok(OperationKind::Write),
            other => Err(format!("Unknown operation '{}': expected read or write", other)),
        }
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleSet::Master => write!(f, "master"),
            RoleSet::Slave => write!(f, "slave"),
            RoleSet::MasterAndSlave => write!(f, "master+slave"),
        }
    }
}
