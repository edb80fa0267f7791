/// Static master/slave topology
use super::{Endpoint, Role};
use crate::error::ConfigError;
use crate::modes::RoleSet;
use std::collections::HashSet;

/// Largest weight an endpoint may carry; each unit is one candidate-list entry
pub const MAX_WEIGHT: u32 = 1000;

/// Endpoints grouped by role, validated once and read-only afterwards
#[derive(Debug, Clone)]
pub struct Topology {
    master: Vec<Endpoint>,
    slave: Vec<Endpoint>,
}

impl Topology {
    /// Build a topology, rejecting empty master groups, weights outside
    /// `1..=MAX_WEIGHT` and duplicate identities. Endpoint roles are normalized to the group they
    /// were passed in.
    pub fn new(master: Vec<Endpoint>, slave: Vec<Endpoint>) -> Result<Self, ConfigError> {
        if master.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one master endpoint is required".to_string(),
            ));
        }

        let master: Vec<Endpoint> = master
            .into_iter()
            .map(|endpoint| Endpoint { role: Role::Master, ..endpoint })
            .collect();
        let slave: Vec<Endpoint> = slave
            .into_iter()
            .map(|endpoint| Endpoint { role: Role::Slave, ..endpoint })
            .collect();

        let mut seen = HashSet::new();
        for endpoint in master.iter().chain(slave.iter()) {
            if endpoint.identity.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Empty {} endpoint identity not allowed",
                    endpoint.role
                )));
            }
            if endpoint.weight == 0 || endpoint.weight > MAX_WEIGHT {
                return Err(ConfigError::ValidationError(format!(
                    "Endpoint {} must have a weight between 1 and {}",
                    endpoint.identity, MAX_WEIGHT
                )));
            }
            if !seen.insert(endpoint.identity.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate endpoint identity: {}",
                    endpoint.identity
                )));
            }
        }

        Ok(Self { master, slave })
    }

    pub fn master(&self) -> &[Endpoint] {
        &self.master
    }

    pub fn slave(&self) -> &[Endpoint] {
        &self.slave
    }

    /// Endpoints eligible for a role-set, masters first, in configuration order
    pub fn role_set(&self, role_set: RoleSet) -> Vec<&Endpoint> {
        match role_set {
            RoleSet::Master => self.master.iter().collect(),
            RoleSet::Slave => self.slave.iter().collect(),
            RoleSet::MasterAndSlave => self.master.iter().chain(self.slave.iter()).collect(),
        }
    }

    /// Look up an endpoint by identity
    pub fn endpoint(&self, identity: &str) -> Option<&Endpoint> {
        self.master
            .iter()
            .chain(self.slave.iter())
            .find(|endpoint| endpoint.identity == identity)
    }

    pub fn endpoint_count(&self) -> usize {
        self.master.len() + self.slave.len()
    }
}
