/// Client-facing router: resolves the role-set for an operation, obtains a
/// connection from the dispatcher and hands the statement to the driver.
pub mod dispatcher;

#[cfg(test)]
pub(crate) mod mock;

pub use dispatcher::{Dispatcher, Selected};

use crate::config::Config;
use crate::core::{Connection, Driver, Param, Topology};
use crate::error::{ConfigError, RouterError, RouterResult};
use crate::health::ReusePolicy;
use crate::modes::balancer::{CandidateStrategy, Selection};
use crate::modes::{resolve_role_set, OperationKind, RoleSet, RoutingMode};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Output type of a driver's connections
pub type Output<D> = <<D as Driver>::Connection as Connection>::Output;

/// Runtime routing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterOptions {
    pub routing_mode: RoutingMode,
    pub selection: Selection,
    /// Default bound on one connect attempt
    pub connect_timeout: Duration,
    /// Bound on one whole failover pass
    pub select_deadline: Option<Duration>,
    pub reuse: ReusePolicy,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            routing_mode: RoutingMode::MasterSlave,
            selection: Selection::Weighted,
            connect_timeout: Duration::from_secs(5),
            select_deadline: None,
            reuse: ReusePolicy::default(),
        }
    }
}

impl RouterOptions {
    pub fn with_routing_mode(mut self, routing_mode: RoutingMode) -> Self {
        self.routing_mode = routing_mode;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_select_deadline(mut self, select_deadline: Duration) -> Self {
        self.select_deadline = Some(select_deadline);
        self
    }

    pub fn with_reuse(mut self, reuse: ReusePolicy) -> Self {
        self.reuse = reuse;
        self
    }
}

/// Routes reads and writes across a master/slave topology.
///
/// A router owns its connection registry; share it between tasks with an
/// `Arc`.
pub struct Router<D: Driver> {
    topology: Topology,
    options: RouterOptions,
    dispatcher: Dispatcher<D>,
}

impl<D: Driver> Router<D> {
    pub fn new(topology: Topology, options: RouterOptions, driver: D) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(driver),
            options.selection.strategy(),
            options.connect_timeout,
            options.select_deadline,
            options.reuse,
        );

        info!(
            "Router ready: {} masters, {} slaves, mode {}, {} selection",
            topology.master().len(),
            topology.slave().len(),
            options.routing_mode,
            dispatcher.strategy_name()
        );

        Self {
            topology,
            options,
            dispatcher,
        }
    }

    /// Build a router from a validated configuration file
    pub fn from_config(config: &Config, driver: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.topology()?, config.router_options(), driver))
    }

    /// Replace the candidate ordering strategy
    pub fn with_strategy(mut self, strategy: Box<dyn CandidateStrategy>) -> Self {
        self.dispatcher.set_strategy(strategy);
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.options.routing_mode
    }

    /// Role-set an operation resolves to under this router's mode
    pub fn role_set_for(&self, operation: OperationKind) -> RoleSet {
        resolve_role_set(operation, self.options.routing_mode)
    }

    /// Obtain a connection for an operation without executing anything
    pub async fn select(&self, operation: OperationKind) -> RouterResult<Arc<D::Connection>> {
        self.select_from(self.role_set_for(operation)).await
    }

    /// Obtain a connection from an explicit role-set
    pub async fn select_from(&self, role_set: RoleSet) -> RouterResult<Arc<D::Connection>> {
        let selected = self.select_entry(role_set).await?;
        Ok(selected.connection)
    }

    async fn select_entry(&self, role_set: RoleSet) -> RouterResult<Selected<D::Connection>> {
        let endpoints = self.topology.role_set(role_set);
        self.dispatcher.select(role_set, &endpoints).await
    }

    /// Run a read statement on the role-set the routing mode allows
    pub async fn execute_read(&self, statement: &str, params: &[Param]) -> RouterResult<Output<D>> {
        self.execute(OperationKind::Read, statement, params).await
    }

    /// Run a write statement on a master
    pub async fn execute_write(&self, statement: &str, params: &[Param]) -> RouterResult<Output<D>> {
        self.execute(OperationKind::Write, statement, params).await
    }

    async fn execute(
        &self,
        operation: OperationKind,
        statement: &str,
        params: &[Param],
    ) -> RouterResult<Output<D>> {
        let selected = self.select_entry(self.role_set_for(operation)).await?;
        debug!("Executing {} on {}", operation, selected.identity);

        match selected.connection.execute(statement, params).await {
            Ok(output) => Ok(output),
            Err(e) => {
                if self.options.reuse.evict_on_exec_failure {
                    self.evict_if_current(&selected).await;
                }
                Err(RouterError::Exec(e))
            }
        }
    }

    async fn evict_if_current(&self, selected: &Selected<D::Connection>) {
        let mut slot = self.dispatcher.registry().lock(&selected.identity).await;
        let current = slot
            .cached()
            .is_some_and(|cached| Arc::ptr_eq(&cached, &selected.connection));
        if current {
            slot.take();
            drop(slot);
            warn!(
                "Evicted connection to {} after execution failure",
                selected.identity
            );
            selected.connection.close().await;
        }
    }

    /// Evict and close the cached connection for an endpoint
    pub async fn invalidate(&self, identity: &str) -> bool {
        match self.dispatcher.registry().evict(identity).await {
            Some(connection) => {
                connection.close().await;
                info!("Invalidated cached connection to {}", identity);
                true
            }
            None => false,
        }
    }

    /// Identities with a cached connection
    pub async fn cached_identities(&self) -> Vec<String> {
        self.dispatcher.registry().identities().await
    }

    /// Close and drop every cached connection, returning how many were closed
    pub async fn shutdown(&self) -> usize {
        let drained = self.dispatcher.registry().drain().await;
        let count = drained.len();

        join_all(drained.iter().map(|(_, connection)| connection.close())).await;

        info!("Router shut down, closed {} cached connections", count);
        count
    }
}
