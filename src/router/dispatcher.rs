/// Failover dispatcher: walks a candidate list until one endpoint yields a
/// usable connection.
///
/// A cached connection short-circuits the walk the moment its endpoint comes
/// up, even if untried candidates follow. Endpoints without a cached
/// connection are connected under their registry slot lock, so concurrent
/// selections never open two connections to the same identity.
use crate::core::connection::connect_endpoint;
use crate::core::{Connection, ConnectionRegistry, Driver, Endpoint};
use crate::error::{ConnectFailure, FailureMap, RouterError, RouterResult};
use crate::health::{check_connection, ReusePolicy};
use crate::modes::balancer::CandidateStrategy;
use crate::modes::RoleSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// A connection handed out by the dispatcher, with the endpoint it belongs to
pub struct Selected<C> {
    pub identity: String,
    pub connection: Arc<C>,
}

pub struct Dispatcher<D: Driver> {
    driver: Arc<D>,
    registry: ConnectionRegistry<D::Connection>,
    strategy: Box<dyn CandidateStrategy>,
    connect_timeout: Duration,
    select_deadline: Option<Duration>,
    reuse: ReusePolicy,
}

impl<D: Driver> Dispatcher<D> {
    pub fn new(
        driver: Arc<D>,
        strategy: Box<dyn CandidateStrategy>,
        connect_timeout: Duration,
        select_deadline: Option<Duration>,
        reuse: ReusePolicy,
    ) -> Self {
        Self {
            driver,
            registry: ConnectionRegistry::new(),
            strategy,
            connect_timeout,
            select_deadline,
            reuse,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry<D::Connection> {
        &self.registry
    }

    pub fn set_strategy(&mut self, strategy: Box<dyn CandidateStrategy>) {
        self.strategy = strategy;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Pick a live connection from `endpoints`, the members of `role_set`
    pub async fn select(
        &self,
        role_set: RoleSet,
        endpoints: &[&Endpoint],
    ) -> RouterResult<Selected<D::Connection>> {
        let started = Instant::now();
        let candidates = self.strategy.candidates(endpoints);
        let mut failures = FailureMap::new();

        debug!(
            "Selecting from {} role-set: {} candidates ({})",
            role_set,
            candidates.len(),
            self.strategy.name()
        );

        for endpoint in candidates {
            // Weight duplicates of an endpoint that already failed in this pass
            if failures.contains(&endpoint.identity) {
                continue;
            }

            let budget = match self.select_deadline {
                Some(deadline) => {
                    let elapsed = started.elapsed();
                    if elapsed >= deadline {
                        return Err(self.deadline_exceeded(elapsed, failures));
                    }
                    Some(deadline - elapsed)
                }
                None => None,
            };

            match self.try_endpoint(endpoint, budget).await {
                Ok(connection) => {
                    return Ok(Selected {
                        identity: endpoint.identity.clone(),
                        connection,
                    });
                }
                Err(failure) => {
                    warn!("Database {} unavailable: {}", endpoint.identity, failure);
                    failures.record(&endpoint.identity, failure);
                }
            }
        }

        if let Some(deadline) = self.select_deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline && !failures.is_empty() {
                return Err(self.deadline_exceeded(elapsed, failures));
            }
        }

        error!("No available database in {} role-set: {}", role_set, failures);
        Err(RouterError::NoAvailableEndpoint { role_set, failures })
    }

    fn deadline_exceeded(&self, elapsed: Duration, failures: FailureMap) -> RouterError {
        error!(
            "Selection deadline exceeded after {}: {}",
            crate::utils::format_duration(elapsed),
            failures
        );
        RouterError::DeadlineExceeded { elapsed, failures }
    }

    async fn try_endpoint(
        &self,
        endpoint: &Endpoint,
        budget: Option<Duration>,
    ) -> Result<Arc<D::Connection>, ConnectFailure> {
        let mut limit = endpoint.connect_timeout.unwrap_or(self.connect_timeout);
        if let Some(budget) = budget {
            limit = limit.min(budget);
        }

        let attempt_started = Instant::now();
        let mut slot = timeout(limit, self.registry.lock(&endpoint.identity))
            .await
            .map_err(|_| ConnectFailure::Timeout(limit))?;

        if let Some(connection) = slot.cached() {
            if !self.reuse.validate_on_reuse {
                debug!("Reusing cached connection to {}", endpoint.identity);
                return Ok(connection);
            }

            match check_connection(connection.as_ref()).into_failure() {
                None => {
                    debug!("Reusing validated connection to {}", endpoint.identity);
                    return Ok(connection);
                }
                Some(failure) => {
                    info!(
                        "Evicting stale connection to {}: {}",
                        endpoint.identity, failure
                    );
                    slot.take();
                    connection.close().await;
                }
            }
        }

        let remaining = limit.saturating_sub(attempt_started.elapsed());
        if remaining.is_zero() {
            return Err(ConnectFailure::Timeout(limit));
        }

        let connection = connect_endpoint(self.driver.as_ref(), endpoint, remaining).await?;
        Ok(slot.store(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::balancer::{PriorityOrder, WeightedShuffle};
    use crate::router::mock::{Behavior, MockDriver};

    fn dispatcher(driver: MockDriver) -> (Arc<MockDriver>, Dispatcher<MockDriver>) {
        let driver = Arc::new(driver);
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_millis(200),
            None,
            ReusePolicy::default(),
        );
        (driver, dispatcher)
    }

    #[tokio::test]
    async fn test_fails_over_to_next_candidate() {
        let (driver, dispatcher) =
            dispatcher(MockDriver::new().with_behavior("a", Behavior::Refuse("refused")));
        let a = Endpoint::master("a");
        let b = Endpoint::slave("b");

        let selected = dispatcher.select(RoleSet::MasterAndSlave, &[&a, &b]).await.unwrap();

        assert_eq!(selected.identity, "b");
        assert_eq!(selected.connection.identity(), "b");
        assert_eq!(driver.connect_count("a"), 1);
        assert_eq!(dispatcher.registry().identities().await, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_connection_wins_over_untried_candidates() {
        let (driver, dispatcher) = dispatcher(MockDriver::new());
        let a = Endpoint::master("a");
        let b = Endpoint::slave("b");

        let first = dispatcher.select(RoleSet::Master, &[&b]).await.unwrap();
        let second = dispatcher.select(RoleSet::MasterAndSlave, &[&b, &a]).await.unwrap();

        assert!(Arc::ptr_eq(&first.connection, &second.connection));
        assert_eq!(driver.connect_count("b"), 1);
        assert_eq!(driver.connect_count("a"), 0);
    }

    #[tokio::test]
    async fn test_exhausted_candidates_report_every_failure() {
        let (_driver, dispatcher) = dispatcher(
            MockDriver::new()
                .with_behavior("a", Behavior::Refuse("refused"))
                .with_behavior("b", Behavior::Unhealthy("HY000")),
        );
        let a = Endpoint::master("a");
        let b = Endpoint::master("b");

        let error = dispatcher.select(RoleSet::Master, &[&a, &b]).await.err().unwrap();

        match error {
            RouterError::NoAvailableEndpoint { role_set, failures } => {
                assert_eq!(role_set, RoleSet::Master);
                assert_eq!(failures.len(), 2);
                assert_eq!(
                    failures.get("b"),
                    Some(&ConnectFailure::Unhealthy("HY000".to_string()))
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_endpoint_not_retried_within_pass() {
        let driver = Arc::new(MockDriver::new().with_behavior("a", Behavior::Refuse("refused")));
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(WeightedShuffle::new()),
            Duration::from_millis(200),
            None,
            ReusePolicy::default(),
        );
        let a = Endpoint::master("a").with_weight(4);

        let error = dispatcher.select(RoleSet::Master, &[&a]).await.err().unwrap();

        assert_eq!(error.failures().map(FailureMap::len), Some(1));
        assert_eq!(driver.connect_count("a"), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout_moves_on() {
        let (_driver, dispatcher) = dispatcher(MockDriver::new().with_behavior("a", Behavior::Hang));
        let a = Endpoint::master("a").with_connect_timeout(Duration::from_millis(20));
        let b = Endpoint::master("b");

        let selected = dispatcher.select(RoleSet::Master, &[&a, &b]).await.unwrap();
        assert_eq!(selected.identity, "b");
    }

    #[tokio::test]
    async fn test_deadline_bounds_the_pass() {
        let driver = Arc::new(
            MockDriver::new()
                .with_behavior("a", Behavior::Hang)
                .with_behavior("b", Behavior::Hang),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_secs(5),
            Some(Duration::from_millis(50)),
            ReusePolicy::default(),
        );
        let a = Endpoint::master("a");
        let b = Endpoint::master("b");

        let started = Instant::now();
        let error = dispatcher.select(RoleSet::Master, &[&a, &b]).await.err().unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        match error {
            RouterError::DeadlineExceeded { failures, .. } => {
                assert!(matches!(failures.get("a"), Some(ConnectFailure::Timeout(_))));
                assert_eq!(driver.connect_count("b"), 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_validate_on_reuse_replaces_stale_connection() {
        let driver = Arc::new(MockDriver::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_millis(200),
            None,
            ReusePolicy {
                validate_on_reuse: true,
                evict_on_exec_failure: false,
            },
        );
        let a = Endpoint::master("a");

        let first = dispatcher.select(RoleSet::Master, &[&a]).await.unwrap();
        first.connection.break_with("server has gone away");

        let second = dispatcher.select(RoleSet::Master, &[&a]).await.unwrap();

        assert!(!Arc::ptr_eq(&first.connection, &second.connection));
        assert!(first.connection.is_closed());
        assert_eq!(driver.connect_count("a"), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_after_stale_eviction_moves_on() {
        let driver = Arc::new(MockDriver::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_millis(200),
            None,
            ReusePolicy {
                validate_on_reuse: true,
                evict_on_exec_failure: false,
            },
        );
        let a = Endpoint::master("a");
        let b = Endpoint::master("b");

        let first = dispatcher.select(RoleSet::Master, &[&a]).await.unwrap();
        first.connection.break_with("server has gone away");
        driver.set_behavior("a", Behavior::Refuse("refused"));

        let selected = dispatcher.select(RoleSet::Master, &[&a, &b]).await.unwrap();

        assert_eq!(selected.identity, "b");
        assert!(first.connection.is_closed());
        assert_eq!(driver.connect_count("a"), 2);
        assert_eq!(dispatcher.registry().identities().await, vec!["b".to_string()]);

        // The failure for "a" is visible once "b" is gone too
        driver.set_behavior("b", Behavior::Refuse("refused"));
        dispatcher.registry().evict("b").await;
        let error = dispatcher.select(RoleSet::Master, &[&a, &b]).await.err().unwrap();
        assert!(matches!(
            error.failures().and_then(|f| f.get("a")),
            Some(ConnectFailure::Driver(_))
        ));
    }

    #[tokio::test]
    async fn test_deadline_spent_by_last_candidate() {
        let driver = Arc::new(MockDriver::new().with_behavior("a", Behavior::Hang));
        let dispatcher = Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_secs(5),
            Some(Duration::from_millis(50)),
            ReusePolicy::default(),
        );
        let a = Endpoint::master("a");

        let error = dispatcher.select(RoleSet::Master, &[&a]).await.err().unwrap();

        match error {
            RouterError::DeadlineExceeded { elapsed, failures } => {
                assert!(elapsed >= Duration::from_millis(50));
                assert_eq!(failures.identities().collect::<Vec<_>>(), vec!["a"]);
                assert!(matches!(failures.get("a"), Some(ConnectFailure::Timeout(_))));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stale_connection_kept_by_default() {
        let (driver, dispatcher) = dispatcher(MockDriver::new());
        let a = Endpoint::master("a");

        let first = dispatcher.select(RoleSet::Master, &[&a]).await.unwrap();
        first.connection.break_with("server has gone away");
        let second = dispatcher.select(RoleSet::Master, &[&a]).await.unwrap();

        assert!(Arc::ptr_eq(&first.connection, &second.connection));
        assert_eq!(driver.connect_count("a"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_selections_connect_once() {
        let driver = Arc::new(
            MockDriver::new().with_behavior("a", Behavior::Delay(Duration::from_millis(30))),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&driver),
            Box::new(PriorityOrder::new()),
            Duration::from_secs(1),
            None,
            ReusePolicy::default(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let a = Endpoint::master("a");
                    dispatcher
                        .select(RoleSet::Master, &[&a])
                        .await
                        .map(|selected| selected.connection.id())
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }

        assert_eq!(driver.connect_count("a"), 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }
}
