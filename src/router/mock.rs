//! Scripted driver used by the unit tests
use crate::core::{Connection, Driver, Endpoint, Param};
use crate::error::DriverError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock driver answers a connect to one identity
#[derive(Debug, Clone)]
pub enum Behavior {
    Accept,
    Refuse(&'static str),
    Unhealthy(&'static str),
    Hang,
    Delay(Duration),
}

type Counter = Arc<Mutex<HashMap<String, usize>>>;

fn bump(counter: &Counter, identity: &str) {
    *counter
        .lock()
        .unwrap()
        .entry(identity.to_string())
        .or_insert(0) += 1;
}

pub struct MockConnection {
    identity: String,
    id: u64,
    error: Mutex<Option<String>>,
    exec_error: Mutex<Option<String>>,
    closed: AtomicBool,
    close_log: Option<Counter>,
}

impl MockConnection {
    pub fn new(identity: &str, id: u64) -> Self {
        Self {
            identity: identity.to_string(),
            id,
            error: Mutex::new(None),
            exec_error: Mutex::new(None),
            closed: AtomicBool::new(false),
            close_log: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn break_with(&self, reason: &str) {
        *self.error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_exec(&self, message: &str) {
        *self.exec_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Output = String;

    fn error_state(&self) -> Option<String> {
        self.error.lock().unwrap().clone()
    }

    async fn execute(&self, statement: &str, params: &[Param]) -> Result<String, DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        let exec_error = self.exec_error.lock().unwrap().clone();
        if let Some(message) = exec_error {
            return Err(DriverError::Query {
                code: "HY000".to_string(),
                message,
            });
        }
        Ok(format!("{}#{}: {} {:?}", self.identity, self.id, statement, params))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(log) = &self.close_log {
            bump(log, &self.identity);
        }
    }
}

#[derive(Default)]
pub struct MockDriver {
    behaviors: Mutex<HashMap<String, Behavior>>,
    connects: Counter,
    closes: Counter,
    next_id: AtomicU64,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(self, identity: &str, behavior: Behavior) -> Self {
        self.set_behavior(identity, behavior);
        self
    }

    pub fn set_behavior(&self, identity: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(identity.to_string(), behavior);
    }

    pub fn connect_count(&self, identity: &str) -> usize {
        self.connects.lock().unwrap().get(identity).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> usize {
        self.connects.lock().unwrap().values().sum()
    }

    pub fn closed_count(&self, identity: &str) -> usize {
        self.closes.lock().unwrap().get(identity).copied().unwrap_or(0)
    }

    fn open(&self, identity: &str) -> MockConnection {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MockConnection {
            close_log: Some(Arc::clone(&self.closes)),
            ..MockConnection::new(identity, id)
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Connection = MockConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<MockConnection, DriverError> {
        bump(&self.connects, &endpoint.identity);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&endpoint.identity)
            .cloned()
            .unwrap_or(Behavior::Accept);

        match behavior {
            Behavior::Accept => Ok(self.open(&endpoint.identity)),
            Behavior::Refuse(message) => Err(DriverError::connect(message)),
            Behavior::Unhealthy(reason) => {
                let connection = self.open(&endpoint.identity);
                connection.break_with(reason);
                Ok(connection)
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(self.open(&endpoint.identity))
            }
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open(&endpoint.identity))
            }
        }
    }
}
