//! Tandem - weighted master/slave database router
//!
//! Tandem hides a replicated database topology behind one [`Router`]:
//! 1. Writes always go to a master
//! 2. Reads go to masters, slaves or both depending on the [`RoutingMode`]
//! 3. Endpoints are tried in a weight-expanded random order, and the first
//!    one that yields a healthy connection wins
//! 4. Established connections are cached per endpoint and reused
pub mod config;
pub mod error;
pub mod core;
pub mod health;
pub mod modes;
pub mod router;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{Connection, Credentials, Driver, Endpoint, Param, Role, Topology};
pub use crate::error::{ConfigError, ConnectFailure, DriverError, FailureMap, RouterError, RouterResult};
pub use crate::health::ReusePolicy;
pub use crate::modes::balancer::{CandidateStrategy, PriorityOrder, Selection, WeightedShuffle};
pub use crate::modes::{resolve_role_set, OperationKind, RoleSet, RoutingMode};
pub use crate::router::{Router, RouterOptions};
