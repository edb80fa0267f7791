/// Configuration management for tandem

use crate::core::{Credentials, Endpoint, Role, Topology, MAX_WEIGHT};
use crate::health::ReusePolicy;
use crate::modes::balancer::Selection;
use crate::modes::RoutingMode;
use crate::router::RouterOptions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use crate::error::ConfigError;

/// Main tandem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Routing configuration
    #[serde(default)]
    pub router: RouterConfig,
    /// Master and slave endpoints
    pub topology: TopologyConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Which role-set reads are drawn from
    #[serde(default)]
    pub routing_mode: RoutingMode,
    /// Candidate ordering: weighted or ordered
    #[serde(default)]
    pub selection: Selection,
    /// Connect timeout in milliseconds, per attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Budget in milliseconds for one whole failover pass
    pub select_deadline_ms: Option<u64>,
    /// Check cached connections before reuse
    #[serde(default)]
    pub validate_on_reuse: bool,
    /// Drop cached connections whose statements fail
    #[serde(default)]
    pub evict_on_exec_failure: bool,
}

/// Endpoint groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Masters (1 or more)
    pub master: Vec<EndpointConfig>,
    /// Slaves (0 or more)
    #[serde(default)]
    pub slave: Vec<EndpointConfig>,
}

/// One endpoint record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Connection string, unique across the topology
    pub identity: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Overrides router.connect_timeout_ms
    pub connect_timeout_ms: Option<u64>,
    /// Driver-specific options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (text, compact)
    pub format: String,
}

fn default_weight() -> u32 {
    1
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            routing_mode: RoutingMode::MasterSlave,
            selection: Selection::Weighted,
            connect_timeout_ms: default_connect_timeout_ms(),
            select_deadline_ms: None,
            validate_on_reuse: false,
            evict_on_exec_failure: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn new<S: Into<String>>(identity: S) -> Self {
        Self {
            identity: identity.into(),
            username: String::new(),
            password: String::new(),
            options: BTreeMap::new(),
            weight: default_weight(),
            connect_timeout_ms: None,
        }
    }

    fn to_endpoint(&self, role: Role) -> Endpoint {
        let mut endpoint = Endpoint::new(self.identity.clone(), role)
            .with_weight(self.weight)
            .with_credentials(Credentials::new(self.username.clone(), self.password.clone()));
        endpoint.options = self.options.clone();
        endpoint.connect_timeout = self.connect_timeout_ms.map(Duration::from_millis);
        endpoint
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            topology: TopologyConfig {
                master: vec![EndpointConfig {
                    username: "root".to_string(),
                    ..EndpointConfig::new("mysql:host=localhost;dbname=test")
                }],
                slave: vec![],
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without validating it
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate router config
        if self.router.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(deadline) = self.router.select_deadline_ms {
            if deadline < self.router.connect_timeout_ms {
                return Err(ConfigError::ValidationError(
                    "select_deadline_ms must not be less than connect_timeout_ms".to_string(),
                ));
            }
        }

        // Validate topology
        if self.topology.master.is_empty() {
            return Err(ConfigError::ValidationError(
                "topology.master cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let groups = [("master", &self.topology.master), ("slave", &self.topology.slave)];
        for (group, endpoints) in groups {
            for endpoint in endpoints.iter() {
                if endpoint.identity.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "Empty {} endpoint identity not allowed",
                        group
                    )));
                }

                if endpoint.weight == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid weight 0 for {} endpoint {}",
                        group, endpoint.identity
                    )));
                }

                if endpoint.weight > MAX_WEIGHT {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid weight {} for {} endpoint {} (maximum {})",
                        endpoint.weight, group, endpoint.identity, MAX_WEIGHT
                    )));
                }

                if endpoint.connect_timeout_ms == Some(0) {
                    return Err(ConfigError::ValidationError(format!(
                        "connect_timeout_ms must be greater than 0 for {}",
                        endpoint.identity
                    )));
                }

                if !seen.insert(endpoint.identity.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "Duplicate endpoint identity: {}",
                        endpoint.identity
                    )));
                }
            }
        }

        // Validate logging config
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "text" | "compact" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        Ok(())
    }

    /// Build the runtime topology
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        let master = self
            .topology
            .master
            .iter()
            .map(|e| e.to_endpoint(Role::Master))
            .collect();
        let slave = self
            .topology
            .slave
            .iter()
            .map(|e| e.to_endpoint(Role::Slave))
            .collect();

        Topology::new(master, slave)
    }

    /// Build the runtime routing options
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            routing_mode: self.router.routing_mode,
            selection: self.router.selection,
            connect_timeout: Duration::from_millis(self.router.connect_timeout_ms),
            select_deadline: self.router.select_deadline_ms.map(Duration::from_millis),
            reuse: ReusePolicy {
                validate_on_reuse: self.router.validate_on_reuse,
                evict_on_exec_failure: self.router.evict_on_exec_failure,
            },
        }
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let routing_mode: RoutingMode = mode
            .parse()
            .map_err(ConfigError::ValidationError)?;

        let endpoint = |host: &str, weight: u32| EndpointConfig {
            username: "app".to_string(),
            weight,
            options: BTreeMap::from([("charset".to_string(), "utf8mb4".to_string())]),
            ..EndpointConfig::new(format!("mysql:host={};dbname=app", host))
        };

        let config = Config {
            router: RouterConfig {
                routing_mode,
                select_deadline_ms: Some(15000),
                ..RouterConfig::default()
            },
            topology: TopologyConfig {
                master: vec![endpoint("10.0.1.10", 1)],
                slave: vec![endpoint("10.0.1.20", 1), endpoint("10.0.1.21", 2)],
            },
            logging: LoggingConfig::default(),
        };

        config.save_to_file(path)
    }
}
