use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tandem::config::{Config, ConfigError};
use tandem::{resolve_role_set, OperationKind, RoutingMode};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "A weighted master/slave database router with connection reuse and failover")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Tandem Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an example configuration file
    Config {
        /// Routing mode (master-slave, master-only or slave-only)
        #[arg(short, long, default_value = "master-slave")]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show how an operation would be routed
    Plan {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
        /// Operation kind (read or write)
        #[arg(short, long, default_value = "read")]
        operation: OperationKind,
        /// Number of candidate lists to sample
        #[arg(short, long, default_value_t = 1000)]
        samples: usize,
    },
    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { mode, output } => generate_config(mode, output),
        Commands::Validate { config } => validate_config(config),
        Commands::Plan {
            config,
            operation,
            samples,
        } => plan(config, operation, samples),
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

fn generate_config(mode: String, output: PathBuf) -> Result<()> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(&output, &mode).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and check it with:");
    println!("  tandem validate --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Routing mode: {}", config.router.routing_mode);
            println!("  Selection: {:?}", config.router.selection);
            println!("  Connect timeout: {}ms", config.router.connect_timeout_ms);

            let topology = config.topology()?;
            println!("  Masters: {} instances", topology.master().len());
            for (i, endpoint) in topology.master().iter().enumerate() {
                println!("    {}: {}", i + 1, endpoint);
            }
            println!("  Slaves: {} instances", topology.slave().len());
            for (i, endpoint) in topology.slave().iter().enumerate() {
                println!("    {}: {}", i + 1, endpoint);
            }

            if config.router.routing_mode == RoutingMode::SlaveOnly && topology.slave().is_empty() {
                println!("  ! slave_only mode with no slaves: every read will fail");
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn plan(config_path: PathBuf, operation: OperationKind, samples: usize) -> Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;
    info!("Configuration loaded from: {:?}", config_path);

    let topology = config.topology()?;
    let role_set = resolve_role_set(operation, config.router.routing_mode);
    let endpoints = topology.role_set(role_set);
    let strategy = config.router.selection.strategy();

    println!(
        "{} under {} resolves to the {} role-set ({} endpoints, {} selection)",
        operation,
        config.router.routing_mode,
        role_set,
        endpoints.len(),
        strategy.name()
    );

    if endpoints.is_empty() {
        println!("No candidates: this operation would fail with no available database");
        return Ok(());
    }

    let mut first_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for sample in 0..samples.max(1) {
        let candidates = strategy.candidates(&endpoints);
        if sample < 3 {
            let order: Vec<&str> = candidates.iter().map(|e| e.identity.as_str()).collect();
            println!("  sample {}: {}", sample + 1, order.join(" -> "));
        }
        if let Some(first) = candidates.first() {
            *first_counts.entry(first.identity.as_str()).or_insert(0) += 1;
        }
    }

    let total_weight: usize = endpoints.iter().map(|e| e.weight as usize).sum();
    println!("First candidate over {} samples:", samples.max(1));
    for endpoint in &endpoints {
        let count = first_counts.get(endpoint.identity.as_str()).copied().unwrap_or(0);
        println!(
            "  {}: {} (weight share {})",
            endpoint.identity,
            tandem::utils::format_share(count, samples.max(1)),
            tandem::utils::format_share(endpoint.weight as usize, total_weight)
        );
    }

    Ok(())
}

fn show_version() {
    println!("tandem v{}", env!("CARGO_PKG_VERSION"));
    println!("A weighted master/slave database router with connection reuse and failover");
    println!();
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Writes to masters, reads by routing mode");
    println!("  • Weighted random candidate order with failover");
    println!("  • Per-endpoint connection reuse");
    println!("  • Connect timeouts and selection deadlines");
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
