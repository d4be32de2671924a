//! linkid daemon: runs a validator node or the shared ledger service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use linkid_crypto::SigningIdentity;
use linkid_node::{init_logging, LogFormat, NodeConfig, ShutdownController, ValidatorNode};
use linkid_rpc::{LedgerServer, LedgerServiceConfig, RemoteLedger};
use linkid_store_lmdb::{LmdbEnvironment, DEFAULT_MAP_SIZE};
use linkid_types::PrivateKey;

#[derive(Parser)]
#[command(name = "linkid-daemon", about = "linkid identity-link validator daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Validator node commands.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Ledger service commands.
    #[command(name = "ledger")]
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run a validator node.
    Run(NodeArgs),
}

#[derive(clap::Subcommand)]
enum LedgerAction {
    /// Run the ledger service.
    Run(LedgerArgs),
}

#[derive(clap::Args)]
struct NodeArgs {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "LINKID_NODE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (0 picks an ephemeral port).
    #[arg(long, env = "LINKID_PORT")]
    port: Option<u16>,

    /// Hex secp256k1 secret of this validator.
    #[arg(long, env = "LINKID_VALIDATOR_KEY", hide_env_values = true)]
    validator_key: Option<String>,

    /// Base URL of the ledger service.
    #[arg(long, env = "LINKID_LEDGER_URL")]
    ledger_url: Option<String>,

    /// Data directory for validation records.
    #[arg(long, env = "LINKID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LINKID_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "LINKID_LOG_FORMAT")]
    log_format: Option<String>,

    /// Expose Prometheus metrics at `/metrics`.
    #[arg(long, env = "LINKID_ENABLE_METRICS")]
    metrics: bool,
}

#[derive(clap::Args)]
struct LedgerArgs {
    /// Path to a TOML configuration file listing the validator set.
    #[arg(long, env = "LINKID_LEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port of the ledger service.
    #[arg(long, env = "LINKID_LEDGER_PORT")]
    port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "LINKID_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            action: NodeAction::Run(args),
        } => run_node(args).await,
        Command::Ledger {
            action: LedgerAction::Run(args),
        } => run_ledger(args).await,
    }
}

async fn run_node(args: NodeArgs) -> anyhow::Result<()> {
    let config = node_config(args)?;

    let format: LogFormat = config
        .log_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    init_logging(format, &config.log_level);

    tracing::info!(
        port = config.port,
        ledger = %config.ledger_url,
        kind = %config.identifier_kind,
        mode = ?config.authentication_mode,
        "starting linkid validator node"
    );

    let key = PrivateKey::parse(&config.validator_key).context("invalid validator key")?;
    let identity = SigningIdentity::from_private(&key)?;
    let ledger = Arc::new(RemoteLedger::new(&config.ledger_url, identity));

    let env = LmdbEnvironment::open(&config.data_dir, DEFAULT_MAP_SIZE)
        .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?;
    let store = Arc::new(env.validation_store());

    let mut node = ValidatorNode::new(config, ledger, store);
    node.start().await?;
    tracing::info!(addr = %node.local_addr()?, "validator node running");

    node.shutdown_controller().wait_for_signal().await;

    tracing::info!("shutdown signal received, stopping node");
    node.stop().await?;

    tracing::info!("linkid daemon exited cleanly");
    Ok(())
}

/// Load the file configuration (or defaults) and apply CLI overrides.
fn node_config(args: NodeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path)
                .with_context(|| format!("failed to load node config {path}"))?
        }
        None => NodeConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(key) = args.validator_key {
        config.validator_key = key;
    }
    if let Some(url) = args.ledger_url {
        config.ledger_url = url;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(format) = args.log_format {
        config.log_format = format;
    }
    config.enable_metrics |= args.metrics;

    if config.validator_key.is_empty() {
        anyhow::bail!("no validator key: pass --validator-key or set LINKID_VALIDATOR_KEY");
    }
    config.validate()?;
    Ok(config)
}

async fn run_ledger(args: LedgerArgs) -> anyhow::Result<()> {
    init_logging(LogFormat::Human, &args.log_level);

    let mut config = match &args.config {
        Some(path) => LedgerServiceConfig::from_toml_file(path)
            .with_context(|| format!("failed to load ledger config {}", path.display()))?,
        None => LedgerServiceConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if config.validators.is_empty() {
        tracing::warn!("ledger service started with an empty validator set");
    }

    let shutdown = ShutdownController::new();
    LedgerServer::new(config)
        .run(async move { shutdown.wait_for_signal().await })
        .await?;

    tracing::info!("ledger service stopped");
    Ok(())
}
