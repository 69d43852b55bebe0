use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodgate::clock::SystemClock;
use floodgate::config::{FloodgateConfig, LoggingConfig};
use floodgate::ratelimit::{FailMode, LimiterRegistry, PolicySet};
use floodgate::store::MemoryStore;

/// Drive Floodgate limiters from the command line against an in-process store.
#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about)]
struct Cli {
    /// Process configuration file (YAML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Policy file (YAML); overrides `policies.path` from the configuration
    #[arg(long, short)]
    policies: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run sequential admission checks and print each decision
    Check {
        #[arg(long)]
        policy: String,
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = 1)]
        cost: u64,
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Pause between repeated checks
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
    /// Fire concurrent callers at one key and report how many were admitted
    Simulate {
        #[arg(long)]
        policy: String,
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = 100)]
        callers: usize,
        /// Upper bound of the random start delay given to each caller
        #[arg(long, default_value_t = 0)]
        jitter_ms: u64,
    },
    /// List the loaded policies
    Policies,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = FloodgateConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging);

    info!("Starting Floodgate {}", env!("CARGO_PKG_VERSION"));

    let policies_path = cli
        .policies
        .clone()
        .or_else(|| config.policies.path.as_ref().map(PathBuf::from))
        .context("no policy file given; pass --policies or set policies.path")?;
    let policies = PolicySet::from_file(&policies_path)
        .with_context(|| format!("loading policies from {}", policies_path.display()))?;

    let registry = Arc::new(LimiterRegistry::new(
        &policies,
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock::new()),
        config.store.limiter_options(),
    )?);
    let fail_mode = config.store.fail_mode;

    match cli.command {
        Command::Check {
            policy,
            key,
            cost,
            repeat,
            interval_ms,
        } => check(&registry, fail_mode, &policy, &key, cost, repeat, interval_ms).await?,
        Command::Simulate {
            policy,
            key,
            callers,
            jitter_ms,
        } => simulate(registry.clone(), fail_mode, &policy, &key, callers, jitter_ms).await?,
        Command::Policies => {
            for policy in &policies.policies {
                println!("{}", serde_json::to_string(policy)?);
            }
        }
    }

    registry.close().await?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}

async fn check(
    registry: &LimiterRegistry,
    fail_mode: FailMode,
    policy: &str,
    key: &str,
    cost: u64,
    repeat: u32,
    interval_ms: u64,
) -> anyhow::Result<()> {
    for attempt in 1..=repeat {
        let decision = fail_mode.resolve(registry.allow(policy, key, cost).await)?;
        println!(
            "{}",
            json!({ "attempt": attempt, "policy": policy, "key": key, "decision": decision })
        );
        if attempt < repeat && interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }
    Ok(())
}

async fn simulate(
    registry: Arc<LimiterRegistry>,
    fail_mode: FailMode,
    policy: &str,
    key: &str,
    callers: usize,
    jitter_ms: u64,
) -> anyhow::Result<()> {
    let limiter = registry
        .get(policy)
        .with_context(|| format!("unknown policy '{}'", policy))?;

    let delays: Vec<u64> = {
        let mut rng = rand::thread_rng();
        (0..callers).map(|_| rng.gen_range(0..=jitter_ms)).collect()
    };

    let tasks = delays.into_iter().map(|delay| {
        let limiter = limiter.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            fail_mode.resolve(limiter.allow_one(&key).await)
        })
    });

    let mut admitted = 0usize;
    let mut rejected = 0usize;
    for outcome in futures::future::join_all(tasks).await {
        if outcome??.admitted {
            admitted += 1;
        } else {
            rejected += 1;
        }
    }

    info!(admitted, rejected, "Simulation finished");
    println!(
        "{}",
        json!({ "policy": policy, "key": key, "callers": callers, "admitted": admitted, "rejected": rejected })
    );
    Ok(())
}
