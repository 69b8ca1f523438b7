use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use polytrader_core::{Config, Side, TradeIntent, TradeRecord};
use polytrader_engine::{Ledger, SimulatedSubmitter, TradeExecutor};

const DEFAULT_CONFIG: &str = "config.toml";

/// polytrader — Polymarket trade executor with a CSV trade ledger
#[derive(Parser)]
#[command(name = "polytrader", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the TOML configuration file. Without one, settings come from
    /// the environment.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the dry-run setting from the config file.
    #[arg(short, long)]
    mode: Option<ModeArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single trade and record it in the ledger.
    Trade {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(long)]
        side: SideArg,

        /// Outcome token to trade.
        #[arg(long)]
        token_id: String,

        /// Limit price per share in USD.
        #[arg(long)]
        price: Decimal,

        /// Market slug the token belongs to.
        #[arg(long)]
        market: String,

        /// Free-text reason stored with the trade.
        #[arg(long, default_value = "")]
        reason: String,

        /// Print the resulting record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent ledger rows.
    History {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of rows to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Print the effective executor settings.
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// CLI-level execution mode, mapped onto `dry_run`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    DryRun,
    Live,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(arg: SideArg) -> Self {
        match arg {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually live in .env next to the binary
    dotenvy::dotenv().ok();

    // Initialise tracing with RUST_LOG env filter (default: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Trade {
            config,
            side,
            token_id,
            price,
            market,
            reason,
            json,
        } => {
            let intent = TradeIntent::new(side.into(), token_id, price, market, reason);
            trade(&config, intent, json).await
        }
        Commands::History { config, limit } => history(&config, limit),
        Commands::CheckConfig { config } => check_config(&config),
    }
}

/// Load the config file if one was given (or `config.toml` exists),
/// otherwise fall back to environment variables. Applies `--mode`.
fn load_config(args: &ConfigArgs) -> Result<Config> {
    let path = args
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));

    let mut config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::from_env().context("no config file found and environment incomplete")?,
    };

    if let Some(mode) = args.mode {
        config.trading.dry_run = matches!(mode, ModeArg::DryRun);
    }
    Ok(config)
}

async fn trade(args: &ConfigArgs, intent: TradeIntent, json: bool) -> Result<()> {
    let config = load_config(args)?;

    let submitter = SimulatedSubmitter::new(config.credentials.clone())
        .with_latency(Duration::from_millis(config.trading.submit_latency_ms));
    let executor = TradeExecutor::new(config.executor_config(), submitter);

    let record = executor
        .execute_trade(&intent)
        .await
        .context("trade resolved but could not be recorded")?;

    let Some(record) = record else {
        anyhow::bail!("trade not attempted: intent needs a token id and a positive price");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record, executor.ledger().path());
    }
    Ok(())
}

fn print_record(record: &TradeRecord, ledger: &Path) {
    println!("\n{} {} @ ${}", record.status, record.side, record.price);
    println!("  market:   {}", record.market_slug);
    println!("  token:    {}", record.token_id);
    println!("  quantity: {} | cost: ${}", record.quantity, record.total_cost.round_dp(2));
    if let Some(id) = &record.order_id {
        println!("  order id: {id}");
    }
    if let Some(err) = &record.error {
        println!("  error:    {err}");
    }
    println!("  saved to: {}\n", ledger.display());
}

fn history(args: &ConfigArgs, limit: usize) -> Result<()> {
    let config = load_config(args)?;
    let ledger = Ledger::new(config.trading.ledger_path);

    let entries = ledger
        .read_entries()
        .with_context(|| format!("failed to read ledger {}", ledger.path().display()))?;

    if entries.is_empty() {
        info!(path = %ledger.path().display(), "ledger is empty");
        return Ok(());
    }

    let skip = entries.len().saturating_sub(limit);
    println!(
        "\n{:<25} {:<5} {:>8} {:>6} {:>10} {:<8} {}",
        "Timestamp", "Side", "Price", "Qty", "Cost", "Status", "Market"
    );
    println!("{}", "-".repeat(100));
    for e in &entries[skip..] {
        println!(
            "{:<25} {:<5} {:>8} {:>6} {:>10} {:<8} {}",
            e.timestamp,
            e.side.to_string(),
            e.price.to_string(),
            e.quantity,
            e.total_cost.round_dp(2).to_string(),
            e.status.to_string(),
            e.market_slug,
        );
    }
    println!("\nShowing {} of {} trades.\n", entries.len() - skip, entries.len());

    Ok(())
}

fn check_config(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    let exec = config.executor_config();

    info!("========================================");
    info!("  polytrader — effective settings");
    info!("========================================");
    info!("dry run:        {}", exec.dry_run);
    info!("target spend:   ${}", exec.target_spend);
    info!("ledger:         {}", exec.ledger_path.display());
    info!("credentials:    {}", if exec.credentials_present { "present" } else { "missing" });
    if let Some(proxy) = config.credentials.as_ref().and_then(|c| c.proxy_address.as_ref()) {
        info!("proxy address:  {}", proxy);
    }
    info!("submit latency: {} ms", config.trading.submit_latency_ms);
    info!("========================================");

    if !exec.dry_run && !exec.credentials_present {
        warn!("live mode without POLY_PRIVATE_KEY: every order will fail");
    }
    Ok(())
}
