use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use depthx_rs::config::{Settings, SymbolScope};
use depthx_rs::engine::{Dataset, Engine, ListingStatus};
use depthx_rs::market_data::types::CanonicalSymbol;
use depthx_rs::telemetry;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    Intersection,
    Union,
}

impl From<ScopeArg> for SymbolScope {
    fn from(s: ScopeArg) -> Self {
        match s {
            ScopeArg::Intersection => SymbolScope::Intersection,
            ScopeArg::Union => SymbolScope::Union,
        }
    }
}

/// Collect order-book depth across derivatives venues and compare liquidity.
#[derive(Debug, Parser)]
#[command(name = "depthx", version)]
struct Cli {
    /// TOML configuration file; `DEPTHX__*` variables override it.
    #[arg(short, long, default_value = "depthx.toml")]
    config: PathBuf,

    /// Only these symbols, e.g. `BTC/USDT,ETH/USDT`.
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<CanonicalSymbol>,

    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Depth levels requested per side.
    #[arg(long)]
    levels: Option<usize>,

    /// Write the full dataset as JSON here.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Prometheus listener port (with the `metrics-exporter` feature).
    #[arg(long, default_value_t = 9000)]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);
    telemetry::init_metrics(cli.metrics_port);

    let mut settings = Settings::load(Some(cli.config.as_path()))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if !cli.symbols.is_empty() {
        settings.collection.symbols = cli.symbols.clone();
    }
    if let Some(scope) = cli.scope {
        settings.collection.scope = scope.into();
    }
    if let Some(levels) = cli.levels {
        settings.collection.levels = levels;
    }
    if settings.enabled_venues().next().is_none() {
        anyhow::bail!("no enabled venues in {}", cli.config.display());
    }

    let engine = Engine::from_settings(settings).context("building engine")?;
    let dataset = engine.run().await;

    if let Some(path) = &cli.output {
        dataset.write_json(path).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "dataset written");
    }
    print_summary(&dataset);
    Ok(())
}

fn print_summary(dataset: &Dataset) {
    println!("\n=== Venues ===");
    for v in &dataset.venue_stats {
        match &v.listing {
            ListingStatus::Available { symbols } => println!(
                "{:<10} listed {:>4}  fetched {:>3}/{:<3}  p50 {:>5}ms  p99 {:>5}ms",
                v.venue.as_str(),
                symbols,
                v.succeeded,
                v.requested,
                v.latency_p50_ms.map_or("-".to_string(), |ms| ms.to_string()),
                v.latency_p99_ms.map_or("-".to_string(), |ms| ms.to_string()),
            ),
            ListingStatus::Unavailable { error, .. } => println!("{:<10} unavailable: {error}", v.venue.as_str()),
        }
    }

    println!("\n=== Comparison ({} symbols) ===", dataset.comparison.len());
    println!("{:<14} {:<7} {:<10} {:>16} {:<10} {:>8}", "symbol", "risk", "best", "volume", "tightest", "bps");
    for row in &dataset.comparison {
        println!(
            "{:<14} {:<7} {:<10} {:>16.4} {:<10} {:>8}",
            row.symbol.to_string(),
            row.risk_tier.to_string(),
            row.best_liquidity.as_str(),
            row.best_liquidity_volume,
            row.tightest_spread.as_ref().map_or("-", |v| v.as_str()),
            row.tightest_spread_bps.map_or("-".to_string(), |b| format!("{b:.2}")),
        );
    }

    let failures: Vec<_> = dataset.failures().collect();
    if !failures.is_empty() {
        println!("\n=== Failures ({}) ===", failures.len());
        for f in failures {
            if let Some(failure) = f.outcome.failure() {
                println!(
                    "{:<10} {:<14} {:<18} after {} attempt(s): {}",
                    f.venue.as_str(),
                    f.symbol.to_string(),
                    f.outcome.label(),
                    failure.attempts,
                    failure.error
                );
            }
        }
    }
}
