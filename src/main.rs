use airdrop_runner::{
    config::{discover_accounts, RunnerConfig},
    report::{self, RunSummary},
    trading::{sweep_all, CycleScheduler, Orchestrator, StopSignal},
    utils::logger,
    Result, RunPlan,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "airdrop-runner")]
#[command(about = "Automated airdrop-event participation across exchange accounts")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/runner.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file path
    #[arg(long, default_value = "logs/runner.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event cycles
    Run {
        /// Override the configured symbol list (comma separated)
        #[arg(long)]
        symbols: Option<String>,

        /// Override the configured cycle count
        #[arg(long)]
        cycles: Option<u32>,

        /// Override the configured worker-pool bound
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Sweep dust holdings once all cycles have completed
        #[arg(long)]
        sweep: bool,

        /// Write the run summary as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show per-account balances
    Balances,
    /// Validate configuration and credentials
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init(&cli.log_level, &cli.log_file)?;
    dotenv::dotenv().ok();

    info!("airdrop-runner v{}", airdrop_runner::VERSION);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            symbols,
            cycles,
            max_concurrency,
            sweep,
            report,
        } => run(config, symbols, cycles, max_concurrency, sweep, report).await,
        Commands::Balances => show_balances().await,
        Commands::Validate => validate(config),
    }
}

fn load_config(path: &PathBuf) -> Result<RunnerConfig> {
    if path.exists() {
        let config = RunnerConfig::from_file(path)?;
        info!("configuration loaded from {}", path.display());
        Ok(config)
    } else {
        info!(
            "no config file at {}, using defaults",
            path.display()
        );
        Ok(RunnerConfig::default())
    }
}

async fn run(
    mut config: RunnerConfig,
    symbols: Option<String>,
    cycles: Option<u32>,
    max_concurrency: Option<usize>,
    sweep: bool,
    report_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(symbols) = symbols {
        config.trading.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(cycles) = cycles {
        config.schedule.cycles = cycles;
    }
    if let Some(max_concurrency) = max_concurrency {
        config.execution.max_concurrency = max_concurrency;
    }
    if sweep {
        config.sweep.enabled = true;
    }
    config.validate()?;

    let accounts = discover_accounts();
    let plan = RunPlan::build(&config, accounts)?;
    info!(
        jobs = plan.jobs.len(),
        cycles = plan.cycle_count,
        "run plan built"
    );

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("stop requested, letting in-flight jobs finish");
                stop.trigger();
            }
        });
    }

    let orchestrator = Orchestrator::for_plan(&plan, stop.clone());
    let scheduler = CycleScheduler::new(stop);

    let summaries = scheduler.run(&plan, &orchestrator).await;

    if config.sweep.enabled && !summaries.is_empty() {
        let outcomes = sweep_all(
            orchestrator.clients(),
            &config.sweep,
            plan.max_concurrency,
        )
        .await;
        for outcome in &outcomes {
            println!(
                "[{}] swept: {:?}  failed: {:?}",
                outcome.account_id, outcome.swept, outcome.failed
            );
        }
    }

    let summary = report::summarize_run(&summaries);
    render_summary(&summary);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)?;
        info!("report written to {}", path.display());
    }

    Ok(())
}

fn render_summary(summary: &RunSummary) {
    println!("\n=== Run summary ===");
    println!(
        "cycles: {}  jobs: {}  success: {}  failure: {}",
        summary.cycle_count, summary.total, summary.success, summary.failure
    );

    if !summary.by_symbol.is_empty() {
        println!("\nPer symbol:");
        for (symbol, outcome) in &summary.by_symbol {
            println!(
                "  {:<8} success: {:<4} failure: {}",
                symbol, outcome.success, outcome.failure
            );
        }
    }

    for cycle in &summary.cycles {
        println!("\nCycle {}:", cycle.cycle + 1);
        for result in &cycle.results {
            match &result.error {
                None => println!(
                    "  OK   {}/{} ({} attempts, {:.1}s)",
                    result.account_id, result.symbol, result.attempts, result.elapsed_secs
                ),
                Some(err) => println!(
                    "  FAIL {}/{} [{}] {}",
                    result.account_id,
                    result.symbol,
                    err.kind(),
                    err
                ),
            }
        }
    }
}

async fn show_balances() -> Result<()> {
    let accounts = discover_accounts();
    if accounts.is_empty() {
        error!("no accounts configured; add numbered API keys to .env");
        return Ok(());
    }

    for account in &accounts {
        let client = airdrop_runner::exchanges::ClientFactory::create(account);
        println!("\n[{}] ({})", account.id, account.exchange);
        match client.get_all_balances().await {
            Ok(balances) => {
                let krw = balances.get("KRW").map(|b| b.free).unwrap_or(0.0);
                println!("  KRW: {:.0}", krw);
                for (currency, balance) in &balances {
                    if currency == "KRW" {
                        continue;
                    }
                    match client.get_last_price(currency).await {
                        Ok(price) => println!(
                            "  {}: {:.8} (~{:.0} KRW)",
                            currency,
                            balance.total(),
                            balance.total() * price
                        ),
                        Err(_) => println!("  {}: {:.8}", currency, balance.total()),
                    }
                }
            }
            Err(e) => error!(account = %account.id, error = %e, "balance lookup failed"),
        }
    }

    Ok(())
}

fn validate(config: RunnerConfig) -> Result<()> {
    config.validate()?;
    println!("Configuration is valid");

    let accounts = discover_accounts();
    println!("Accounts discovered: {}", accounts.len());
    for account in &accounts {
        println!("  - {} ({})", account.id, account.exchange);
    }
    if accounts.is_empty() {
        println!("Warning: no accounts found; a run would fail to build its plan");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }
}
