use std::time::Duration;

use clap::Parser;
use harbor_core::AccountId;
use rand::Rng;
use tokio::time;

use harbor_keeper::{create_example_config, Keeper, KeeperConfig};

#[derive(Parser, Debug)]
#[command(name = "harbor-keeper")]
#[command(about = "Harbor pool rebase, queue upkeep and distribution service")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: String,

    /// Write an example configuration file to the config path and exit
    #[arg(long)]
    init: bool,

    /// Update interval in seconds
    #[arg(short, long, default_value = "30")]
    interval: u64,

    /// Dry run mode - report pending changes but don't commit updates
    #[arg(long)]
    dry_run: bool,

    /// Simulate demo depositor traffic each cycle
    #[arg(long)]
    simulate: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    if args.init {
        create_example_config(&args.config)?;
        log::info!("Wrote example configuration to {}", args.config);
        return Ok(());
    }

    log::info!("Starting Harbor keeper");
    log::info!("Update interval: {}s", args.interval);
    if args.dry_run {
        log::warn!("Running in DRY RUN mode - no updates will be committed");
    }

    let config = KeeperConfig::load(&args.config)?;
    log::info!(
        "Loaded configuration with {} strategies",
        config.strategies.len()
    );

    let mut keeper = Keeper::new(config, args.dry_run)?;
    log::info!("Keeper initialized successfully");

    let mut interval_timer = time::interval(Duration::from_secs(args.interval));
    let mut iteration = 0u64;

    loop {
        interval_timer.tick().await;
        iteration += 1;
        log::debug!("Starting keeper iteration {}", iteration);

        if args.simulate {
            simulate_traffic(&mut keeper, iteration);
            keeper.simulate_yield();
        }

        match keeper.run_cycle() {
            Ok(outcome) => {
                if outcome == Default::default() {
                    log::debug!("Iteration {}: nothing to do", iteration);
                } else {
                    log::info!(
                        "Iteration {}: net={} fees={} withdrawals={} placed={} distributed={}",
                        iteration,
                        outcome.rebase_net,
                        outcome.fee_shares_minted,
                        outcome.withdrawals_fulfilled,
                        outcome.queued_placed,
                        outcome.distributed
                    );
                }
            }
            Err(e) => {
                // keep running even if individual iterations fail
                log::error!("Error in keeper iteration {}: {}", iteration, e);
            }
        }

        if iteration % 100 == 0 {
            log::info!("Keeper health check - iteration {}", iteration);
            keeper.log_status();
        }
    }
}

/// Random demo deposits so a standalone run has something to rebase,
/// queue and distribute.
fn simulate_traffic(keeper: &mut Keeper, iteration: u64) {
    let mut rng = rand::thread_rng();
    let depositor = AccountId::from_low_u64(1000 + rng.gen_range(0..8));
    let amount: u64 = rng.gen_range(1_000_000..1_000_000_000);
    match keeper.pool_mut().deposit(depositor, amount, true) {
        Ok(receipt) => log::debug!(
            "iteration {}: simulated deposit {} (staked {}, queued {})",
            iteration,
            amount,
            receipt.staked,
            receipt.queued
        ),
        Err(e) => log::debug!("iteration {}: simulated deposit rejected: {}", iteration, e),
    }
}
