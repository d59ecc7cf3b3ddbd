use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use deriv_digittrade::config::{AppConfig, CONFIG_PATH, MIN_STAKE};
use deriv_digittrade::error::CoreError;
use deriv_digittrade::executor::TradeExecutor;
use deriv_digittrade::feed::{self, FeedEvent};
use deriv_digittrade::registry::{MarketRegistry, PatternCountPolicy};
use deriv_digittrade::reporter;
use deriv_digittrade::state::StrategySession;
use deriv_digittrade::types::{ContractResult, EngineMode, MarketEvent, PatternEvent};
use deriv_digittrade::ws_url;

#[derive(Parser)]
#[command(name = "digittrade", about = "Last-digit streak strategy runner")]
struct Args {
    /// Run the scoring (paper) strategy — no real contracts placed
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Run the live strategy (places real contracts)
    #[arg(long, conflicts_with = "dry_run")]
    live: bool,

    /// Market symbol to run the strategy on, e.g. R_100
    #[arg(long)]
    symbol: String,

    /// Rolling-window size override (10-5000)
    #[arg(long)]
    window: Option<usize>,

    /// Minimum 0/1 streak length override
    #[arg(long)]
    min_streak: Option<usize>,

    /// Stake per live contract override
    #[arg(long)]
    stake: Option<f64>,
}

type ExecDone = (PatternEvent, Result<ContractResult, CoreError>, Option<f64>);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if !args.dry_run && !args.live {
        anyhow::bail!("Must specify either --dry-run or --live");
    }
    if let Some(stake) = args.stake {
        if stake < MIN_STAKE {
            anyhow::bail!("--stake must be at least {MIN_STAKE}");
        }
    }

    let config_path = Path::new(CONFIG_PATH);
    let mut config = AppConfig::load(config_path)?;
    info!("Loaded config from {}", config_path.display());
    if let Some(window) = args.window {
        config.settings.window_size = window;
    }
    if let Some(min_streak) = args.min_streak {
        config.settings.min_streak_length = min_streak;
    }
    if let Some(stake) = args.stake {
        config.settings.stake = stake;
    }
    config.validate()?;

    if !config.markets.iter().any(|m| m.symbol == args.symbol) {
        anyhow::bail!("symbol {} is not in the configured market list", args.symbol);
    }

    let mode = if args.live {
        EngineMode::Live
    } else {
        EngineMode::Scoring
    };
    info!(
        "Starting digittrade ({}) — symbol={} window={} min_streak={} stake={}",
        if args.live { "live" } else { "dry-run" },
        args.symbol,
        config.settings.window_size,
        config.settings.min_streak_length,
        config.settings.stake,
    );

    let policy = if config.settings.reset_pattern_count_on_switch {
        PatternCountPolicy::ResetOnSwitch
    } else {
        PatternCountPolicy::KeepAcrossSwitch
    };
    let mut registry = MarketRegistry::new(
        config.settings.window_size,
        config.settings.min_streak_length,
        policy,
    );
    for market in &config.markets {
        registry.add_market(market);
    }

    let (feed_tx, mut feed_rx) = mpsc::unbounded_channel::<FeedEvent>();
    let session = feed::connect(&ws_url(config.account.app_id), feed_tx).await?;

    info!("Authorizing...");
    let auth = session.authorize(&config.account.api_token).await?;
    let currency = auth["currency"].as_str().unwrap_or("USD").to_string();
    info!(
        "Authorized — account {} ({currency})",
        auth["loginid"].as_str().unwrap_or("?"),
    );

    let mut state = StrategySession::new(
        mode,
        args.symbol.clone(),
        config.settings.starting_points,
    );

    let executor = if args.live {
        let (balance, bal_currency) = session.balance().await?;
        info!("Account balance: {balance:.2} {bal_currency}");
        state.starting_balance = Some(balance);
        state.balance = Some(balance);
        Some(Arc::new(TradeExecutor::new(
            session.clone(),
            config.settings.stake,
            currency.clone(),
        )))
    } else {
        None
    };

    for market in &config.markets {
        session.subscribe_ticks(&market.symbol, config.settings.window_size)?;
    }
    info!("Subscribed to {} market(s)", config.markets.len());

    registry.start_strategy(&args.symbol, mode);

    let (exec_tx, mut exec_rx) = mpsc::unbounded_channel::<ExecDone>();

    info!("Entering tick loop. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            Some((pattern, result, balance)) = exec_rx.recv() => {
                handle_execution_done(&mut registry, &mut state, pattern, result, balance);
            }
            event = feed_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    FeedEvent::History { symbol, prices } => {
                        match registry.on_history_loaded(&symbol, &prices) {
                            Ok(events) => {
                                info!("{symbol}: window seeded with {} tick(s)", registry.window_len(&symbol));
                                for event in &events {
                                    log_stats(event);
                                }
                            }
                            Err(e) => warn!("{symbol}: history rejected: {e}"),
                        }
                    }
                    FeedEvent::Tick { symbol, price } => {
                        match registry.on_tick(&symbol, price) {
                            Ok(events) => {
                                handle_market_events(&registry, &mut state, executor.as_ref(), &exec_tx, events);
                            }
                            // Skip the tick; the window and engine are untouched.
                            Err(e) => warn!("{symbol}: tick {price} skipped: {e}"),
                        }
                    }
                    FeedEvent::Closed => {
                        warn!("Market feed closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    let summary = state.summary(registry.pattern_count(&args.symbol));
    reporter::report_exit_summary(&summary);
    Ok(())
}

fn handle_market_events(
    registry: &MarketRegistry,
    state: &mut StrategySession,
    executor: Option<&Arc<TradeExecutor>>,
    exec_tx: &mpsc::UnboundedSender<ExecDone>,
    events: Vec<MarketEvent>,
) {
    for event in events {
        match event {
            MarketEvent::StatsUpdated { .. } => log_stats(&event),
            MarketEvent::Pattern(pattern) => {
                let count = registry.pattern_count(&pattern.symbol);
                info!(
                    "{}: pattern #{count} — {:?} broken by {}",
                    pattern.symbol, pattern.streak, pattern.break_digit,
                );
                reporter::report_pattern(&pattern, count);
                if let Some(executor) = executor {
                    let executor = Arc::clone(executor);
                    let exec_tx = exec_tx.clone();
                    tokio::spawn(async move {
                        let result = executor.execute(&pattern).await;
                        // Refresh the balance here, off the tick loop, so a
                        // slow venue response never stalls stats processing.
                        let balance = match &result {
                            Ok(_) => match executor.balance().await {
                                Ok(b) => Some(b),
                                Err(e) => {
                                    warn!("balance refresh failed: {e}");
                                    None
                                }
                            },
                            Err(_) => None,
                        };
                        let _ = exec_tx.send((pattern, result, balance));
                    });
                }
            }
            MarketEvent::Outcome(outcome) => {
                let points = state.apply_outcome(&outcome);
                info!(
                    "{}: simulated trade {:?} on digit {} — points now {points}",
                    outcome.pattern.symbol, outcome.result, outcome.follow_digit,
                );
                reporter::report_outcome(&outcome, points);
            }
        }
    }
}

/// Finish a live trade: record the result and release the engine guard so
/// the next pattern may fire. The balance was refreshed by the executor
/// task, so nothing here awaits the venue. No automatic retry.
fn handle_execution_done(
    registry: &mut MarketRegistry,
    state: &mut StrategySession,
    pattern: PatternEvent,
    result: Result<ContractResult, CoreError>,
    balance: Option<f64>,
) {
    match result {
        Ok(contract) => {
            if balance.is_some() {
                state.balance = balance;
            }
            state.apply_contract(&pattern, &contract);
            reporter::report_contract(&contract, state.balance);
        }
        Err(e) => {
            warn!("{}: trade execution failed: {e}", pattern.symbol);
            state.record_failure();
        }
    }
    registry.release_guard(&pattern.symbol);
}

fn log_stats(event: &MarketEvent) {
    if let MarketEvent::StatsUpdated {
        symbol,
        frequencies,
        extremes,
    } = event
    {
        match frequencies {
            Some(freq) => debug!(
                %symbol,
                most = ?extremes.most,
                least = ?extremes.least,
                frequencies = ?freq,
                "stats updated",
            ),
            None => debug!(%symbol, "stats updated (empty window)"),
        }
    }
}
