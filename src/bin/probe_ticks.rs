//! Tick-stream probe: subscribe to one symbol and print each tick's price
//! and extracted last digit, with a digit histogram at the end.
//!
//! Useful for checking a market's quote precision and digit distribution
//! before pointing the strategy at it.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use deriv_digittrade::digits::{infer_decimals, last_digit};
use deriv_digittrade::feed::{self, FeedEvent};
use deriv_digittrade::{ws_url, DEFAULT_APP_ID};

#[derive(Parser)]
#[command(name = "probe_ticks", about = "Print a market's live digit stream")]
struct Args {
    /// Market symbol, e.g. R_100
    #[arg(long, default_value = "R_100")]
    symbol: String,

    /// How long to listen, in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Override the inferred decimal precision
    #[arg(long)]
    decimals: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("=== Tick probe: {} ({}s) ===", args.symbol, args.duration);

    let (feed_tx, mut feed_rx) = mpsc::unbounded_channel::<FeedEvent>();
    let session = feed::connect(&ws_url(DEFAULT_APP_ID), feed_tx).await?;
    session.subscribe_ticks(&args.symbol, 10)?;

    let start = Instant::now();
    let deadline = tokio::time::sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    let mut decimals = args.decimals;
    let mut histogram = [0u32; 10];
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = feed_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    FeedEvent::History { symbol, prices } => {
                        if symbol != args.symbol {
                            continue;
                        }
                        if decimals.is_none() {
                            decimals = prices.first().map(infer_decimals);
                        }
                        println!(
                            "history: {} price(s), precision {}",
                            prices.len(),
                            decimals.map_or("?".to_string(), |d| d.to_string()),
                        );
                    }
                    FeedEvent::Tick { symbol, price } => {
                        if symbol != args.symbol {
                            continue;
                        }
                        let dec = *decimals.get_or_insert_with(|| infer_decimals(&price));
                        match last_digit(price, dec) {
                            Ok(digit) => {
                                ticks += 1;
                                histogram[digit as usize] += 1;
                                println!(
                                    "[{:6.1}s] {price} -> {digit}",
                                    start.elapsed().as_secs_f64(),
                                );
                            }
                            Err(e) => println!("bad tick {price}: {e}"),
                        }
                    }
                    FeedEvent::Closed => {
                        eprintln!("feed closed");
                        break;
                    }
                }
            }
        }
    }

    println!();
    println!("=== Summary ===");
    println!("Ticks: {ticks}");
    if ticks > 0 {
        for (digit, count) in histogram.iter().enumerate() {
            let pct = 100.0 * *count as f64 / ticks as f64;
            println!("  {digit}: {count:4} ({pct:5.1}%)");
        }
    }
    Ok(())
}
