use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tradable market: symbol plus its fixed decimal precision for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSpec {
    /// Display name, e.g. "Volatility 100 Index".
    pub name: String,
    /// Venue symbol, e.g. "R_100".
    pub symbol: String,
    /// Decimal precision of quotes. Inferred from history when absent.
    pub decimals: Option<i32>,
}

/// How the streak engine reacts to a detected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    /// Paper mode: the digit after the break classifies a simulated outcome.
    Scoring,
    /// Live mode: a pattern fires external execution and arms a guard that
    /// drops incoming digits until the trade resolves.
    Live,
}

/// A qualifying 0/1 streak broken by another digit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEvent {
    pub symbol: String,
    /// The consecutive 0/1 digits that formed the run, in arrival order.
    pub streak: Vec<u8>,
    /// The digit that terminated the run.
    pub break_digit: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
}

/// Scoring-mode classification of the digit following a pattern break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub pattern: PatternEvent,
    /// The digit immediately following the break.
    pub follow_digit: u8,
    pub result: TradeResult,
    /// +2 on a win, -10 on a loss.
    pub points_delta: i64,
}

/// Most/least frequent digit sets over the current window. Ties included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extremes {
    pub most: Vec<u8>,
    pub least: Vec<u8>,
}

/// Event emitted by the registry while processing a tick or history batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MarketEvent {
    /// Display/telemetry update after an observation. Carries derived data
    /// only; engine correctness never depends on it.
    StatsUpdated {
        symbol: String,
        /// Percentage per digit 0-9, one decimal place. `None` while empty.
        frequencies: Option<[f64; 10]>,
        extremes: Extremes,
    },
    Pattern(PatternEvent),
    Outcome(TradeOutcome),
}

/// Result of one settled live contract.
#[derive(Debug, Clone, Serialize)]
pub struct ContractResult {
    pub contract_id: u64,
    pub buy_price: f64,
    pub profit: f64,
    pub won: bool,
    pub exit_tick: Option<Decimal>,
}
