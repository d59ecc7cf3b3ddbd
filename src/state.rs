use serde::Serialize;

use crate::types::{ContractResult, EngineMode, PatternEvent, TradeOutcome, TradeResult};

/// One completed trade, simulated or live.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub timestamp: String,
    pub symbol: String,
    /// The 0/1 run as a compact digit string, e.g. "0110".
    pub streak: String,
    pub break_digit: u8,
    pub result: TradeResult,
    /// Scoring mode: the digit that decided the outcome.
    pub follow_digit: Option<u8>,
    /// Scoring mode: points after applying the delta.
    pub points_after: Option<i64>,
    /// Live mode: settled profit.
    pub profit: Option<f64>,
}

/// Session totals reported on shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub mode: EngineMode,
    pub symbol: String,
    pub patterns_detected: u64,
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub failed: u64,
    pub initial_points: i64,
    pub final_points: i64,
    pub starting_balance: Option<f64>,
    pub final_balance: Option<f64>,
    pub total_profit: f64,
    pub trade_log: Vec<TradeRecord>,
}

/// Bookkeeping for one strategy run: points ledger in scoring mode, balance
/// and settled profit in live mode, plus the trade log either way.
pub struct StrategySession {
    mode: EngineMode,
    symbol: String,
    initial_points: i64,
    points: i64,
    wins: u64,
    losses: u64,
    failed: u64,
    total_profit: f64,
    pub starting_balance: Option<f64>,
    pub balance: Option<f64>,
    trade_log: Vec<TradeRecord>,
}

fn streak_string(pattern: &PatternEvent) -> String {
    pattern.streak.iter().map(|d| d.to_string()).collect()
}

impl StrategySession {
    pub fn new(mode: EngineMode, symbol: impl Into<String>, starting_points: i64) -> Self {
        Self {
            mode,
            symbol: symbol.into(),
            initial_points: starting_points,
            points: starting_points,
            wins: 0,
            losses: 0,
            failed: 0,
            total_profit: 0.0,
            starting_balance: None,
            balance: None,
            trade_log: Vec::new(),
        }
    }

    /// Apply a scoring-mode outcome, returning the points total after it.
    pub fn apply_outcome(&mut self, outcome: &TradeOutcome) -> i64 {
        self.points += outcome.points_delta;
        match outcome.result {
            TradeResult::Win => self.wins += 1,
            TradeResult::Loss => self.losses += 1,
        }
        self.trade_log.push(TradeRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            symbol: outcome.pattern.symbol.clone(),
            streak: streak_string(&outcome.pattern),
            break_digit: outcome.pattern.break_digit,
            result: outcome.result,
            follow_digit: Some(outcome.follow_digit),
            points_after: Some(self.points),
            profit: None,
        });
        self.points
    }

    /// Apply a settled live contract.
    pub fn apply_contract(&mut self, pattern: &PatternEvent, contract: &ContractResult) {
        let result = if contract.won {
            self.wins += 1;
            TradeResult::Win
        } else {
            self.losses += 1;
            TradeResult::Loss
        };
        self.total_profit += contract.profit;
        self.trade_log.push(TradeRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            symbol: pattern.symbol.clone(),
            streak: streak_string(pattern),
            break_digit: pattern.break_digit,
            result,
            follow_digit: None,
            points_after: None,
            profit: Some(contract.profit),
        });
    }

    /// Record a live submission that never settled. Not counted as a loss;
    /// no stake was necessarily committed.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn trades(&self) -> u64 {
        self.wins + self.losses
    }

    pub fn summary(&self, patterns_detected: u64) -> SessionSummary {
        SessionSummary {
            mode: self.mode,
            symbol: self.symbol.clone(),
            patterns_detected,
            trades: self.trades(),
            wins: self.wins,
            losses: self.losses,
            failed: self.failed,
            initial_points: self.initial_points,
            final_points: self.points,
            starting_balance: self.starting_balance,
            final_balance: self.balance,
            total_profit: self.total_profit,
            trade_log: self.trade_log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> PatternEvent {
        PatternEvent {
            symbol: "R_100".to_string(),
            streak: vec![0, 1, 1],
            break_digit: 7,
        }
    }

    fn outcome(follow: u8) -> TradeOutcome {
        let won = follow >= 2;
        TradeOutcome {
            pattern: pattern(),
            follow_digit: follow,
            result: if won { TradeResult::Win } else { TradeResult::Loss },
            points_delta: if won { 2 } else { -10 },
        }
    }

    #[test]
    fn points_ledger_tracks_wins_and_losses() {
        let mut s = StrategySession::new(EngineMode::Scoring, "R_100", 100);
        assert_eq!(s.apply_outcome(&outcome(7)), 102);
        assert_eq!(s.apply_outcome(&outcome(1)), 92);
        assert_eq!(s.apply_outcome(&outcome(0)), 82);
        let summary = s.summary(3);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 2);
        assert_eq!(summary.initial_points, 100);
        assert_eq!(summary.final_points, 82);
        assert_eq!(summary.trade_log.len(), 3);
        assert_eq!(summary.trade_log[0].streak, "011");
    }

    #[test]
    fn live_contracts_accumulate_profit() {
        let mut s = StrategySession::new(EngineMode::Live, "R_100", 0);
        s.apply_contract(
            &pattern(),
            &ContractResult {
                contract_id: 1,
                buy_price: 0.5,
                profit: 0.41,
                won: true,
                exit_tick: None,
            },
        );
        s.apply_contract(
            &pattern(),
            &ContractResult {
                contract_id: 2,
                buy_price: 0.5,
                profit: -0.5,
                won: false,
                exit_tick: None,
            },
        );
        s.record_failure();
        let summary = s.summary(3);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.failed, 1);
        assert!((summary.total_profit - (-0.09)).abs() < 1e-9);
    }
}
