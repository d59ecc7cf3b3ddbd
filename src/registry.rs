use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::digits::{infer_decimals, last_digit};
use crate::engine::{EngineEvent, StreakPatternEngine};
use crate::error::CoreError;
use crate::stats::TickStatsTracker;
use crate::types::{EngineMode, MarketEvent, MarketSpec};

/// Smallest accepted rolling-window capacity.
pub const MIN_WINDOW: usize = 10;
/// Largest accepted rolling-window capacity.
pub const MAX_WINDOW: usize = 5000;

/// Whether a strategy symbol switch clears the pattern counter.
///
/// The prototypes disagreed on this; it is an explicit policy here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCountPolicy {
    ResetOnSwitch,
    KeepAcrossSwitch,
}

struct MarketEntry {
    decimals: Option<i32>,
    tracker: TickStatsTracker,
    engine: Option<StreakPatternEngine>,
}

/// Session-scoped context owning all per-symbol state.
///
/// Replaces the original's module-level symbol maps: one registry per
/// session, passed explicitly. Each symbol has its own rolling window and,
/// while a strategy runs on it, its own streak engine; nothing is shared
/// across symbols. Processing is synchronous, one tick at a time, and
/// reconfiguration only ever happens between ticks.
pub struct MarketRegistry {
    window_capacity: usize,
    min_length: usize,
    count_policy: PatternCountPolicy,
    markets: HashMap<String, MarketEntry>,
}

impl MarketRegistry {
    pub fn new(window_capacity: usize, min_length: usize, count_policy: PatternCountPolicy) -> Self {
        Self {
            window_capacity: window_capacity.clamp(MIN_WINDOW, MAX_WINDOW),
            min_length: min_length.max(1),
            count_policy,
            markets: HashMap::new(),
        }
    }

    /// Pre-register a market with its configured precision, if any.
    pub fn add_market(&mut self, spec: &MarketSpec) {
        let capacity = self.window_capacity;
        let entry = self
            .markets
            .entry(spec.symbol.clone())
            .or_insert_with(|| MarketEntry {
                decimals: None,
                tracker: TickStatsTracker::new(capacity),
                engine: None,
            });
        if spec.decimals.is_some() {
            entry.decimals = spec.decimals;
        }
    }

    fn entry_mut(&mut self, symbol: &str) -> &mut MarketEntry {
        let capacity = self.window_capacity;
        self.markets
            .entry(symbol.to_string())
            .or_insert_with(|| MarketEntry {
                decimals: None,
                tracker: TickStatsTracker::new(capacity),
                engine: None,
            })
    }

    /// Bulk-seed a symbol's window from tick history, oldest to newest.
    ///
    /// Processed as an ordered observe sequence, so capacity eviction applies
    /// when the history is longer than the window. History never reaches the
    /// streak engine; only live ticks do. Prices whose digit cannot be read
    /// are skipped, the same way the feed drops unparseable quotes, so one
    /// bad entry never discards the rest of the batch. A single stats event
    /// is emitted for the whole batch.
    pub fn on_history_loaded(
        &mut self,
        symbol: &str,
        prices: &[Decimal],
    ) -> Result<Vec<MarketEvent>, CoreError> {
        let entry = self.entry_mut(symbol);
        if entry.decimals.is_none() {
            if let Some(first) = prices.first() {
                let inferred = infer_decimals(first);
                debug!(symbol, decimals = inferred, "inferred precision from history");
                entry.decimals = Some(inferred);
            }
        }
        let decimals = entry.decimals.unwrap_or(2);
        for price in prices {
            let digit = match last_digit(*price, decimals) {
                Ok(d) => d,
                Err(e) => {
                    warn!(symbol, "history price {price} skipped: {e}");
                    continue;
                }
            };
            entry.tracker.observe(digit)?;
        }
        if prices.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![MarketEvent::StatsUpdated {
            symbol: symbol.to_string(),
            frequencies: entry.tracker.frequencies(),
            extremes: entry.tracker.extremes(),
        }])
    }

    /// Process one live tick: extract the last digit, update the rolling
    /// window, and feed the symbol's engine when a strategy is running.
    ///
    /// Returns the emitted events in order. Extraction failures surface to
    /// the caller, which decides whether to skip the tick or drop the
    /// subscription.
    pub fn on_tick(&mut self, symbol: &str, price: Decimal) -> Result<Vec<MarketEvent>, CoreError> {
        let entry = self.entry_mut(symbol);
        let decimals = match entry.decimals {
            Some(d) => d,
            None => {
                let inferred = infer_decimals(&price);
                entry.decimals = Some(inferred);
                inferred
            }
        };
        let digit = last_digit(price, decimals)?;
        entry.tracker.observe(digit)?;

        let mut events = vec![MarketEvent::StatsUpdated {
            symbol: symbol.to_string(),
            frequencies: entry.tracker.frequencies(),
            extremes: entry.tracker.extremes(),
        }];

        if let Some(engine) = entry.engine.as_mut() {
            match engine.process(digit)? {
                Some(EngineEvent::Pattern(p)) => events.push(MarketEvent::Pattern(p)),
                Some(EngineEvent::Outcome(o)) => events.push(MarketEvent::Outcome(o)),
                None => {}
            }
        }
        Ok(events)
    }

    /// Arm a strategy on a symbol. Any prior run state on that symbol is
    /// cleared; the pattern counter survives or resets per the configured
    /// policy.
    pub fn start_strategy(&mut self, symbol: &str, mode: EngineMode) {
        let min_length = self.min_length;
        let count_policy = self.count_policy;
        let entry = self.entry_mut(symbol);
        let carried = match count_policy {
            PatternCountPolicy::KeepAcrossSwitch => entry
                .engine
                .as_ref()
                .map(|e| e.pattern_count())
                .unwrap_or(0),
            PatternCountPolicy::ResetOnSwitch => 0,
        };
        match entry.engine.as_mut() {
            Some(engine) if engine.mode() == mode => {
                engine.reset_run();
                if count_policy == PatternCountPolicy::ResetOnSwitch {
                    engine.reset_pattern_count();
                }
            }
            _ => {
                entry.engine = Some(
                    StreakPatternEngine::new(symbol, mode, min_length)
                        .with_pattern_count(carried),
                );
            }
        }
        info!(symbol, ?mode, "strategy started");
    }

    /// Stop the strategy on a symbol, clearing its run state.
    pub fn stop_strategy(&mut self, symbol: &str) {
        if let Some(entry) = self.markets.get_mut(symbol) {
            if let Some(engine) = entry.engine.as_mut() {
                engine.reset_run();
            }
        }
        info!(symbol, "strategy stopped");
    }

    /// Clear the live-mode guard after the external trade resolved.
    pub fn release_guard(&mut self, symbol: &str) {
        if let Some(engine) = self.engine_mut(symbol) {
            engine.release_guard();
        }
    }

    pub fn is_armed(&self, symbol: &str) -> bool {
        self.markets
            .get(symbol)
            .and_then(|e| e.engine.as_ref())
            .is_some_and(|e| e.is_armed())
    }

    pub fn pattern_count(&self, symbol: &str) -> u64 {
        self.markets
            .get(symbol)
            .and_then(|e| e.engine.as_ref())
            .map(|e| e.pattern_count())
            .unwrap_or(0)
    }

    /// Resize every symbol's rolling window. Applied between ticks, so a
    /// single observe never sees two capacities.
    pub fn set_window_capacity(&mut self, capacity: usize) {
        self.window_capacity = capacity.clamp(MIN_WINDOW, MAX_WINDOW);
        for entry in self.markets.values_mut() {
            entry.tracker.set_capacity(self.window_capacity);
        }
    }

    /// Update the minimum streak length on every running engine.
    pub fn set_min_length(&mut self, min_length: usize) {
        self.min_length = min_length.max(1);
        for entry in self.markets.values_mut() {
            if let Some(engine) = entry.engine.as_mut() {
                engine.set_min_length(self.min_length);
            }
        }
    }

    pub fn window_len(&self, symbol: &str) -> usize {
        self.markets.get(symbol).map(|e| e.tracker.len()).unwrap_or(0)
    }

    pub fn decimals(&self, symbol: &str) -> Option<i32> {
        self.markets.get(symbol).and_then(|e| e.decimals)
    }

    fn engine_mut(&mut self, symbol: &str) -> Option<&mut StreakPatternEngine> {
        self.markets.get_mut(symbol).and_then(|e| e.engine.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternEvent;
    use rust_decimal_macros::dec;

    fn registry() -> MarketRegistry {
        MarketRegistry::new(100, 2, PatternCountPolicy::ResetOnSwitch)
    }

    fn spec(symbol: &str, decimals: Option<i32>) -> MarketSpec {
        MarketSpec {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn history_seeds_window_with_eviction() {
        let mut r = MarketRegistry::new(10, 2, PatternCountPolicy::ResetOnSwitch);
        r.add_market(&spec("R_10", Some(3)));
        let prices: Vec<Decimal> = (0..25).map(|i| dec!(6000.000) + Decimal::from(i)).collect();
        let events = r.on_history_loaded("R_10", &prices).unwrap();
        assert_eq!(r.window_len("R_10"), 10);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MarketEvent::StatsUpdated { .. }));
    }

    #[test]
    fn history_does_not_reach_engine() {
        let mut r = registry();
        r.add_market(&spec("R_10", Some(1)));
        r.start_strategy("R_10", EngineMode::Scoring);
        // 0, 1, 5 as last digits would be a pattern if this were live ticks.
        let prices = vec![dec!(100.0), dec!(100.1), dec!(100.5)];
        let events = r.on_history_loaded("R_10", &prices).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(r.pattern_count("R_10"), 0);
    }

    #[test]
    fn tick_feeds_engine_only_while_running() {
        let mut r = registry();
        r.add_market(&spec("R_25", Some(1)));
        // No strategy yet: stats only.
        let events = r.on_tick("R_25", dec!(100.0)).unwrap();
        assert_eq!(events.len(), 1);

        r.start_strategy("R_25", EngineMode::Scoring);
        for price in [dec!(100.0), dec!(100.1)] {
            r.on_tick("R_25", price).unwrap();
        }
        let events = r.on_tick("R_25", dec!(100.7)).unwrap();
        let pattern = events.iter().find_map(|e| match e {
            MarketEvent::Pattern(p) => Some(p.clone()),
            _ => None,
        });
        let expected = PatternEvent {
            symbol: "R_25".to_string(),
            streak: vec![0, 1],
            break_digit: 7,
        };
        assert_eq!(pattern, Some(expected));
    }

    #[test]
    fn decimals_inferred_from_first_quote() {
        let mut r = registry();
        let events = r.on_tick("R_50", dec!(100.2)).unwrap();
        assert_eq!(r.decimals("R_50"), Some(1));
        match &events[0] {
            MarketEvent::StatsUpdated { frequencies, .. } => {
                // Last digit of 100.2 at 1 decimal is 2.
                assert_eq!(frequencies.unwrap()[2], 100.0);
            }
            other => panic!("expected stats, got {other:?}"),
        }
    }

    #[test]
    fn guard_released_through_registry() {
        let mut r = registry();
        r.add_market(&spec("R_75", Some(1)));
        r.start_strategy("R_75", EngineMode::Live);
        for price in [dec!(10.0), dec!(10.1), dec!(10.9)] {
            r.on_tick("R_75", price).unwrap();
        }
        assert!(r.is_armed("R_75"));
        // Armed: ticks are dropped by the engine.
        let events = r.on_tick("R_75", dec!(10.5)).unwrap();
        assert_eq!(events.len(), 1); // stats only
        r.release_guard("R_75");
        assert!(!r.is_armed("R_75"));
    }

    #[test]
    fn restart_resets_count_per_policy() {
        let mut r = registry();
        r.add_market(&spec("R_100", Some(1)));
        r.start_strategy("R_100", EngineMode::Scoring);
        for price in [dec!(1.0), dec!(1.1), dec!(1.8), dec!(1.3)] {
            r.on_tick("R_100", price).unwrap();
        }
        assert_eq!(r.pattern_count("R_100"), 1);
        r.start_strategy("R_100", EngineMode::Scoring);
        assert_eq!(r.pattern_count("R_100"), 0);

        let mut r = MarketRegistry::new(100, 2, PatternCountPolicy::KeepAcrossSwitch);
        r.add_market(&spec("R_100", Some(1)));
        r.start_strategy("R_100", EngineMode::Scoring);
        for price in [dec!(1.0), dec!(1.1), dec!(1.8), dec!(1.3)] {
            r.on_tick("R_100", price).unwrap();
        }
        r.start_strategy("R_100", EngineMode::Scoring);
        assert_eq!(r.pattern_count("R_100"), 1);
    }

    #[test]
    fn mode_switch_keeps_count_under_keep_policy() {
        let mut r = MarketRegistry::new(100, 2, PatternCountPolicy::KeepAcrossSwitch);
        r.add_market(&spec("R_100", Some(1)));
        r.start_strategy("R_100", EngineMode::Scoring);
        for price in [dec!(1.0), dec!(1.1), dec!(1.8), dec!(1.3)] {
            r.on_tick("R_100", price).unwrap();
        }
        assert_eq!(r.pattern_count("R_100"), 1);
        // Restarting in a different mode replaces the engine; the counter
        // still carries over under this policy.
        r.start_strategy("R_100", EngineMode::Live);
        assert_eq!(r.pattern_count("R_100"), 1);

        let mut r = registry();
        r.add_market(&spec("R_100", Some(1)));
        r.start_strategy("R_100", EngineMode::Scoring);
        for price in [dec!(1.0), dec!(1.1), dec!(1.8), dec!(1.3)] {
            r.on_tick("R_100", price).unwrap();
        }
        r.start_strategy("R_100", EngineMode::Live);
        assert_eq!(r.pattern_count("R_100"), 0);
    }

    #[test]
    fn history_skips_unreadable_prices() {
        let mut r = registry();
        // At 28 decimals Decimal::MAX cannot be padded to full scale, so its
        // digit is unreadable; the neighbors still seed the window.
        r.add_market(&spec("R_10", Some(28)));
        let prices = vec![dec!(1.5), Decimal::MAX, dec!(2.5)];
        let events = r.on_history_loaded("R_10", &prices).unwrap();
        assert_eq!(r.window_len("R_10"), 2);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn window_capacity_is_clamped_and_applied() {
        let mut r = registry();
        r.add_market(&spec("R_10", Some(1)));
        for i in 0..50 {
            r.on_tick("R_10", dec!(5.0) + Decimal::new(i, 1)).unwrap();
        }
        r.set_window_capacity(5);
        assert_eq!(r.window_len("R_10"), MIN_WINDOW.min(50));
    }
}
