use tracing::debug;

use crate::error::CoreError;
use crate::types::{EngineMode, PatternEvent, TradeOutcome, TradeResult};

/// Minimum consecutive 0/1 digits before a break counts as a pattern.
pub const DEFAULT_MIN_LENGTH: usize = 2;

/// Points awarded in scoring mode for a winning outcome digit (>= 2).
const WIN_POINTS: i64 = 2;
/// Points deducted in scoring mode for a losing outcome digit (0 or 1).
const LOSS_POINTS: i64 = -10;

#[derive(Debug, Clone)]
enum Phase {
    /// Accumulating a 0/1 run, watching for the digit that breaks it.
    Scanning,
    /// A pattern fired; the next digit classifies the simulated outcome.
    AwaitingOutcome(PatternEvent),
}

/// Event produced by feeding one digit to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Pattern(PatternEvent),
    Outcome(TradeOutcome),
}

/// Per-symbol streak-detection state machine.
///
/// Watches the live digit stream for runs of {0,1} of at least `min_length`.
/// When a run is broken by any other digit a `Pattern` event fires. In
/// `Scoring` mode the following digit is then consumed to classify a
/// simulated outcome; in `Live` mode the engine arms a guard instead and
/// drops every digit until the caller reports that the external trade
/// resolved, so overlapping submissions for the same symbol are impossible.
#[derive(Debug, Clone)]
pub struct StreakPatternEngine {
    symbol: String,
    mode: EngineMode,
    min_length: usize,
    run: Vec<u8>,
    phase: Phase,
    armed: bool,
    pattern_count: u64,
}

impl StreakPatternEngine {
    pub fn new(symbol: impl Into<String>, mode: EngineMode, min_length: usize) -> Self {
        Self {
            symbol: symbol.into(),
            mode,
            min_length: min_length.max(1),
            run: Vec::new(),
            phase: Phase::Scanning,
            armed: false,
            pattern_count: 0,
        }
    }

    /// Seed the pattern counter, used when a replacement engine carries an
    /// earlier run's count forward.
    pub fn with_pattern_count(mut self, count: u64) -> Self {
        self.pattern_count = count;
        self
    }

    /// Process one last-digit observation.
    ///
    /// Digits outside 0..=9 are rejected with `InvalidDigit` and no state
    /// transition happens (fail-safe). While the live guard is armed every
    /// digit is dropped, not queued.
    pub fn process(&mut self, digit: u8) -> Result<Option<EngineEvent>, CoreError> {
        if digit > 9 {
            return Err(CoreError::InvalidDigit(digit as i64));
        }
        if self.armed {
            debug!(symbol = %self.symbol, digit, "trade in flight, digit dropped");
            return Ok(None);
        }

        match std::mem::replace(&mut self.phase, Phase::Scanning) {
            Phase::AwaitingOutcome(pattern) => {
                // This digit is consumed for scoring; it never seeds a new run.
                let won = digit >= 2;
                let outcome = TradeOutcome {
                    pattern,
                    follow_digit: digit,
                    result: if won { TradeResult::Win } else { TradeResult::Loss },
                    points_delta: if won { WIN_POINTS } else { LOSS_POINTS },
                };
                Ok(Some(EngineEvent::Outcome(outcome)))
            }
            Phase::Scanning => {
                if digit <= 1 {
                    self.run.push(digit);
                    return Ok(None);
                }
                if self.run.len() < self.min_length {
                    self.run.clear();
                    return Ok(None);
                }
                let event = PatternEvent {
                    symbol: self.symbol.clone(),
                    streak: std::mem::take(&mut self.run),
                    break_digit: digit,
                };
                self.pattern_count += 1;
                match self.mode {
                    EngineMode::Scoring => self.phase = Phase::AwaitingOutcome(event.clone()),
                    EngineMode::Live => self.armed = true,
                }
                Ok(Some(EngineEvent::Pattern(event)))
            }
        }
    }

    /// Clear the live guard after the external trade resolved, win or lose.
    pub fn release_guard(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Update the minimum streak length. A changed value clears the current
    /// run and returns to scanning; setting the current value is a no-op.
    pub fn set_min_length(&mut self, min_length: usize) {
        let min_length = min_length.max(1);
        if min_length == self.min_length {
            return;
        }
        self.min_length = min_length;
        self.run.clear();
        self.phase = Phase::Scanning;
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Reset transient run state (strategy stop or symbol switch). The
    /// pattern counter survives; clearing it is a separate policy decision.
    pub fn reset_run(&mut self) {
        self.run.clear();
        self.phase = Phase::Scanning;
        self.armed = false;
    }

    pub fn reset_pattern_count(&mut self) {
        self.pattern_count = 0;
    }

    pub fn pattern_count(&self) -> u64 {
        self.pattern_count
    }

    pub fn run_len(&self) -> usize {
        self.run.len()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }
}
