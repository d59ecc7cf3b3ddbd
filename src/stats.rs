use std::collections::VecDeque;

use crate::error::CoreError;
use crate::types::Extremes;

/// Default rolling-window capacity (ticks).
pub const DEFAULT_WINDOW: usize = 1000;

/// Rolling last-digit statistics for one market symbol.
///
/// Keeps a bounded FIFO window of recent digits plus incrementally maintained
/// per-digit counts, so `observe` is O(1) and the derived frequency table is
/// never recomputed from scratch on the hot path.
#[derive(Debug, Clone)]
pub struct TickStatsTracker {
    window: VecDeque<u8>,
    counts: [u32; 10],
    capacity: usize,
}

impl TickStatsTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            counts: [0; 10],
            capacity,
        }
    }

    /// Append a digit, evicting the oldest when at capacity.
    ///
    /// Digits outside 0..=9 are rejected with `InvalidDigit` and leave the
    /// window untouched.
    pub fn observe(&mut self, digit: u8) -> Result<(), CoreError> {
        if digit > 9 {
            return Err(CoreError::InvalidDigit(digit as i64));
        }
        if self.window.len() == self.capacity {
            if let Some(old) = self.window.pop_front() {
                self.counts[old as usize] -= 1;
            }
        }
        self.window.push_back(digit);
        self.counts[digit as usize] += 1;
        Ok(())
    }

    /// Percentage of window occurrences per digit, one decimal place,
    /// rounded half up. `None` while the window is empty.
    pub fn frequencies(&self) -> Option<[f64; 10]> {
        let total = self.window.len();
        if total == 0 {
            return None;
        }
        let mut pct = [0.0; 10];
        for (digit, count) in self.counts.iter().enumerate() {
            let raw = 100.0 * *count as f64 / total as f64;
            pct[digit] = (raw * 10.0).round() / 10.0;
        }
        Some(pct)
    }

    /// Most- and least-frequent digit sets over digits present in the window.
    ///
    /// Ties are all included. Both sets are empty for an empty window; a
    /// window with a single distinct digit reports it as both most and least
    /// frequent.
    pub fn extremes(&self) -> Extremes {
        let present: Vec<(u8, u32)> = self
            .counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(d, c)| (d as u8, *c))
            .collect();
        if present.is_empty() {
            return Extremes::default();
        }
        let max = present.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let min = present.iter().map(|(_, c)| *c).min().unwrap_or(0);
        Extremes {
            most: present.iter().filter(|(_, c)| *c == max).map(|(d, _)| *d).collect(),
            least: present.iter().filter(|(_, c)| *c == min).map(|(d, _)| *d).collect(),
        }
    }

    /// Change the window capacity, evicting oldest digits if shrinking.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.window.len() > self.capacity {
            if let Some(old) = self.window.pop_front() {
                self.counts[old as usize] -= 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window contents, oldest first.
    pub fn digits(&self) -> impl Iterator<Item = u8> + '_ {
        self.window.iter().copied()
    }
}

impl Default for TickStatsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut TickStatsTracker, digits: &[u8]) {
        for &d in digits {
            tracker.observe(d).unwrap();
        }
    }

    #[test]
    fn window_holds_last_n_in_order() {
        let mut t = TickStatsTracker::new(3);
        feed(&mut t, &[1, 2, 3, 4, 5]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.digits().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut t = TickStatsTracker::new(10);
        for i in 0..100u32 {
            t.observe((i % 10) as u8).unwrap();
            assert!(t.len() <= 10);
        }
    }

    #[test]
    fn frequencies_sum_to_hundred() {
        let mut t = TickStatsTracker::new(100);
        feed(&mut t, &[0, 1, 1, 2, 3, 3, 3, 7, 9, 9, 4]);
        let sum: f64 = t.frequencies().unwrap().iter().sum();
        assert!((sum - 100.0).abs() <= 0.1, "sum was {sum}");
    }

    #[test]
    fn empty_window_has_no_frequencies() {
        let t = TickStatsTracker::new(50);
        assert!(t.frequencies().is_none());
        assert_eq!(t.extremes(), Extremes::default());
    }

    #[test]
    fn ties_included_in_both_extremes() {
        let mut t = TickStatsTracker::new(100);
        feed(&mut t, &[0, 0, 1, 1]);
        let freq = t.frequencies().unwrap();
        assert_eq!(freq[0], 50.0);
        assert_eq!(freq[1], 50.0);
        let ext = t.extremes();
        assert_eq!(ext.most, vec![0, 1]);
        assert_eq!(ext.least, vec![0, 1]);
    }

    #[test]
    fn single_distinct_digit_is_most_and_least() {
        let mut t = TickStatsTracker::new(100);
        feed(&mut t, &[7, 7, 7]);
        let ext = t.extremes();
        assert_eq!(ext.most, vec![7]);
        assert_eq!(ext.least, vec![7]);
    }

    #[test]
    fn extremes_ignore_absent_digits() {
        let mut t = TickStatsTracker::new(100);
        feed(&mut t, &[5, 5, 8]);
        let ext = t.extremes();
        assert_eq!(ext.most, vec![5]);
        assert_eq!(ext.least, vec![8]);
    }

    #[test]
    fn invalid_digit_leaves_state_untouched() {
        let mut t = TickStatsTracker::new(10);
        feed(&mut t, &[1, 2]);
        assert!(matches!(t.observe(10), Err(CoreError::InvalidDigit(10))));
        assert_eq!(t.len(), 2);
        assert_eq!(t.digits().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn shrinking_capacity_evicts_oldest() {
        let mut t = TickStatsTracker::new(5);
        feed(&mut t, &[1, 2, 3, 4, 5]);
        t.set_capacity(2);
        assert_eq!(t.digits().collect::<Vec<_>>(), vec![4, 5]);
        let freq = t.frequencies().unwrap();
        assert_eq!(freq[4], 50.0);
        assert_eq!(freq[5], 50.0);
        assert_eq!(freq[1], 0.0);
    }

    #[test]
    fn rounding_is_one_decimal_place() {
        let mut t = TickStatsTracker::new(100);
        // 1 of 3 -> 33.333... -> 33.3; 2 of 3 -> 66.666... -> 66.7
        feed(&mut t, &[4, 6, 6]);
        let freq = t.frequencies().unwrap();
        assert_eq!(freq[4], 33.3);
        assert_eq!(freq[6], 66.7);
    }
}
