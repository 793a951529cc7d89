//! Sliding time window used for trigger rate limiting.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// FIFO of hit timestamps covering a trailing period.
///
/// Pruning is lazy: entries are only dropped when a new hit is recorded, and
/// only relative to that hit's timestamp.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    period: Duration,
    hits: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    /// A window spanning `period_secs` seconds.
    #[must_use]
    pub fn new(period_secs: u32) -> Self {
        Self {
            period: Duration::seconds(i64::from(period_secs)),
            hits: VecDeque::new(),
        }
    }

    /// Prunes hits older than the period relative to `at`, appends `at`, and
    /// returns the resulting number of hits.
    pub fn record(&mut self, at: DateTime<Utc>) -> usize {
        while let Some(oldest) = self.hits.front() {
            if at - *oldest > self.period {
                self.hits.pop_front();
            } else {
                break;
            }
        }
        self.hits.push_back(at);
        self.hits.len()
    }

    /// Drops every recorded hit.
    pub fn clear(&mut self) {
        self.hits.clear();
    }

    /// Hits currently held, including ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True when no hit is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_within_period_accumulate() {
        let t0 = Utc::now();
        let mut window = SlidingWindow::new(60);
        assert_eq!(window.record(t0), 1);
        assert_eq!(window.record(t0 + Duration::seconds(10)), 2);
        assert_eq!(window.record(t0 + Duration::seconds(60)), 3);
    }

    #[test]
    fn hits_older_than_period_are_pruned_oldest_first() {
        let t0 = Utc::now();
        let mut window = SlidingWindow::new(60);
        window.record(t0);
        window.record(t0 + Duration::seconds(30));
        // t0 is 61s old, t0+30 is 31s old.
        assert_eq!(window.record(t0 + Duration::seconds(61)), 2);
        // Everything before t0+61 is now older than the period.
        assert_eq!(window.record(t0 + Duration::seconds(200)), 1);
    }

    #[test]
    fn clear_empties_the_window() {
        let t0 = Utc::now();
        let mut window = SlidingWindow::new(5);
        window.record(t0);
        window.record(t0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.record(t0), 1);
    }
}
