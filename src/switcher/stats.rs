//! Rolling trigger history and interval smoothing
//!
//! Keeps a bounded FIFO of recent triggers per switcher and an exponentially
//! weighted average of the time between triggers (weight 0.2, smoothing over
//! roughly five samples).

use super::SwitcherState;

/// Weight of the newest interval sample in the moving average
const INTERVAL_EWMA_WEIGHT: f64 = 0.2;

/// Record a fired trigger at `now_ms` (epoch milliseconds)
///
/// Appends to the history (trimming to `history_size`, no-op when 0) and
/// updates the average interval. A timestamp earlier than the previous
/// trigger is rejected without mutating anything.
pub fn record_trigger(state: &mut SwitcherState, target: &str, now_ms: u64, history_size: usize) {
    if let Some(last) = state.last_trigger_time {
        if now_ms < last {
            return;
        }
    }

    if history_size > 0 {
        state.history.push_back(HistoryEntry {
            target: target.to_string(),
            ts: now_ms,
        });
        while state.history.len() > history_size {
            state.history.pop_front();
        }
    }

    if let Some(last) = state.last_trigger_time {
        let interval = (now_ms - last) as f64 / 1000.0;
        state.average_interval_secs = if state.average_interval_secs == 0.0 {
            interval
        } else {
            state.average_interval_secs * (1.0 - INTERVAL_EWMA_WEIGHT)
                + interval * INTERVAL_EWMA_WEIGHT
        };
    }
    state.last_trigger_time = Some(now_ms);
}

/// One entry in the rolling trigger history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub target: String,
    /// Timestamp in milliseconds since epoch
    pub ts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switcher::SwitcherState;

    fn state() -> SwitcherState {
        SwitcherState::new(10, 20, vec!["1/1/1".into(), "1/1/2".into()], false)
    }

    #[test]
    fn test_first_trigger_sets_no_average() {
        let mut s = state();
        record_trigger(&mut s, "1/1/1", 1_000, 5);
        assert_eq!(s.average_interval_secs, 0.0);
        assert_eq!(s.last_trigger_time, Some(1_000));
        assert_eq!(s.history.len(), 1);
    }

    #[test]
    fn test_ewma_matches_formula() {
        // Triggers at t=0, 10s, 30s, 60s -> intervals 10, 20, 30
        let mut s = state();
        record_trigger(&mut s, "a", 0, 5);
        record_trigger(&mut s, "a", 10_000, 5);
        assert_eq!(s.average_interval_secs, 10.0);

        record_trigger(&mut s, "a", 30_000, 5);
        assert_eq!(s.average_interval_secs, 0.8 * 10.0 + 0.2 * 20.0); // 12.0

        record_trigger(&mut s, "a", 60_000, 5);
        assert_eq!(s.average_interval_secs, 0.8 * 12.0 + 0.2 * 30.0); // 15.6
    }

    #[test]
    fn test_history_trims_to_capacity() {
        let mut s = state();
        for i in 0..10u64 {
            record_trigger(&mut s, &format!("t{}", i), i * 1_000, 3);
        }
        assert_eq!(s.history.len(), 3);
        assert_eq!(s.history.front().unwrap().target, "t7");
        assert_eq!(s.history.back().unwrap().target, "t9");
    }

    #[test]
    fn test_zero_capacity_disables_history() {
        let mut s = state();
        record_trigger(&mut s, "a", 1_000, 0);
        record_trigger(&mut s, "a", 2_000, 0);
        assert!(s.history.is_empty());
        // Average interval is still tracked
        assert_eq!(s.average_interval_secs, 1.0);
    }

    #[test]
    fn test_backwards_timestamp_rejected() {
        let mut s = state();
        record_trigger(&mut s, "a", 10_000, 5);
        record_trigger(&mut s, "a", 5_000, 5);
        assert_eq!(s.last_trigger_time, Some(10_000));
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.average_interval_secs, 0.0);
    }
}
