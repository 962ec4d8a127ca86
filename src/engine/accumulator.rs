use chrono::{DateTime, Utc};

use crate::storage::documents::TimerStateDoc;

/// A counter storing folded elapsed seconds plus an optional running-since
/// timestamp for the live portion. Paused exactly when `running_since` is
/// empty. The current value is always floored to whole seconds, which is what
/// makes independently computed totals drift in the first place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    elapsed_seconds: i64,
    running_since: Option<DateTime<Utc>>,
}

impl Accumulator {
    pub fn new(elapsed_seconds: i64, running_since: Option<DateTime<Utc>>) -> Self {
        Self {
            elapsed_seconds: elapsed_seconds.max(0),
            running_since,
        }
    }

    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed_seconds
    }

    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        self.running_since
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn current(&self, now: DateTime<Utc>) -> i64 {
        self.elapsed_seconds + self.live_delta(now)
    }

    fn live_delta(&self, now: DateTime<Utc>) -> i64 {
        self.running_since
            .map(|since| (now - since).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// No-op when already running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn start_at(&mut self, since: DateTime<Utc>) {
        self.running_since = Some(since);
    }

    /// Folds the live portion into the stored seconds and pauses.
    pub fn fold(&mut self, now: DateTime<Utc>) {
        self.elapsed_seconds += self.live_delta(now);
        self.running_since = None;
    }

    /// Adds seconds to the folded portion, clamped at zero. Subtracting past
    /// the available time is absorbed silently.
    pub fn add(&mut self, delta: i64) {
        self.elapsed_seconds = (self.elapsed_seconds + delta).max(0);
    }

    pub fn zero(&mut self) {
        self.elapsed_seconds = 0;
        self.running_since = None;
    }
}

/// The master counter for today. Tracks the cumulative manual adjustment
/// separately so the ui can show "adjusted by" next to the raw elapsed time.
#[derive(Debug, Clone, Default)]
pub struct MasterTimer {
    time: Accumulator,
    net_adjustment: i64,
}

impl MasterTimer {
    /// Rebuilds the timer from persisted state. When the stored state is for
    /// `today` the timer resumes exactly where it left, including a running
    /// `start_time`, so time elapsed while the process was gone still counts.
    /// State from another day is discarded entirely.
    pub fn restore(
        state: &TimerStateDoc,
        fallback_elapsed: i64,
        net_adjustment: i64,
        today: &str,
    ) -> Self {
        let time = if state.is_for(today) {
            Accumulator::new(
                state.elapsed,
                if state.is_running { state.start_time } else { None },
            )
        } else {
            Accumulator::new(fallback_elapsed.max(0), None)
        };
        Self {
            time,
            net_adjustment,
        }
    }

    /// Returns false when the timer was already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.time.is_running() {
            return false;
        }
        self.time.start(now);
        true
    }

    /// Returns false when the timer wasn't running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if !self.time.is_running() {
            return false;
        }
        self.time.fold(now);
        true
    }

    pub fn reset(&mut self) {
        self.time.zero();
        self.net_adjustment = 0;
    }

    pub fn adjust(&mut self, delta: i64) {
        self.time.add(delta);
        self.net_adjustment += delta;
    }

    pub fn current_elapsed(&self, now: DateTime<Utc>) -> i64 {
        self.time.current(now)
    }

    pub fn is_running(&self) -> bool {
        self.time.is_running()
    }

    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        self.time.running_since()
    }

    pub fn net_adjustment(&self) -> i64 {
        self.net_adjustment
    }

    pub fn to_state(&self, today: &str) -> TimerStateDoc {
        TimerStateDoc {
            elapsed: self.time.elapsed_seconds(),
            is_running: self.time.is_running(),
            start_time: self.time.running_since(),
            date: today.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn counts_while_running_holds_while_paused() {
        let mut timer = MasterTimer::default();
        assert!(timer.start(t0()));

        let mut previous = 0;
        for s in 1..10 {
            let value = timer.current_elapsed(t0() + Duration::seconds(s));
            assert!(value >= previous);
            previous = value;
        }

        assert!(timer.pause(t0() + Duration::seconds(65)));
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(65)), 65);
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(600)), 65);
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let mut timer = MasterTimer::default();
        assert!(!timer.pause(t0()));
        assert!(timer.start(t0()));
        assert!(!timer.start(t0() + Duration::seconds(10)));
        assert_eq!(timer.running_since(), Some(t0()));
        assert!(timer.pause(t0() + Duration::seconds(20)));
        assert!(!timer.pause(t0() + Duration::seconds(30)));
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(30)), 20);
    }

    #[test]
    fn adjustment_is_invertible_when_not_clamped() {
        let mut timer = MasterTimer::default();
        timer.start(t0());
        timer.pause(t0() + Duration::seconds(100));

        timer.adjust(600);
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(100)), 700);
        assert_eq!(timer.net_adjustment(), 600);

        timer.adjust(-600);
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(100)), 100);
        assert_eq!(timer.net_adjustment(), 0);
    }

    #[test]
    fn adjustment_below_zero_clamps_elapsed_not_net() {
        let mut timer = MasterTimer::default();
        timer.adjust(-300);
        assert_eq!(timer.current_elapsed(t0()), 0);
        assert_eq!(timer.net_adjustment(), -300);
    }

    #[test]
    fn adjusting_does_not_touch_running_state() {
        let mut timer = MasterTimer::default();
        timer.start(t0());
        timer.adjust(60);
        assert_eq!(timer.running_since(), Some(t0()));
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(5)), 65);
    }

    #[test]
    fn restore_resumes_running_state_for_today() {
        let state = TimerStateDoc {
            elapsed: 100,
            is_running: true,
            start_time: Some(t0()),
            date: "2018-07-04".into(),
        };
        let timer = MasterTimer::restore(&state, 0, 600, "2018-07-04");
        assert!(timer.is_running());
        // 100 folded + 65 elapsed while the process was unloaded.
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(65)), 165);
        assert_eq!(timer.net_adjustment(), 600);
    }

    #[test]
    fn restore_discards_state_from_another_day() {
        let state = TimerStateDoc {
            elapsed: 100,
            is_running: true,
            start_time: Some(t0()),
            date: "2018-07-03".into(),
        };
        let timer = MasterTimer::restore(&state, 0, 0, "2018-07-04");
        assert!(!timer.is_running());
        assert_eq!(timer.current_elapsed(t0() + Duration::seconds(65)), 0);
    }

    #[test]
    fn restore_without_state_uses_fallback_elapsed() {
        let timer = MasterTimer::restore(&TimerStateDoc::default(), 42, 0, "2018-07-04");
        assert!(!timer.is_running());
        assert_eq!(timer.current_elapsed(t0()), 42);
    }
}
