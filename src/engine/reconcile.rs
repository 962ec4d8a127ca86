use chrono::{DateTime, Timelike, Utc};
use tracing::{info, warn};

use crate::utils::time::format_hms;

use super::ledger::ProjectLedger;

/// Maximum difference between the master total and the summed project totals
/// treated as rounding noise. The totals are computed by flooring
/// `now - running_since` at slightly different instants, so a couple seconds
/// of disagreement is expected and not worth correcting.
pub const TOLERANCE_SECS: i64 = 3;

/// Wall-clock cadence of the opportunistic background correction. Keyed off
/// the clock's seconds value instead of a fixed-delay timer, so skipped ticks
/// don't shift the schedule.
pub const AUTO_CORRECT_INTERVAL_SECS: u32 = 30;

/// Drift between the two independently computed totals, master minus sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftStatus {
    pub difference: i64,
}

impl DriftStatus {
    pub fn in_sync(&self) -> bool {
        self.difference.abs() <= TOLERANCE_SECS
    }
}

pub fn drift(master_total: i64, project_sum: i64) -> DriftStatus {
    DriftStatus {
        difference: master_total - project_sum,
    }
}

/// True iff the totals agree within tolerance.
pub fn verify(master_total: i64, project_sum: i64) -> bool {
    drift(master_total, project_sum).in_sync()
}

pub fn is_auto_correct_moment(now: DateTime<Utc>) -> bool {
    now.second() % AUTO_CORRECT_INTERVAL_SECS == 0
}

/// Folds out-of-tolerance drift into the active project. Within tolerance
/// this is a no-op, which also makes back-to-back calls idempotent. A missing
/// active project leaves the drift unresolved; it stays visible and gets
/// re-logged on the next check.
pub fn reconcile(
    ledger: &mut ProjectLedger,
    master_total: i64,
    master_running: bool,
    now: DateTime<Utc>,
) -> bool {
    let status = drift(master_total, ledger.total_elapsed(now));
    if status.in_sync() {
        return false;
    }
    match ledger.apply_correction(status.difference, master_running, now) {
        Some(project) => {
            info!(
                "Applied {}s correction to {project}, master at {}",
                status.difference,
                format_hms(master_total)
            );
            true
        }
        None => {
            warn!(
                "Totals differ by {}s but no project can absorb the correction",
                status.difference
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::engine::ledger::{ProjectLedger, DEFAULT_PROJECT_ID};

    use super::*;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn tolerance_boundary() {
        assert!(verify(100, 100));
        assert!(verify(100, 97));
        assert!(verify(97, 100));
        assert!(!verify(100, 96));
        assert!(!verify(96, 100));
    }

    #[test]
    fn within_tolerance_changes_nothing() {
        let mut ledger = ProjectLedger::new();
        ledger.on_master_adjust(100);

        assert!(!reconcile(&mut ledger, 102, false, t0()));
        assert_eq!(ledger.total_elapsed(t0()), 100);
    }

    #[test]
    fn correction_restores_agreement() {
        let mut ledger = ProjectLedger::new();
        ledger.on_master_adjust(50);

        assert!(reconcile(&mut ledger, 80, false, t0()));
        assert_eq!(ledger.total_elapsed(t0()), 80);

        // Idempotent, the follow-up check finds nothing to do.
        assert!(!reconcile(&mut ledger, 80, false, t0()));
    }

    #[test]
    fn running_correction_lands_in_stored_seconds() {
        let mut ledger = ProjectLedger::new();
        ledger.on_master_start(t0());

        let later = t0() + Duration::seconds(20);
        assert!(reconcile(&mut ledger, 30, true, later));

        let default = ledger.get(DEFAULT_PROJECT_ID).unwrap();
        // 20s live delta folded plus 10s drift, running again from `later`.
        assert_eq!(default.time.elapsed_seconds(), 30);
        assert_eq!(default.time.running_since(), Some(later));
        assert!(verify(30, ledger.total_elapsed(later)));
    }

    #[test]
    fn corrected_total_is_clamped_at_zero() {
        let mut ledger = ProjectLedger::new();
        ledger.on_master_adjust(5);

        assert!(reconcile(&mut ledger, 0, false, t0()));
        assert_eq!(ledger.total_elapsed(t0()), 0);
    }

    #[test]
    fn auto_correct_moments_align_to_the_wall_clock() {
        let base = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        assert!(is_auto_correct_moment(base));
        assert!(is_auto_correct_moment(base + Duration::seconds(30)));
        assert!(!is_auto_correct_moment(base + Duration::seconds(31)));
        assert!(!is_auto_correct_moment(base + Duration::seconds(59)));
    }
}
