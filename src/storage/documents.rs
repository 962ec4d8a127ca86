use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{
    StateStore, NET_ADJUSTMENTS, PROJECT_TIMES, TIMELINE_DATA, WORK_TIMES,
};

/// Map from day key to a day-scoped value. History stays append-only: a day
/// rollover never rewrites old entries, it only stops reading them.
pub type DayMap<T> = BTreeMap<String, T>;

/// Persisted master timer state, always tagged with the day it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStateDoc {
    pub elapsed: i64,
    pub is_running: bool,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    pub date: String,
}

impl TimerStateDoc {
    pub fn is_for(&self, day: &str) -> bool {
        self.date == day
    }
}

/// A closed interval attributing a span of elapsed time to one project.
/// Project name and color are denormalized in, so the timeline survives the
/// project being deleted later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
    pub project_id: String,
    pub project_name: String,
    pub project_color: String,
}

impl Session {
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Project identity as stored in the `projects` key. Time fields live in
/// day-scoped documents instead, the project list itself survives rollovers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Live counter state of one project, part of [ProjectStatesDoc].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTimerState {
    pub id: String,
    pub time_today: i64,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub start_time: Option<DateTime<Utc>>,
}

/// Snapshot of the ledger's running state, day-tagged like [TimerStateDoc].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatesDoc {
    pub active_project_id: Option<String>,
    pub project_timer_states: Vec<ProjectTimerState>,
    pub date: String,
}

impl ProjectStatesDoc {
    pub fn is_for(&self, day: &str) -> bool {
        self.date == day
    }
}

// Day-scoped accessors over the raw keyed store. Each is a single
// read-modify-write, the store has no cross-call locking (callers serialize
// per key, which the single-writer engine does by construction).

pub fn today_work_time(store: &impl StateStore, day: &str) -> i64 {
    let times: DayMap<i64> = store.read(WORK_TIMES, DayMap::new());
    times.get(day).copied().unwrap_or(0)
}

pub fn set_today_work_time(store: &impl StateStore, day: &str, seconds: i64) {
    let mut times: DayMap<i64> = store.read(WORK_TIMES, DayMap::new());
    times.insert(day.to_string(), seconds);
    store.write(WORK_TIMES, &times);
}

pub fn today_net_adjustment(store: &impl StateStore, day: &str) -> i64 {
    let adjustments: DayMap<i64> = store.read(NET_ADJUSTMENTS, DayMap::new());
    adjustments.get(day).copied().unwrap_or(0)
}

pub fn set_today_net_adjustment(store: &impl StateStore, day: &str, seconds: i64) {
    let mut adjustments: DayMap<i64> = store.read(NET_ADJUSTMENTS, DayMap::new());
    adjustments.insert(day.to_string(), seconds);
    store.write(NET_ADJUSTMENTS, &adjustments);
}

pub fn clear_today_net_adjustment(store: &impl StateStore, day: &str) {
    let mut adjustments: DayMap<i64> = store.read(NET_ADJUSTMENTS, DayMap::new());
    adjustments.remove(day);
    store.write(NET_ADJUSTMENTS, &adjustments);
}

pub fn sessions_for(store: &impl StateStore, day: &str) -> Vec<Session> {
    let timeline: DayMap<Vec<Session>> = store.read(TIMELINE_DATA, DayMap::new());
    timeline.get(day).cloned().unwrap_or_default()
}

pub fn push_session(store: &impl StateStore, day: &str, session: Session) {
    let mut timeline: DayMap<Vec<Session>> = store.read(TIMELINE_DATA, DayMap::new());
    timeline.entry(day.to_string()).or_default().push(session);
    store.write(TIMELINE_DATA, &timeline);
}

pub fn clear_sessions(store: &impl StateStore, day: &str) {
    let mut timeline: DayMap<Vec<Session>> = store.read(TIMELINE_DATA, DayMap::new());
    timeline.remove(day);
    store.write(TIMELINE_DATA, &timeline);
}

pub fn today_project_times(store: &impl StateStore, day: &str) -> BTreeMap<String, i64> {
    let times: DayMap<BTreeMap<String, i64>> = store.read(PROJECT_TIMES, DayMap::new());
    times.get(day).cloned().unwrap_or_default()
}

pub fn set_today_project_times(
    store: &impl StateStore,
    day: &str,
    project_times: BTreeMap<String, i64>,
) {
    let mut times: DayMap<BTreeMap<String, i64>> = store.read(PROJECT_TIMES, DayMap::new());
    times.insert(day.to_string(), project_times);
    store.write(PROJECT_TIMES, &times);
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::storage::store::JsonFileStore;

    use super::*;

    #[test]
    fn absent_day_defaults_to_zero() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        assert_eq!(today_work_time(&store, "2018-07-04"), 0);
        assert_eq!(today_net_adjustment(&store, "2018-07-04"), 0);
        assert!(sessions_for(&store, "2018-07-04").is_empty());
        Ok(())
    }

    #[test]
    fn day_slices_do_not_leak_across_days() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        set_today_work_time(&store, "2018-07-03", 3600);
        set_today_work_time(&store, "2018-07-04", 65);

        assert_eq!(today_work_time(&store, "2018-07-03"), 3600);
        assert_eq!(today_work_time(&store, "2018-07-04"), 65);
        assert_eq!(today_work_time(&store, "2018-07-05"), 0);
        Ok(())
    }

    #[test]
    fn sessions_append_in_insertion_order() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;
        let day = "2018-07-04";

        let base = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let later = Session {
            start: base + chrono::Duration::seconds(600),
            end: base + chrono::Duration::seconds(700),
            project_id: "p2".into(),
            project_name: "Second".into(),
            project_color: "#007bff".into(),
        };
        let earlier = Session {
            start: base,
            end: base + chrono::Duration::seconds(65),
            project_id: "p1".into(),
            project_name: "First".into(),
            project_color: "#28a745".into(),
        };

        // Insertion order is kept even when it's not chronological.
        push_session(&store, day, later.clone());
        push_session(&store, day, earlier.clone());

        assert_eq!(sessions_for(&store, day), vec![later, earlier]);

        clear_sessions(&store, day);
        assert!(sessions_for(&store, day).is_empty());
        Ok(())
    }

    #[test]
    fn clearing_a_day_leaves_other_days_alone() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        set_today_net_adjustment(&store, "2018-07-03", 600);
        set_today_net_adjustment(&store, "2018-07-04", -300);
        clear_today_net_adjustment(&store, "2018-07-04");

        assert_eq!(today_net_adjustment(&store, "2018-07-03"), 600);
        assert_eq!(today_net_adjustment(&store, "2018-07-04"), 0);
        Ok(())
    }
}
