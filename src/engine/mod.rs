use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    storage::{
        documents::{self, ProjectStatesDoc, Session, TimerStateDoc},
        store::{StateStore, ACTIVE_PROJECT_ID, PROJECTS, PROJECT_STATES, TIMER_STATE},
    },
    utils::{
        clock::Clock,
        time::{day_key, format_signed_hm},
    },
};

use self::{
    accumulator::MasterTimer,
    ledger::{Project, ProjectLedger},
    reconcile::DriftStatus,
};

pub mod accumulator;
pub mod ledger;
pub mod reconcile;
pub mod timeline;

/// Capability gating destructive operations on an external confirmation.
/// The engine never prompts by itself; callers resolve the question first and
/// the mutation only proceeds on a yes.
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmGate {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Cumulative manual adjustment for display, e.g. `+00:10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentSummary {
    pub display: String,
    pub is_positive: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub id: String,
    pub name: String,
    pub color: String,
    pub elapsed: i64,
    pub active: bool,
    pub running: bool,
}

/// Everything the rendering layer needs after a state change. Observers get a
/// fresh one on every transition and tick instead of reaching back into the
/// tracker.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub running: bool,
    pub elapsed: i64,
    pub project_sum: i64,
    pub drift: DriftStatus,
    pub net_adjustment: AdjustmentSummary,
    pub projects: Vec<ProjectStatus>,
}

type UpdateObserver = Box<dyn FnMut(&StatusSnapshot)>;

/// Owns the master timer, the project ledger and the store, and runs every
/// state transition end to end: mutate, reconcile, persist, notify. All
/// mutations go through here, which is what keeps the counters consistent
/// between any two observable states.
pub struct WorkTracker<S: StateStore> {
    store: S,
    clock: Box<dyn Clock>,
    master: MasterTimer,
    ledger: ProjectLedger,
    observers: Vec<UpdateObserver>,
}

impl<S: StateStore> WorkTracker<S> {
    /// Restores the tracker from persisted state. Timer state from a previous
    /// day is discarded (the per-day history maps stay untouched), a running
    /// timer from today resumes with its original start, and a drift check
    /// runs right away so a reload never starts out inconsistent.
    pub fn load(store: S, clock: Box<dyn Clock>) -> Self {
        let now = clock.time();
        let today = day_key(now);

        let mut timer_state: TimerStateDoc = store.read(TIMER_STATE, TimerStateDoc::default());
        if !timer_state.date.is_empty() && !timer_state.is_for(&today) {
            debug!("Discarding timer state from {}", timer_state.date);
            store.remove(TIMER_STATE);
            timer_state = TimerStateDoc::default();
        }

        let master = MasterTimer::restore(
            &timer_state,
            documents::today_work_time(&store, &today),
            documents::today_net_adjustment(&store, &today),
            &today,
        );

        let ledger = ProjectLedger::from_documents(
            store.read(PROJECTS, Vec::new()),
            &documents::today_project_times(&store, &today),
            &store.read(PROJECT_STATES, ProjectStatesDoc::default()),
            store.read(ACTIVE_PROJECT_ID, None),
            master.running_since(),
            &today,
            now,
        );

        let mut tracker = Self {
            store,
            clock,
            master,
            ledger,
            observers: Vec::new(),
        };
        tracker.reconcile_now(now);
        tracker.persist(now);
        tracker
    }

    /// Registers an observer. Observers fire in registration order after
    /// every state change, duplicates included.
    pub fn on_update(&mut self, observer: impl FnMut(&StatusSnapshot) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn start(&mut self) {
        let now = self.clock.time();
        if !self.master.start(now) {
            return;
        }
        self.ledger.on_master_start(now);
        self.persist(now);
        self.notify(now);
    }

    pub fn pause(&mut self) {
        let now = self.clock.time();
        if !self.master.is_running() {
            return;
        }
        // Correct drift while the live state that caused it is still there,
        // then close the session before the fold erases its start.
        self.reconcile_now(now);
        self.close_open_session(now);
        self.master.pause(now);
        self.ledger.on_master_pause(now);
        self.persist(now);
        self.notify(now);

        let drift = self.drift_status();
        if !drift.in_sync() {
            warn!("Still off by {}s after pause", drift.difference);
        }
    }

    pub fn toggle(&mut self) {
        if self.master.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Clears today entirely: counters, net adjustment and the session log.
    /// Does nothing unless the gate confirms.
    pub fn reset(&mut self, gate: &dyn ConfirmGate) {
        if !gate.confirm("Reset today's time?") {
            return;
        }
        let now = self.clock.time();
        let today = day_key(now);
        timeline::clear_day(&self.store, &today);
        self.master.reset();
        self.ledger.on_master_reset();
        self.persist(now);
        self.store.remove(TIMER_STATE);
        documents::clear_today_net_adjustment(&self.store, &today);
        self.notify(now);
    }

    /// Manual correction in seconds, applied to the master and mirrored onto
    /// the active project. Both sides clamp at zero independently.
    pub fn adjust(&mut self, delta: i64) {
        let now = self.clock.time();
        self.master.adjust(delta);
        self.ledger.on_master_adjust(delta);
        self.reconcile_now(now);
        self.persist(now);
        self.notify(now);
    }

    pub fn add_project(&mut self, name: &str) {
        let now = self.clock.time();
        let id = self.clock.millis_id();
        if !self.ledger.add_project(name, id) {
            return;
        }
        self.persist(now);
        self.notify(now);
    }

    pub fn delete_project(&mut self, id: &str) {
        let now = self.clock.time();
        if !self.ledger.delete_project(id, self.master.is_running(), now) {
            return;
        }
        self.reconcile_now(now);
        self.persist(now);
        self.notify(now);
    }

    pub fn select_project(&mut self, id: &str) {
        let now = self.clock.time();
        if id == self.ledger.active_id() || self.ledger.get(id).is_none() {
            debug!("Ignoring switch to {id}");
            return;
        }
        // Don't let the switch compound existing drift, and close the
        // outgoing session while its project is still active.
        self.reconcile_now(now);
        self.close_open_session(now);
        self.ledger.activate(id, self.master.is_running(), now);
        self.persist(now);
        self.notify(now);
    }

    /// One-second heartbeat from the driving loop. Republishes the display
    /// value every time and runs the background correction when the wall
    /// clock lines up with the cadence.
    pub fn tick(&mut self) {
        let now = self.clock.time();
        if reconcile::is_auto_correct_moment(now) && self.reconcile_now(now) {
            self.persist(now);
        }
        self.notify(now);
    }

    /// User-requested reconciliation, regardless of the cadence.
    pub fn force_sync(&mut self) {
        let now = self.clock.time();
        self.reconcile_now(now);
        self.persist(now);
        self.notify(now);
    }

    /// Persists current state without mutating it. The watch loop calls this
    /// on shutdown so a running timer survives the process.
    pub fn save(&mut self) {
        let now = self.clock.time();
        self.persist(now);
    }

    pub fn current_elapsed(&self) -> i64 {
        self.master.current_elapsed(self.clock.time())
    }

    pub fn total_elapsed(&self) -> i64 {
        self.ledger.total_elapsed(self.clock.time())
    }

    pub fn is_running(&self) -> bool {
        self.master.is_running()
    }

    pub fn drift_status(&self) -> DriftStatus {
        let now = self.clock.time();
        reconcile::drift(
            self.master.current_elapsed(now),
            self.ledger.total_elapsed(now),
        )
    }

    pub fn net_adjustment_summary(&self) -> AdjustmentSummary {
        let net = self.master.net_adjustment();
        AdjustmentSummary {
            display: format_signed_hm(net),
            is_positive: net >= 0,
        }
    }

    pub fn projects(&self) -> &[Project] {
        self.ledger.projects()
    }

    pub fn active_project_id(&self) -> &str {
        self.ledger.active_id()
    }

    pub fn todays_sessions(&self) -> Vec<Session> {
        timeline::sessions(&self.store, &day_key(self.clock.time()))
    }

    pub fn sessions_on(&self, day: &str) -> Vec<Session> {
        timeline::sessions(&self.store, day)
    }

    /// Work totals of the preceding `days` days, yesterday first.
    pub fn work_time_history(&self, days: u32) -> Vec<(String, i64)> {
        let now = self.clock.time();
        (1..=i64::from(days))
            .map(|back| {
                let day = day_key(now - chrono::Duration::days(back));
                let seconds = documents::today_work_time(&self.store, &day);
                (day, seconds)
            })
            .collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_at(self.clock.time())
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn snapshot_at(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let elapsed = self.master.current_elapsed(now);
        let project_sum = self.ledger.total_elapsed(now);
        StatusSnapshot {
            running: self.master.is_running(),
            elapsed,
            project_sum,
            drift: reconcile::drift(elapsed, project_sum),
            net_adjustment: self.net_adjustment_summary(),
            projects: self
                .ledger
                .projects()
                .iter()
                .map(|p| ProjectStatus {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    color: p.color.clone(),
                    elapsed: p.current(now),
                    active: p.id == self.ledger.active_id(),
                    running: p.time.is_running(),
                })
                .collect(),
        }
    }

    fn close_open_session(&mut self, now: DateTime<Utc>) {
        if let Some((project, start)) = self.ledger.open_span() {
            timeline::record_session(&self.store, &day_key(now), project, start, now);
        }
    }

    fn reconcile_now(&mut self, now: DateTime<Utc>) -> bool {
        reconcile::reconcile(
            &mut self.ledger,
            self.master.current_elapsed(now),
            self.master.is_running(),
            now,
        )
    }

    fn persist(&self, now: DateTime<Utc>) {
        let today = day_key(now);
        documents::set_today_work_time(&self.store, &today, self.master.current_elapsed(now));
        self.store.write(TIMER_STATE, &self.master.to_state(&today));
        documents::set_today_net_adjustment(&self.store, &today, self.master.net_adjustment());

        let (entries, times, states) = self.ledger.to_documents(now, &today);
        self.store.write(PROJECTS, &entries);
        documents::set_today_project_times(&self.store, &today, times);
        self.store.write(ACTIVE_PROJECT_ID, &states.active_project_id);
        self.store.write(PROJECT_STATES, &states);
    }

    fn notify(&mut self, now: DateTime<Utc>) {
        let snapshot = self.snapshot_at(now);
        for observer in &mut self.observers {
            observer(&snapshot);
        }
    }

    #[cfg(test)]
    fn ledger_mut(&mut self) -> &mut ProjectLedger {
        &mut self.ledger
    }
}
