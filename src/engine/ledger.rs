use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::storage::documents::{ProjectEntry, ProjectStatesDoc, ProjectTimerState};

use super::accumulator::Accumulator;

/// The project every install starts with. It can't be deleted and absorbs the
/// time of projects that are.
pub const DEFAULT_PROJECT_ID: &str = "general-work";
pub const DEFAULT_PROJECT_NAME: &str = "General Work";
pub const DEFAULT_PROJECT_COLOR: &str = "#28a745";

/// Palette cycled through by insertion order.
pub const PROJECT_COLORS: [&str; 10] = [
    "#28a745", "#007bff", "#dc3545", "#ffc107", "#17a2b8", "#6f42c1", "#e83e8c", "#fd7e14",
    "#20c997", "#6c757d",
];

#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    pub time: Accumulator,
}

impl Project {
    pub fn current(&self, now: DateTime<Utc>) -> i64 {
        self.time.current(now)
    }

    pub fn entry(&self) -> ProjectEntry {
        ProjectEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

/// The set of projects plus the single active pointer.
///
/// Invariants held here: the default project always exists and comes first;
/// at most one project is running, it's the active one, and it only runs
/// while the master timer does. Only the active project is ever started, so
/// the "at most one" part holds by construction after load.
#[derive(Debug, Clone)]
pub struct ProjectLedger {
    projects: Vec<Project>,
    active_id: String,
}

impl ProjectLedger {
    pub fn new() -> Self {
        Self {
            projects: vec![default_project()],
            active_id: DEFAULT_PROJECT_ID.to_string(),
        }
    }

    /// Rebuilds the ledger from persisted documents. `states` carries live
    /// counter state and the active pointer for its own day only; a stale one
    /// is ignored beyond the legacy active-id fallback. Documented fallback
    /// order for the active pointer: today's states document, then the
    /// standalone active-project-id key, then the default project.
    pub fn from_documents(
        entries: Vec<ProjectEntry>,
        today_times: &BTreeMap<String, i64>,
        states: &ProjectStatesDoc,
        legacy_active: Option<String>,
        master_running_since: Option<DateTime<Utc>>,
        today: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut projects: Vec<Project> = entries
            .into_iter()
            .map(|entry| Project {
                time: Accumulator::new(
                    today_times.get(&entry.id).copied().unwrap_or(0),
                    None,
                ),
                id: entry.id,
                name: entry.name,
                color: entry.color,
            })
            .collect();

        if !projects.iter().any(|p| p.id == DEFAULT_PROJECT_ID) {
            projects.insert(0, default_project());
        }

        let states_for_today = states.is_for(today);
        if states_for_today {
            for state in &states.project_timer_states {
                if let Some(project) = projects.iter_mut().find(|p| p.id == state.id) {
                    project.time = Accumulator::new(state.time_today, state.start_time);
                }
            }
        }

        let active_id = states_for_today
            .then(|| states.active_project_id.clone())
            .flatten()
            .or(legacy_active)
            .filter(|id| projects.iter().any(|p| p.id == *id))
            .unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string());

        let mut ledger = Self {
            projects,
            active_id,
        };
        ledger.enforce_running_invariant(master_running_since, now);
        ledger
    }

    /// Restores the at-most-one-running invariant after a load. Stray running
    /// markers get folded instead of dropped, so no time is lost.
    fn enforce_running_invariant(
        &mut self,
        master_running_since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let active_id = self.active_id.clone();
        for project in &mut self.projects {
            if project.id != active_id && project.time.is_running() {
                warn!("Project {} was marked running while inactive", project.id);
                project.time.fold(now);
            }
        }
        let active = self
            .active_mut()
            .expect("active pointer always references an existing project");
        match master_running_since {
            Some(since) => {
                if !active.time.is_running() {
                    active.time.start_at(since);
                }
            }
            None => {
                if active.time.is_running() {
                    active.time.fold(now);
                }
            }
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> Option<&Project> {
        self.get(&self.active_id)
    }

    fn active_mut(&mut self) -> Option<&mut Project> {
        let id = self.active_id.clone();
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Sum of every project's current value, the comparison baseline for
    /// drift checks.
    pub fn total_elapsed(&self, now: DateTime<Utc>) -> i64 {
        self.projects.iter().map(|p| p.current(now)).sum()
    }

    /// The open interval of the active project, if one is running. Used to
    /// close a session before the state that defines it changes.
    pub fn open_span(&self) -> Option<(ProjectEntry, DateTime<Utc>)> {
        let active = self.active()?;
        Some((active.entry(), active.time.running_since()?))
    }

    /// Rejects blank and duplicate names as silent no-ops. The new project
    /// starts paused at zero and does not become active.
    pub fn add_project(&mut self, name: &str, id: String) -> bool {
        let name = name.trim();
        if name.is_empty() {
            debug!("Ignoring blank project name");
            return false;
        }
        if self.projects.iter().any(|p| p.name == name) {
            debug!("Ignoring duplicate project name {name}");
            return false;
        }
        let color = PROJECT_COLORS[self.projects.len() % PROJECT_COLORS.len()];
        self.projects.push(Project {
            id,
            name: name.to_string(),
            color: color.to_string(),
            time: Accumulator::default(),
        });
        true
    }

    /// Removes a project, transferring its full total to the default project.
    /// When the removed project was active, the default project takes over
    /// the active role and the running state.
    pub fn delete_project(&mut self, id: &str, master_running: bool, now: DateTime<Utc>) -> bool {
        if id == DEFAULT_PROJECT_ID {
            debug!("Refusing to delete the default project");
            return false;
        }
        let Some(index) = self.projects.iter().position(|p| p.id == id) else {
            debug!("Ignoring delete of unknown project {id}");
            return false;
        };

        let mut removed = self.projects.remove(index);
        let former_since = removed.time.running_since();
        removed.time.fold(now);
        let transferred = removed.time.elapsed_seconds();

        let default = self
            .projects
            .iter_mut()
            .find(|p| p.id == DEFAULT_PROJECT_ID)
            .expect("default project always exists");
        default.time.add(transferred);

        if self.active_id == id {
            self.active_id = DEFAULT_PROJECT_ID.to_string();
            if master_running {
                let default = self.active_mut().expect("default project always exists");
                default.time.start_at(former_since.unwrap_or(now));
            }
        }
        debug!("Deleted project {id}, moved {transferred}s to the default project");
        true
    }

    /// Stops the outgoing project and starts the new one, which only actually
    /// runs while the master does. Callers close the outgoing session first.
    pub fn activate(&mut self, id: &str, master_running: bool, now: DateTime<Utc>) -> bool {
        if self.active_id == id || self.get(id).is_none() {
            return false;
        }
        if let Some(outgoing) = self.active_mut() {
            outgoing.time.fold(now);
        }
        self.active_id = id.to_string();
        if master_running {
            let incoming = self.active_mut().expect("checked above");
            incoming.time.start_at(now);
        }
        true
    }

    /// Mirrors the master starting onto the active project, sharing the
    /// master's running-since so both live deltas floor off the same instant.
    pub fn on_master_start(&mut self, master_since: DateTime<Utc>) {
        if let Some(active) = self.active_mut() {
            active.time.start_at(master_since);
        }
    }

    pub fn on_master_pause(&mut self, now: DateTime<Utc>) {
        if let Some(active) = self.active_mut() {
            active.time.fold(now);
        }
    }

    /// Zeroes every counter and points active back at the default project.
    pub fn on_master_reset(&mut self) {
        for project in &mut self.projects {
            project.time.zero();
        }
        self.active_id = DEFAULT_PROJECT_ID.to_string();
    }

    /// Manual correction belongs to whichever project is current.
    pub fn on_master_adjust(&mut self, delta: i64) {
        if let Some(active) = self.active_mut() {
            active.time.add(delta);
        }
    }

    /// Folds an out-of-tolerance difference into the active project's
    /// accumulated total. The live delta is folded first so the correction
    /// lands in stored seconds, then the counter restarts from `now` when
    /// both the project and the master were running. Returns the name of the
    /// project that absorbed the correction.
    pub fn apply_correction(
        &mut self,
        diff: i64,
        master_running: bool,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let active = self.active_mut()?;
        let was_running = active.time.is_running();
        if was_running {
            active.time.fold(now);
        }
        active.time.add(diff);
        if was_running && master_running {
            active.time.start_at(now);
        }
        Some(active.name.clone())
    }

    pub fn to_documents(
        &self,
        now: DateTime<Utc>,
        today: &str,
    ) -> (Vec<ProjectEntry>, BTreeMap<String, i64>, ProjectStatesDoc) {
        let entries = self.projects.iter().map(Project::entry).collect();
        let times = self
            .projects
            .iter()
            .map(|p| (p.id.clone(), p.current(now)))
            .collect();
        let states = ProjectStatesDoc {
            active_project_id: Some(self.active_id.clone()),
            project_timer_states: self
                .projects
                .iter()
                .map(|p| ProjectTimerState {
                    id: p.id.clone(),
                    time_today: p.time.elapsed_seconds(),
                    start_time: p.time.running_since(),
                })
                .collect(),
            date: today.to_string(),
        };
        (entries, times, states)
    }
}

impl Default for ProjectLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn default_project() -> Project {
    Project {
        id: DEFAULT_PROJECT_ID.to_string(),
        name: DEFAULT_PROJECT_NAME.to_string(),
        color: DEFAULT_PROJECT_COLOR.to_string(),
        time: Accumulator::default(),
    }
}
