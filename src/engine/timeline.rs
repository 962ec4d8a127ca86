use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    storage::{
        documents::{self, ProjectEntry, Session},
        store::StateStore,
    },
    utils::time::format_local_hm,
};

/// Intervals shorter than this are treated as noise, e.g. an accidental
/// double switch between projects.
pub const MIN_SESSION_SECS: i64 = 1;

/// Appends a closed interval to the day's session log. Intervals below the
/// minimum duration, and degenerate ones with `end <= start`, are discarded.
pub fn record_session(
    store: &impl StateStore,
    day: &str,
    project: ProjectEntry,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let duration = (end - start).num_seconds();
    if duration < MIN_SESSION_SECS {
        debug!(
            "Skipping {duration}s interval for {}, below the minimum",
            project.name
        );
        return;
    }
    debug!(
        "Recording session for {} from {} to {}",
        project.name,
        format_local_hm(start),
        format_local_hm(end)
    );
    documents::push_session(
        store,
        day,
        Session {
            start,
            end,
            project_id: project.id,
            project_name: project.name,
            project_color: project.color,
        },
    );
}

/// The day's sessions in append order. Callers wanting chronological output
/// sort themselves.
pub fn sessions(store: &impl StateStore, day: &str) -> Vec<Session> {
    documents::sessions_for(store, day)
}

pub fn clear_day(store: &impl StateStore, day: &str) {
    documents::clear_sessions(store, day);
}

/// Human label in the form `09:15 - 09:40 (25 Min.) - Client`.
pub fn session_label(session: &Session) -> String {
    let minutes = (session.duration_seconds() + 30) / 60;
    format!(
        "{} - {} ({} Min.) - {}",
        format_local_hm(session.start),
        format_local_hm(session.end),
        minutes,
        session.project_name
    )
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::storage::store::JsonFileStore;

    use super::*;

    const DAY: &str = "2018-07-04";

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap()
    }

    fn project() -> ProjectEntry {
        ProjectEntry {
            id: "p1".into(),
            name: "Client".into(),
            color: "#007bff".into(),
        }
    }

    #[test]
    fn short_and_degenerate_intervals_are_dropped() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        record_session(&store, DAY, project(), t0(), t0());
        record_session(&store, DAY, project(), t0(), t0() - Duration::seconds(5));
        assert!(sessions(&store, DAY).is_empty());

        record_session(&store, DAY, project(), t0(), t0() + Duration::seconds(1));
        assert_eq!(sessions(&store, DAY).len(), 1);
        Ok(())
    }

    #[test]
    fn recorded_sessions_keep_start_before_end() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        record_session(&store, DAY, project(), t0(), t0() + Duration::seconds(4));
        record_session(
            &store,
            DAY,
            project(),
            t0() + Duration::seconds(10),
            t0() + Duration::seconds(75),
        );

        let recorded = sessions(&store, DAY);
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|s| s.start < s.end));
        assert_eq!(recorded[0].duration_seconds(), 4);
        assert_eq!(recorded[1].duration_seconds(), 65);
        Ok(())
    }

    #[test]
    fn clearing_today_spares_history() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        record_session(
            &store,
            "2018-07-03",
            project(),
            t0() - Duration::days(1),
            t0() - Duration::days(1) + Duration::seconds(30),
        );
        record_session(&store, DAY, project(), t0(), t0() + Duration::seconds(30));

        clear_day(&store, DAY);
        assert!(sessions(&store, DAY).is_empty());
        assert_eq!(sessions(&store, "2018-07-03").len(), 1);
        Ok(())
    }

    #[test]
    fn labels_show_rounded_minutes_and_project() {
        let session = Session {
            start: t0(),
            end: t0() + Duration::seconds(25 * 60 + 20),
            project_id: "p1".into(),
            project_name: "Client".into(),
            project_color: "#007bff".into(),
        };
        let label = session_label(&session);
        assert!(label.contains("(25 Min.)"));
        assert!(label.ends_with("- Client"));
    }
}
