use std::{io::Write, time::Duration};

use anyhow::Result;
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{engine::WorkTracker, storage::store::StateStore};

use super::status;

/// Detects signals sent to the process. On Windows detached processes can't
/// detect signals sent to them, but the watch loop always runs attached to a
/// console, so ctrl-c is enough here.
async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
    };
}

/// Runs the live view: a tick every second republishes the counters and the
/// background drift correction runs on its wall-clock cadence. The running
/// state is saved on the way out, so the timer keeps counting across runs.
pub async fn run_watch<S: StateStore>(mut tracker: WorkTracker<S>) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(detect_shutdown(shutdown.clone()));

    let mut tick_point = tracker.clock().instant();
    loop {
        tick_point += Duration::from_secs(1);

        tracker.tick();
        let line = status::status_line(&tracker.snapshot());
        print!("\r\x1b[2K{line}");
        std::io::stdout().flush()?;

        select! {
            // Cancelation means we stop the event loop. State is persisted
            // below so nothing is lost, including a running timer.
            _ = shutdown.cancelled() => {
                break;
            }
            _ = tracker.clock().sleep_until(tick_point) => ()
        }
    }

    tracker.save();
    println!();
    Ok(())
}
