//! Coalescing re-run loop for watch mode.
//!
//! File watchers fire in bursts. [`watch_loop`] turns any number of events that
//! pile up before or during a run into a single follow-up run.

use crate::api::Session;
use crate::Result;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Discard every queued event, returning how many there were
fn drain(events: &mut mpsc::Receiver<()>) -> usize {
    let mut drained = 0;
    while events.try_recv().is_ok() {
        drained += 1;
    }
    drained
}

/// Run `run` once per burst of events until the sender side closes
///
/// Failures are logged and the loop keeps waiting. Returns the number of runs.
pub async fn watch_loop<F, Fut>(mut events: mpsc::Receiver<()>, mut run: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut runs = 0;
    let mut pending = events.recv().await.is_some();

    while pending {
        let coalesced = drain(&mut events);
        debug!(coalesced, "Change detected, running");

        if let Err(e) = run().await {
            error!(error = %e, "Run failed, waiting for the next change");
        }
        runs += 1;

        pending = drain(&mut events) > 0 || events.recv().await.is_some();
    }
    runs
}

/// Banner printed before each run in watch mode
pub fn target_banner(session: &Session, group_id: &str) -> String {
    format!(
        "host: {} | user: {} | company: {} | group: {}",
        session.host,
        session.user_label(),
        session.company_id.as_deref().unwrap_or("-"),
        group_id
    )
}
