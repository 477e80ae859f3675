/*!
Synchronization between a local project and a remote server.

Both engines try the single-request bulk path first and fall back to per-entity
legacy calls once when it fails. The decision itself lives in [`strategy`] so it
can be tested without any network.
*/

pub mod export;
pub mod import;
pub mod strategy;

pub use export::{ExportEngine, ExportSummary};
pub use import::{ImportEngine, ImportReport};
pub use strategy::{choose_strategy, BulkOutcome, Strategy, StrategyState};

use crate::api::{FragmentsApi, Session};
use crate::FragkitError;
use tokio::sync::Mutex;

/// Classify a failed bulk attempt
pub(crate) fn bulk_failure(error: &FragkitError) -> BulkOutcome {
    match error {
        FragkitError::Api { message } => BulkOutcome::ServerError(message.clone()),
        other => BulkOutcome::Failed(other.to_string()),
    }
}

/// Session shared by the calls of one engine, replaced after every refresh
pub(crate) struct CachedSession(Mutex<Session>);

impl CachedSession {
    pub(crate) fn new(session: Session) -> Self {
        Self(Mutex::new(session))
    }

    pub(crate) async fn get(&self) -> Session {
        self.0.lock().await.clone()
    }

    /// Refresh through `api`, keeping the result for the next call
    pub(crate) async fn refresh<A: FragmentsApi + ?Sized>(&self, api: &A) -> Session {
        let mut session = self.0.lock().await;
        let refreshed = api.refresh_session(session.clone()).await;
        *session = refreshed.clone();
        refreshed
    }
}
