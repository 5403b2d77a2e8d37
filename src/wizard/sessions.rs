//! Expiry of abandoned wizard sessions.
//!
//! Finished sessions are deleted by the finish route; this removes the ones
//! visitors walked away from.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::store::SessionStore;

/// How often the purge task runs.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Delete sessions not saved within `ttl`. Returns the number removed.
pub async fn purge_stale_sessions(
    sessions: &dyn SessionStore,
    ttl: Duration,
) -> Result<u64, DatabaseError> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(ttl)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    sessions.purge_sessions(cutoff).await
}

/// Spawn a background task that periodically purges stale sessions.
pub fn spawn_purge_task(
    sessions: Arc<dyn SessionStore>,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_stale_sessions(sessions.as_ref(), ttl).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Expired abandoned registration sessions"),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use uuid::Uuid;

    use super::*;
    use crate::wizard::state::WizardSession;

    /// Records the cutoff it was asked to purge with.
    #[derive(Default)]
    struct RecordingSessions {
        cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl SessionStore for RecordingSessions {
        async fn load_session(&self, _id: Uuid) -> Result<Option<WizardSession>, DatabaseError> {
            Ok(None)
        }

        async fn save_session(
            &self,
            _id: Uuid,
            _session: &WizardSession,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn delete_session(&self, _id: Uuid) -> Result<bool, DatabaseError> {
            Ok(false)
        }

        async fn purge_sessions(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError> {
            self.cutoffs.lock().unwrap().push(older_than);
            Ok(3)
        }
    }

    #[tokio::test]
    async fn cutoff_is_now_minus_ttl() {
        let store = RecordingSessions::default();
        let before = Utc::now();
        let removed = purge_stale_sessions(&store, Duration::from_secs(3600))
            .await
            .unwrap();
        let after = Utc::now();

        assert_eq!(removed, 3);
        let cutoffs = store.cutoffs.lock().unwrap();
        assert_eq!(cutoffs.len(), 1);
        let cutoff = cutoffs[0];
        assert!(cutoff >= before - chrono::Duration::hours(1));
        assert!(cutoff <= after - chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn huge_ttl_does_not_overflow() {
        let store = RecordingSessions::default();
        purge_stale_sessions(&store, Duration::MAX).await.unwrap();
        assert_eq!(store.cutoffs.lock().unwrap()[0], DateTime::<Utc>::MIN_UTC);
    }
}
