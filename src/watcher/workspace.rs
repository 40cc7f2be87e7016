//! Workspace watcher: ignore rules, watch session and router wired together.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;

use super::classifier::{PathClassifier, WatchFilter};
use super::consumer::{ConsumerHandle, WorkspaceConsumer};
use super::ignore_rules::IgnoreRuleSet;
use super::router::EventRouter;
use super::session::{WatchSession, WatcherConfig};
use super::snapshot::EntrySnapshot;
use crate::error::WatcherError;
use crate::observability::spans;
use crate::{Error, Result};

/// Watches a workspace and keeps a consumer informed of relevant changes.
///
/// Holds the consumer weakly. After [`dispose`](Self::dispose) the consumer
/// receives nothing more, even for events already in flight.
pub struct WorkspaceWatcher {
    session: WatchSession,
    router: Arc<EventRouter>,
    task: Option<JoinHandle<()>>,
}

impl WorkspaceWatcher {
    /// Load ignore rules for the root, then start watching it.
    ///
    /// Rules are fully loaded before the OS watch exists, so no change is
    /// ever judged against a partial rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be resolved or watched, or an
    /// extra ignore pattern is invalid.
    pub async fn start<C: WorkspaceConsumer + 'static>(
        config: &WatcherConfig,
        consumer: &Arc<C>,
    ) -> Result<Self> {
        let root = tokio::fs::canonicalize(&config.root)
            .await
            .map_err(|e| WatcherError::watch_failed(&config.root, e))?;
        if !tokio::fs::metadata(&root).await?.is_dir() {
            return Err(WatcherError::watch_failed(&root, "not a directory").into());
        }

        let mut rules = IgnoreRuleSet::load(&root, &config.ignore).await;
        rules.add_patterns(&config.extra_ignore_patterns)?;
        tracing::debug!(rules = rules.patterns().len(), "Ignore rules loaded");

        let filter = WatchFilter::new(
            PathClassifier::new(&root, config.reserved.clone()),
            Arc::new(rules),
        );
        let snapshot = tokio::task::spawn_blocking(move || EntrySnapshot::scan(filter))
            .await
            .map_err(|e| Error::internal(format!("Initial scan task failed: {e}")))?;

        let router = Arc::new(EventRouter::new(ConsumerHandle::new(consumer)));
        let (session, events) =
            WatchSession::from_snapshot(snapshot, config.debounce, config.channel_capacity)?;

        let task = tokio::spawn(
            Arc::clone(&router)
                .run(events)
                .instrument(spans::session_span(&root)),
        );

        Ok(Self {
            session,
            router,
            task: Some(task),
        })
    }

    /// Stop watching and cut the consumer off. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.router.handle().detach();
        self.session.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Check if the watch is still active.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Resolved watch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.session.root()
    }

    /// Router used for dispatch.
    #[must_use]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}
