//! Debounced recursive watch over one workspace root using notify-rs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;

use super::classifier::WatchFilter;
use super::events::{ReservedFolders, WatchEvent};
use super::ignore_rules::IgnoreSources;
use super::snapshot::EntrySnapshot;
use crate::error::WatcherError;
use crate::Result;

/// Debounce window for file events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// Batches buffered between the watch thread and the router.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch.
    pub root: PathBuf,
    /// Debounce duration.
    pub debounce: Duration,
    /// Where ignore rules come from.
    pub ignore: IgnoreSources,
    /// Patterns appended after the built-in rules.
    pub extra_ignore_patterns: Vec<String>,
    /// Folder names with routing significance.
    pub reserved: ReservedFolders,
    /// Capacity of the event channel.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            debounce: DEFAULT_DEBOUNCE,
            ignore: IgnoreSources::default(),
            extra_ignore_patterns: Vec::new(),
            reserved: ReservedFolders::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Stream of filtered event batches produced by a [`WatchSession`].
pub type EventStream = mpsc::Receiver<Vec<WatchEvent>>;

/// A running recursive watch.
///
/// Entries present when the session starts produce no events. Dropping the
/// session stops it.
pub struct WatchSession {
    root: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl WatchSession {
    /// Start watching the filter's root.
    ///
    /// Every changed path goes through `filter` before it can become an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory or the OS watch cannot
    /// be established.
    pub fn start(
        filter: WatchFilter,
        debounce: Duration,
        channel_capacity: usize,
    ) -> Result<(Self, EventStream)> {
        if !filter.root().is_dir() {
            return Err(
                WatcherError::watch_failed(filter.root(), "directory does not exist").into(),
            );
        }

        Self::from_snapshot(EntrySnapshot::scan(filter), debounce, channel_capacity)
    }

    /// Start watching from an initial snapshot taken elsewhere.
    ///
    /// Lets async callers run the directory walk off the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watch cannot be established.
    pub fn from_snapshot(
        mut snapshot: EntrySnapshot,
        debounce: Duration,
        channel_capacity: usize,
    ) -> Result<(Self, EventStream)> {
        let root = snapshot.root().to_path_buf();
        let (batch_tx, event_rx) = mpsc::channel(channel_capacity);

        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let batch = snapshot.apply(events.into_iter().map(|event| event.path));
                    if !batch.is_empty() && batch_tx.blocking_send(batch).is_err() {
                        tracing::debug!("Event receiver dropped, discarding batch");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Watch error");
                }
            }
        })
        .map_err(|e| WatcherError::watch_failed(&root, e))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::watch_failed(&root, e))?;

        tracing::info!(
            path = %root.display(),
            debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
            "Watching directory"
        );

        Ok((
            Self {
                root,
                debouncer: Some(debouncer),
            },
            event_rx,
        ))
    }

    /// Release the OS watch. Safe to call any number of times.
    ///
    /// A batch already past the debounce boundary may still be sent.
    pub fn stop(&mut self) {
        if let Some(debouncer) = self.debouncer.take() {
            drop(debouncer);
            tracing::info!(path = %self.root.display(), "Stopped watching directory");
        }
    }

    /// Check if the OS watch is still held.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.debouncer.is_some()
    }

    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop();
    }
}
