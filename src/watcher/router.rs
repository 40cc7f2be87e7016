//! Routing of filtered change events to consumer operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::consumer::{ConsumerHandle, ConsumerOperation};
use super::events::{ChangeKind, FileOperation, ReservedFolder, WatchEvent};

/// Statistics for event routing.
#[derive(Debug, Default)]
pub struct RouterStats {
    pub events_routed: AtomicU64,
    pub operations_dispatched: AtomicU64,
    pub operations_dropped: AtomicU64,
}

impl RouterStats {
    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            events_routed: self.events_routed.load(Ordering::Relaxed),
            operations_dispatched: self.operations_dispatched.load(Ordering::Relaxed),
            operations_dropped: self.operations_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of router stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    pub events_routed: u64,
    pub operations_dispatched: u64,
    pub operations_dropped: u64,
}

/// Turns filtered events into consumer operations.
#[derive(Debug)]
pub struct EventRouter {
    handle: ConsumerHandle,
    stats: RouterStats,
}

impl EventRouter {
    /// Create a router dispatching through `handle`.
    #[must_use]
    pub fn new(handle: ConsumerHandle) -> Self {
        Self {
            handle,
            stats: RouterStats::default(),
        }
    }

    /// Handle to the consumer.
    #[must_use]
    pub fn handle(&self) -> &ConsumerHandle {
        &self.handle
    }

    /// Current stats.
    #[must_use]
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Operations an event calls for, in dispatch order.
    ///
    /// Deleting an instructions file also reindexes it as deleted, so the
    /// consumer sees both calls.
    #[must_use]
    pub fn plan(event: &WatchEvent) -> Vec<ConsumerOperation> {
        let paths = || vec![event.path.clone()];
        let reindex = |operation| ConsumerOperation::Reindex {
            paths: paths(),
            operation,
        };

        match event.kind {
            ChangeKind::Deleted if event.is_instructions_path => vec![
                ConsumerOperation::RemoveFromFileInstructions { paths: paths() },
                reindex(FileOperation::Delete),
            ],
            ChangeKind::Deleted => vec![reindex(FileOperation::Delete)],
            ChangeKind::Created if event.is_instructions_path => {
                vec![ConsumerOperation::AddFileInstruction { paths: paths() }]
            }
            ChangeKind::Created => vec![reindex(FileOperation::Create)],
            ChangeKind::Modified => vec![reindex(FileOperation::Change)],
            ChangeKind::DirCreated => match event.reserved_folder {
                Some(ReservedFolder::Instructions) => {
                    vec![ConsumerOperation::CheckInstructionFilesFromFileSystem]
                }
                _ => Vec::new(),
            },
            ChangeKind::DirRemoved => match event.reserved_folder {
                Some(ReservedFolder::Instructions | ReservedFolder::EditorSettings) => {
                    vec![ConsumerOperation::UpdateFileInstructions { paths: Vec::new() }]
                }
                None => Vec::new(),
            },
        }
    }

    /// Dispatch the operations for `event`.
    ///
    /// Returns how many reached the consumer. Never waits on the consumer.
    pub fn route(&self, event: &WatchEvent) -> usize {
        self.stats.events_routed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %event.path.display(),
            kind = ?event.kind,
            instructions = event.is_instructions_path,
            "Routing event"
        );

        let mut delivered = 0;
        for operation in Self::plan(event) {
            if self.handle.dispatch(&operation) {
                delivered += 1;
                self.stats
                    .operations_dispatched
                    .fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.operations_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        delivered
    }

    /// Route batches until the sending side goes away.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Vec<WatchEvent>>) {
        tracing::info!("Event router started");

        while let Some(batch) = events.recv().await {
            for event in &batch {
                self.route(event);
            }

            let snapshot = self.stats();
            tracing::debug!(
                batch = batch.len(),
                routed = snapshot.events_routed,
                dispatched = snapshot.operations_dispatched,
                dropped = snapshot.operations_dropped,
                "Processed event batch"
            );
        }

        tracing::info!("Event channel closed, router shutting down");
    }
}
