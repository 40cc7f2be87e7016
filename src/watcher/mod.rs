//! File system watching for a single workspace root.
//!
//! This module provides:
//! - Gitignore-style ignore rules with built-in exclusions
//! - Root-relative path classification and filtering
//! - A debounced recursive watch using notify-rs
//! - Routing of changes to an index/instruction consumer held weakly

mod classifier;
mod consumer;
mod events;
mod ignore_rules;
mod router;
mod session;
mod snapshot;
mod workspace;

pub use classifier::{normalize, PathClass, PathClassifier, WatchFilter};
pub use consumer::{ConsumerHandle, ConsumerOperation, JsonLinesConsumer, WorkspaceConsumer};
pub use events::{
    ChangeKind, FileOperation, ReservedFolder, ReservedFolders, WatchEvent,
    EDITOR_SETTINGS_FOLDER, INSTRUCTIONS_FOLDER,
};
pub use ignore_rules::{
    parse_ignore_file, IgnoreRuleSet, IgnoreSources, CONTEXT_DIRECTORY, DEFAULT_EXCLUDED_DIRS,
    IGNORE_FILE_NAME,
};
pub use router::{EventRouter, RouterStats, RouterStatsSnapshot};
pub use session::{
    EventStream, WatchSession, WatcherConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_DEBOUNCE,
};
pub use snapshot::{EntryKind, EntrySnapshot};
pub use workspace::WorkspaceWatcher;
