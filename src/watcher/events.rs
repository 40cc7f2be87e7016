//! File system event types and handling.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Default name of the folder holding instruction files.
pub const INSTRUCTIONS_FOLDER: &str = "hai-instructions";

/// Default name of the editor settings folder.
pub const EDITOR_SETTINGS_FOLDER: &str = ".vscode";

/// Kind of change observed for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File was created.
    Created,
    /// File contents changed.
    Modified,
    /// File was deleted.
    Deleted,
    /// Directory was created.
    DirCreated,
    /// Directory was removed.
    DirRemoved,
}

impl ChangeKind {
    /// Check if this change concerns a directory.
    #[must_use]
    pub fn is_dir(self) -> bool {
        matches!(self, Self::DirCreated | Self::DirRemoved)
    }
}

/// Reindex operation requested from the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Change,
    Delete,
}

/// Folder names with routing significance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedFolders {
    /// Folder whose files are instructions rather than indexed code.
    pub instructions: String,
    /// Editor settings folder; removing it clears instruction state.
    pub editor_settings: String,
}

impl Default for ReservedFolders {
    fn default() -> Self {
        Self {
            instructions: INSTRUCTIONS_FOLDER.to_string(),
            editor_settings: EDITOR_SETTINGS_FOLDER.to_string(),
        }
    }
}

impl ReservedFolders {
    /// Which reserved folder, if any, `name` refers to.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ReservedFolder> {
        if name == self.instructions {
            Some(ReservedFolder::Instructions)
        } else if name == self.editor_settings {
            Some(ReservedFolder::EditorSettings)
        } else {
            None
        }
    }

    /// Check if any segment of `relative` is the instructions folder.
    #[must_use]
    pub fn contains_instructions(&self, relative: &Path) -> bool {
        relative
            .components()
            .any(|c| c.as_os_str() == self.instructions.as_str())
    }
}

/// A reserved folder matched against a directory's final segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedFolder {
    Instructions,
    EditorSettings,
}

/// A change that passed filtering, resolved against the watch root.
///
/// Only the classifier builds these, and only for admitted paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path as reported for the change.
    pub path: PathBuf,
    /// Path relative to the watch root; empty for the root itself.
    pub relative_path: PathBuf,
    /// What happened.
    pub kind: ChangeKind,
    /// Path lies somewhere inside the instructions folder.
    pub is_instructions_path: bool,
    /// For directory events, the reserved folder named by the final segment.
    pub reserved_folder: Option<ReservedFolder>,
}

impl WatchEvent {
    /// Check if this event concerns a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}
