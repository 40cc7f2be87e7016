//! The index/instruction consumer and the non-owning handle used to reach it.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::events::FileOperation;

/// Receiver of classified workspace changes.
///
/// Calls are fire-and-forget. Implementations must tolerate paths that no
/// longer exist and handle their own failures.
pub trait WorkspaceConsumer: Send + Sync {
    /// Update the index for `paths`.
    fn reindex(&self, paths: &[PathBuf], operation: FileOperation);

    /// Register new instruction files.
    fn add_file_instruction(&self, paths: &[PathBuf]);

    /// Forget instruction files.
    fn remove_from_file_instructions(&self, paths: &[PathBuf]);

    /// Rescan the instructions folder from disk.
    fn check_instruction_files_from_file_system(&self);

    /// Replace the instruction file list.
    fn update_file_instructions(&self, paths: &[PathBuf]);
}

/// A single consumer call, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConsumerOperation {
    Reindex {
        paths: Vec<PathBuf>,
        operation: FileOperation,
    },
    AddFileInstruction {
        paths: Vec<PathBuf>,
    },
    RemoveFromFileInstructions {
        paths: Vec<PathBuf>,
    },
    CheckInstructionFilesFromFileSystem,
    UpdateFileInstructions {
        paths: Vec<PathBuf>,
    },
}

impl ConsumerOperation {
    /// Invoke the matching method on `consumer`.
    pub fn apply(&self, consumer: &dyn WorkspaceConsumer) {
        match self {
            Self::Reindex { paths, operation } => consumer.reindex(paths, *operation),
            Self::AddFileInstruction { paths } => consumer.add_file_instruction(paths),
            Self::RemoveFromFileInstructions { paths } => {
                consumer.remove_from_file_instructions(paths);
            }
            Self::CheckInstructionFilesFromFileSystem => {
                consumer.check_instruction_files_from_file_system();
            }
            Self::UpdateFileInstructions { paths } => consumer.update_file_instructions(paths),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reindex { .. } => "reindex",
            Self::AddFileInstruction { .. } => "add_file_instruction",
            Self::RemoveFromFileInstructions { .. } => "remove_from_file_instructions",
            Self::CheckInstructionFilesFromFileSystem => {
                "check_instruction_files_from_file_system"
            }
            Self::UpdateFileInstructions { .. } => "update_file_instructions",
        }
    }
}

/// Non-owning reference to a consumer.
///
/// Resolves to nothing once the consumer has been dropped or the handle has
/// been detached. Both are deterministic: there is no collector involved.
pub struct ConsumerHandle {
    target: RwLock<Option<Weak<dyn WorkspaceConsumer>>>,
}

impl ConsumerHandle {
    /// Create a handle that does not keep `consumer` alive.
    pub fn new<C: WorkspaceConsumer + 'static>(consumer: &Arc<C>) -> Self {
        let weak: Weak<dyn WorkspaceConsumer> = Arc::downgrade(consumer) as Weak<C>;
        Self {
            target: RwLock::new(Some(weak)),
        }
    }

    /// Create a handle that resolves to nothing.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            target: RwLock::new(None),
        }
    }

    /// Resolve the consumer, if it is still around.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn WorkspaceConsumer>> {
        self.target.read_recursive().as_ref().and_then(Weak::upgrade)
    }

    /// Check if the consumer can still be reached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.get().is_some()
    }

    /// Stop reaching the consumer. Safe to call repeatedly.
    ///
    /// Blocks until any dispatch already inside the consumer has returned.
    pub fn detach(&self) {
        self.target.write().take();
    }

    /// Invoke `operation` on the consumer, or drop it if the consumer is gone.
    ///
    /// Returns whether the operation was delivered. The read guard is held
    /// for the whole call so [`detach`](Self::detach) cannot overtake it.
    pub fn dispatch(&self, operation: &ConsumerOperation) -> bool {
        let guard = self.target.read_recursive();
        let Some(consumer) = guard.as_ref().and_then(Weak::upgrade) else {
            tracing::trace!(op = operation.name(), "Consumer gone, dropping operation");
            return false;
        };
        operation.apply(consumer.as_ref());
        drop(guard);
        true
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Consumer that writes every operation as one JSON line.
///
/// Lets another process act as the consumer by reading the stream.
pub struct JsonLinesConsumer<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesConsumer<W> {
    /// Create a consumer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Take back the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, operation: &ConsumerOperation) {
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, operation)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::warn!(op = operation.name(), error = %e, "Failed to write operation");
        }
    }
}

impl<W: Write + Send> WorkspaceConsumer for JsonLinesConsumer<W> {
    fn reindex(&self, paths: &[PathBuf], operation: FileOperation) {
        self.emit(&ConsumerOperation::Reindex {
            paths: paths.to_vec(),
            operation,
        });
    }

    fn add_file_instruction(&self, paths: &[PathBuf]) {
        self.emit(&ConsumerOperation::AddFileInstruction {
            paths: paths.to_vec(),
        });
    }

    fn remove_from_file_instructions(&self, paths: &[PathBuf]) {
        self.emit(&ConsumerOperation::RemoveFromFileInstructions {
            paths: paths.to_vec(),
        });
    }

    fn check_instruction_files_from_file_system(&self) {
        self.emit(&ConsumerOperation::CheckInstructionFilesFromFileSystem);
    }

    fn update_file_instructions(&self, paths: &[PathBuf]) {
        self.emit(&ConsumerOperation::UpdateFileInstructions {
            paths: paths.to_vec(),
        });
    }
}
