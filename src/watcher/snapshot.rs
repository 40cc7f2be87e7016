//! Tracking of admitted workspace entries.
//!
//! The debouncer only says "something happened at P". Comparing P against
//! what was last seen there tells us whether it was created, modified or
//! removed, and whether it is a file or a directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::classifier::WatchFilter;
use super::events::{ChangeKind, WatchEvent};

/// File or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    fn of(path: &Path) -> Option<Self> {
        std::fs::symlink_metadata(path).ok().map(|meta| {
            if meta.is_dir() {
                Self::Dir
            } else {
                Self::File
            }
        })
    }

    const fn created(self) -> ChangeKind {
        match self {
            Self::File => ChangeKind::Created,
            Self::Dir => ChangeKind::DirCreated,
        }
    }

    const fn removed(self) -> ChangeKind {
        match self {
            Self::File => ChangeKind::Deleted,
            Self::Dir => ChangeKind::DirRemoved,
        }
    }
}

/// Known entries under the watch root.
#[derive(Debug)]
pub struct EntrySnapshot {
    filter: WatchFilter,
    entries: HashMap<PathBuf, EntryKind>,
}

impl EntrySnapshot {
    /// Walk the root and record every admitted entry. Produces no events.
    #[must_use]
    pub fn scan(filter: WatchFilter) -> Self {
        let mut entries = HashMap::new();
        let root = filter.root().to_path_buf();
        entries.insert(root.clone(), EntryKind::Dir);
        record_tree(&filter, &root, &mut entries, |_, _| {});

        tracing::debug!(
            root = %root.display(),
            entries = entries.len(),
            "Initial snapshot complete"
        );

        Self { filter, entries }
    }

    /// Root the snapshot was taken of.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.filter.root()
    }

    /// Number of tracked entries, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kind last recorded for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<EntryKind> {
        self.entries.get(path).copied()
    }

    /// Turn one debounced batch of changed paths into filtered events.
    ///
    /// Each path is reported at most once per batch, except that an entry
    /// replaced by one of the other kind is reported removed and then created.
    /// Parents are handled before their children.
    pub fn apply(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> Vec<WatchEvent> {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();
        paths.dedup();

        let mut batch = Batch::default();
        for path in paths {
            if batch.seen.contains(&path) {
                continue;
            }

            let on_disk = EntryKind::of(&path);
            let known = self.get(&path);
            let is_dir = on_disk.or(known) == Some(EntryKind::Dir);
            if self.filter.admit(&path, is_dir).is_none() {
                continue;
            }

            match (on_disk, known) {
                (Some(kind), None) => self.created(&path, kind, &mut batch),
                (Some(EntryKind::File), Some(EntryKind::File)) => {
                    batch.push(&self.filter, &path, ChangeKind::Modified);
                }
                (Some(EntryKind::Dir), Some(EntryKind::Dir)) | (None, None) => {}
                (Some(kind), Some(_)) => {
                    self.removed(&path, &mut batch);
                    batch.seen.remove(&path);
                    self.created(&path, kind, &mut batch);
                }
                (None, Some(_)) => self.removed(&path, &mut batch),
            }
        }

        batch.events
    }

    fn created(&mut self, path: &Path, kind: EntryKind, batch: &mut Batch) {
        if !batch.push(&self.filter, path, kind.created()) {
            return;
        }
        self.entries.insert(path.to_path_buf(), kind);

        if kind == EntryKind::Dir {
            let filter = &self.filter;
            let entries = &mut self.entries;
            record_tree(filter, path, entries, |child, child_kind| {
                batch.push(filter, child, child_kind.created());
            });
        }
    }

    fn removed(&mut self, path: &Path, batch: &mut Batch) {
        let Some(kind) = self.entries.remove(path) else {
            return;
        };

        if kind == EntryKind::Dir {
            let mut descendants: Vec<(PathBuf, EntryKind)> = self
                .entries
                .iter()
                .filter(|(p, _)| p.starts_with(path))
                .map(|(p, k)| (p.clone(), *k))
                .collect();
            descendants.sort_by(|a, b| b.0.cmp(&a.0));

            for (child, child_kind) in descendants {
                self.entries.remove(&child);
                batch.push(&self.filter, &child, child_kind.removed());
            }
        }

        batch.push(&self.filter, path, kind.removed());
    }
}

/// Events produced by one debounced batch.
#[derive(Debug, Default)]
struct Batch {
    events: Vec<WatchEvent>,
    seen: HashSet<PathBuf>,
}

impl Batch {
    fn push(&mut self, filter: &WatchFilter, path: &Path, kind: ChangeKind) -> bool {
        if self.seen.contains(path) {
            return false;
        }
        match filter.event(path, kind) {
            Some(event) => {
                self.seen.insert(path.to_path_buf());
                self.events.push(event);
                true
            }
            None => false,
        }
    }
}

/// Walk below `dir`, recording admitted entries not already known.
fn record_tree(
    filter: &WatchFilter,
    dir: &Path,
    entries: &mut HashMap<PathBuf, EntryKind>,
    mut on_new: impl FnMut(&Path, EntryKind),
) {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| filter.admit(entry.path(), entry.file_type().is_dir()).is_some());

    for entry in walker {
        match entry {
            Ok(entry) => {
                let kind = if entry.file_type().is_dir() {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                };
                if entries.insert(entry.path().to_path_buf(), kind).is_none() {
                    on_new(entry.path(), kind);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::classifier::PathClassifier;
    use crate::watcher::events::ReservedFolders;
    use crate::watcher::ignore_rules::IgnoreRuleSet;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn snapshot(root: &Path, patterns: &[&str]) -> EntrySnapshot {
        let mut rules = IgnoreRuleSet::new(root);
        rules.add_patterns(patterns).unwrap();
        let filter = WatchFilter::new(
            PathClassifier::new(root, ReservedFolders::default()),
            Arc::new(rules),
        );
        EntrySnapshot::scan(filter)
    }

    fn kinds(events: &[WatchEvent]) -> Vec<(PathBuf, ChangeKind)> {
        events
            .iter()
            .map(|e| (e.relative_path.clone(), e.kind))
            .collect()
    }

    #[test]
    fn test_scan_records_admitted_entries() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("build")).unwrap();
        fs::write(tmp.path().join("src/a.ts"), "a").unwrap();
        fs::write(tmp.path().join("build/out.js"), "b").unwrap();

        let snap = snapshot(tmp.path(), &["build/"]);

        assert_eq!(snap.get(&tmp.path().join("src")), Some(EntryKind::Dir));
        assert_eq!(snap.get(&tmp.path().join("src/a.ts")), Some(EntryKind::File));
        assert_eq!(snap.get(&tmp.path().join("build")), None);
        assert_eq!(snap.get(&tmp.path().join("build/out.js")), None);
        // root, src, src/a.ts
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn test_create_modify_delete_file() {
        let tmp = TempDir::new().unwrap();
        let mut snap = snapshot(tmp.path(), &[]);
        let file = tmp.path().join("a.ts");

        fs::write(&file, "one").unwrap();
        let events = snap.apply([file.clone()]);
        assert_eq!(kinds(&events), vec![(PathBuf::from("a.ts"), ChangeKind::Created)]);

        fs::write(&file, "two").unwrap();
        let events = snap.apply([file.clone()]);
        assert_eq!(kinds(&events), vec![(PathBuf::from("a.ts"), ChangeKind::Modified)]);

        fs::remove_file(&file).unwrap();
        let events = snap.apply([file.clone()]);
        assert_eq!(kinds(&events), vec![(PathBuf::from("a.ts"), ChangeKind::Deleted)]);

        assert!(snap.apply([file]).is_empty());
    }

    #[test]
    fn test_new_directory_reports_contents_once() {
        let tmp = TempDir::new().unwrap();
        let mut snap = snapshot(tmp.path(), &[]);
        let dir = tmp.path().join("hai-instructions");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("rule1.md"), "r").unwrap();

        let events = snap.apply([dir.join("rule1.md"), dir.clone(), dir.join("rule1.md")]);

        assert_eq!(
            kinds(&events),
            vec![
                (PathBuf::from("hai-instructions"), ChangeKind::DirCreated),
                (PathBuf::from("hai-instructions/rule1.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_removed_directory_reports_descendants_first() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner/a.md"), "a").unwrap();
        let mut snap = snapshot(tmp.path(), &[]);

        fs::remove_dir_all(&dir).unwrap();
        let events = snap.apply([dir.clone()]);

        assert_eq!(
            kinds(&events),
            vec![
                (PathBuf::from("docs/inner/a.md"), ChangeKind::Deleted),
                (PathBuf::from("docs/inner"), ChangeKind::DirRemoved),
                (PathBuf::from("docs"), ChangeKind::DirRemoved),
            ]
        );
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_ignored_paths_produce_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut snap = snapshot(tmp.path(), &["node_modules", "*.log"]);
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(tmp.path().join("debug.log"), "x").unwrap();

        let events = snap.apply([
            tmp.path().join("node_modules"),
            tmp.path().join("node_modules/pkg/index.js"),
            tmp.path().join("debug.log"),
        ]);

        assert!(events.is_empty());
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_whitelisted_file_under_ignored_dir_stays_hidden() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("build")).unwrap();
        fs::write(tmp.path().join("build/keep.js"), "v1").unwrap();
        let mut snap = snapshot(tmp.path(), &["build/", "!build/keep.js"]);
        assert_eq!(snap.len(), 1);

        fs::write(tmp.path().join("build/keep.js"), "v2").unwrap();
        let events = snap.apply([tmp.path().join("build/keep.js")]);

        assert!(events.is_empty());
        assert_eq!(snap.get(&tmp.path().join("build/keep.js")), None);
    }

    #[test]
    fn test_directory_modification_is_silent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        let mut snap = snapshot(tmp.path(), &[]);

        assert!(snap.apply([tmp.path().join("src")]).is_empty());
        assert!(snap.apply([tmp.path().to_path_buf()]).is_empty());
    }

    #[test]
    fn test_file_replaced_by_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thing");
        fs::write(&path, "x").unwrap();
        let mut snap = snapshot(tmp.path(), &[]);

        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        let events = snap.apply([path.clone()]);

        assert_eq!(
            kinds(&events),
            vec![
                (PathBuf::from("thing"), ChangeKind::Deleted),
                (PathBuf::from("thing"), ChangeKind::DirCreated),
            ]
        );
        assert_eq!(snap.get(&path), Some(EntryKind::Dir));
    }

    #[test]
    fn test_outside_root_is_never_tracked() {
        let tmp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("x.ts"), "x").unwrap();
        let mut snap = snapshot(tmp.path(), &[]);

        assert!(snap.apply([other.path().join("x.ts")]).is_empty());
        assert_eq!(snap.get(&other.path().join("x.ts")), None);
    }
}
