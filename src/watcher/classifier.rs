//! Resolving changed paths against the watch root.
//!
//! [`PathClassifier`] is a pure function of its inputs. [`WatchFilter`] adds
//! the ignore rules and decides whether a candidate path may be delivered.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::events::{ChangeKind, ReservedFolder, ReservedFolders, WatchEvent};
use super::ignore_rules::IgnoreRuleSet;

/// Where a candidate path sits relative to the watch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClass {
    /// Path relative to the root; empty for the root itself.
    pub relative_path: PathBuf,
    /// Path resolves outside the root.
    pub outside_root: bool,
    /// Some segment of the relative path is the instructions folder.
    ///
    /// Only segments below the watch root count. A `hai-instructions` folder
    /// that contains the root itself is deliberately ignored.
    pub is_instructions_path: bool,
    /// Reserved folder named by the final segment.
    pub reserved_folder: Option<ReservedFolder>,
}

/// Computes root-relative paths and reserved folder matches.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    root: PathBuf,
    reserved: ReservedFolders,
}

impl PathClassifier {
    /// Create a classifier for `root`.
    pub fn new(root: impl AsRef<Path>, reserved: ReservedFolders) -> Self {
        Self {
            root: normalize(root.as_ref()),
            reserved,
        }
    }

    /// Watch root this classifier resolves against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify an absolute path.
    ///
    /// `..` segments are resolved lexically first, so a path that walks back
    /// out of the root is reported as `outside_root`.
    #[must_use]
    pub fn classify(&self, path: &Path) -> PathClass {
        let normalized = normalize(path);
        let Ok(relative) = normalized.strip_prefix(&self.root) else {
            return PathClass {
                relative_path: PathBuf::new(),
                outside_root: true,
                is_instructions_path: false,
                reserved_folder: None,
            };
        };

        if relative.as_os_str().is_empty() {
            return PathClass {
                relative_path: PathBuf::new(),
                outside_root: false,
                is_instructions_path: false,
                reserved_folder: None,
            };
        }

        let reserved_folder = relative
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.reserved.lookup(name));

        PathClass {
            relative_path: relative.to_path_buf(),
            outside_root: false,
            is_instructions_path: self.reserved.contains_instructions(relative),
            reserved_folder,
        }
    }
}

/// Filter predicate consulted for every candidate path before delivery.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    classifier: PathClassifier,
    rules: Arc<IgnoreRuleSet>,
}

impl WatchFilter {
    /// Create a filter from a classifier and loaded rules.
    #[must_use]
    pub fn new(classifier: PathClassifier, rules: Arc<IgnoreRuleSet>) -> Self {
        Self { classifier, rules }
    }

    /// Watch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.classifier.root()
    }

    /// Ignore rules in use.
    #[must_use]
    pub fn rules(&self) -> &IgnoreRuleSet {
        &self.rules
    }

    /// Decide whether `path` may be delivered.
    ///
    /// Returns `None` for blank paths, paths outside the root and ignored
    /// paths. Never fails.
    #[must_use]
    pub fn admit(&self, path: &Path, is_dir: bool) -> Option<PathClass> {
        if path.as_os_str().to_string_lossy().trim().is_empty() {
            tracing::warn!("Ignoring empty or invalid path");
            return None;
        }

        let class = self.classifier.classify(path);
        if class.outside_root {
            tracing::warn!(
                path = %path.display(),
                root = %self.root().display(),
                "Path is outside the watch root"
            );
            return None;
        }

        if self.rules.is_ignored_entry(&class.relative_path, is_dir) {
            tracing::trace!(path = %path.display(), "Path ignored by rules");
            return None;
        }

        Some(class)
    }

    /// Run `path` through the filter and build the event to deliver.
    #[must_use]
    pub fn event(&self, path: &Path, kind: ChangeKind) -> Option<WatchEvent> {
        let class = self.admit(path, kind.is_dir())?;
        Some(WatchEvent {
            path: path.to_path_buf(),
            relative_path: class.relative_path,
            kind,
            is_instructions_path: class.is_instructions_path,
            reserved_folder: if kind.is_dir() {
                class.reserved_folder
            } else {
                None
            },
        })
    }
}

/// Resolve `.` and `..` segments without touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PathClassifier {
        PathClassifier::new("/proj", ReservedFolders::default())
    }

    fn filter(patterns: &[&str]) -> WatchFilter {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(patterns).unwrap();
        WatchFilter::new(classifier(), Arc::new(rules))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/./b")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_classify_regular_path() {
        let class = classifier().classify(Path::new("/proj/src/a.ts"));
        assert_eq!(class.relative_path, PathBuf::from("src/a.ts"));
        assert!(!class.outside_root);
        assert!(!class.is_instructions_path);
        assert_eq!(class.reserved_folder, None);
    }

    #[test]
    fn test_classify_root_itself() {
        let class = classifier().classify(Path::new("/proj"));
        assert!(class.relative_path.as_os_str().is_empty());
        assert!(!class.outside_root);
        assert!(!class.is_instructions_path);
        assert_eq!(class.reserved_folder, None);
    }

    #[test]
    fn test_classify_outside_root() {
        let c = classifier();
        assert!(c.classify(Path::new("/other/file.rs")).outside_root);
        assert!(c.classify(Path::new("/proj/../etc/passwd")).outside_root);
        assert!(c.classify(Path::new("/project-b/file.rs")).outside_root);
        assert!(c.classify(Path::new("relative/file.rs")).outside_root);
        assert!(!c.classify(Path::new("/proj/src/../lib.rs")).outside_root);
    }

    #[test]
    fn test_classify_instructions_and_reserved() {
        let c = classifier();

        let rule = c.classify(Path::new("/proj/hai-instructions/rule1.md"));
        assert!(rule.is_instructions_path);
        assert_eq!(rule.reserved_folder, None);

        let folder = c.classify(Path::new("/proj/deep/er/hai-instructions"));
        assert!(folder.is_instructions_path);
        assert_eq!(folder.reserved_folder, Some(ReservedFolder::Instructions));

        let vscode = c.classify(Path::new("/proj/.vscode"));
        assert!(!vscode.is_instructions_path);
        assert_eq!(vscode.reserved_folder, Some(ReservedFolder::EditorSettings));

        let lookalike = c.classify(Path::new("/proj/my-hai-instructions/a.md"));
        assert!(!lookalike.is_instructions_path);
    }

    #[test]
    fn test_instructions_detection_ignores_segments_above_root() {
        let c = PathClassifier::new("/home/hai-instructions/proj", ReservedFolders::default());
        let class = c.classify(Path::new("/home/hai-instructions/proj/src/a.ts"));
        assert!(!class.is_instructions_path);
    }

    #[test]
    fn test_admit_rejects_blank_and_outside() {
        let f = filter(&[]);
        assert!(f.admit(Path::new(""), false).is_none());
        assert!(f.admit(Path::new("   "), false).is_none());
        assert!(f.admit(Path::new("/elsewhere/a.ts"), false).is_none());
        assert!(f.admit(Path::new("/proj/src/a.ts"), false).is_some());
    }

    #[test]
    fn test_admit_applies_rules() {
        let f = filter(&["build/", "node_modules"]);
        assert!(f.admit(Path::new("/proj/build/out.js"), false).is_none());
        assert!(f.admit(Path::new("/proj/build"), true).is_none());
        assert!(f.admit(Path::new("/proj/node_modules"), true).is_none());
        assert!(f.admit(Path::new("/proj/src/a.ts"), false).is_some());
    }

    #[test]
    fn test_admit_root_even_when_everything_ignored() {
        let f = filter(&["*"]);
        assert!(f.admit(Path::new("/proj"), true).is_some());
        assert!(f.admit(Path::new("/proj/a.txt"), false).is_none());
    }

    #[test]
    fn test_event_reserved_folder_only_for_directories() {
        let f = filter(&[]);

        let dir = f
            .event(Path::new("/proj/hai-instructions"), ChangeKind::DirCreated)
            .unwrap();
        assert_eq!(dir.reserved_folder, Some(ReservedFolder::Instructions));

        let file = f
            .event(Path::new("/proj/notes/hai-instructions"), ChangeKind::Created)
            .unwrap();
        assert_eq!(file.reserved_folder, None);
        assert!(file.is_instructions_path);
    }
}
