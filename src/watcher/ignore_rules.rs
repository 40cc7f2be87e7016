//! Gitignore-style rules deciding which workspace paths are ignored.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::WatcherError;
use crate::Result;

/// Name of the ignore file read from the watch root.
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Directory the consumer writes its index into. Always excluded.
pub const CONTEXT_DIRECTORY: &str = ".hai";

/// Directories excluded regardless of the ignore file.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "out",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "coverage",
    ".next",
];

/// Where an [`IgnoreRuleSet`] takes its rules from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSources {
    /// Ignore file name, resolved against the watch root.
    pub ignore_file: String,
    /// Built-in directory exclusions.
    pub excluded_dirs: Vec<String>,
    /// Context storage directory name.
    pub context_dir: String,
}

impl Default for IgnoreSources {
    fn default() -> Self {
        Self {
            ignore_file: IGNORE_FILE_NAME.to_string(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string).collect(),
            context_dir: CONTEXT_DIRECTORY.to_string(),
        }
    }
}

/// Ordered, additive set of ignore rules for one watch root.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    root: PathBuf,
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreRuleSet {
    /// Create a rule set with no rules. Nothing is ignored.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// Load rules for `root`: the ignore file first (if readable), then the
    /// built-in exclusions and the context directory.
    ///
    /// A missing or unreadable ignore file is not an error. Lines that do not
    /// compile are skipped with a warning.
    pub async fn load(root: impl AsRef<Path>, sources: &IgnoreSources) -> Self {
        let mut rules = Self::new(root);
        let ignore_path = rules.root.join(&sources.ignore_file);

        match tokio::fs::read_to_string(&ignore_path).await {
            Ok(content) => {
                let lines = parse_ignore_file(&content);
                tracing::debug!(
                    path = %ignore_path.display(),
                    rules = lines.len(),
                    "Loaded ignore file"
                );
                rules.extend_lenient(lines);
            }
            Err(e) => {
                tracing::info!(
                    path = %ignore_path.display(),
                    error = %e,
                    "No ignore file found, using default exclusions"
                );
            }
        }

        rules.extend_lenient(
            sources
                .excluded_dirs
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(sources.context_dir.as_str())),
        );

        rules
    }

    /// Append patterns, failing on the first one that does not compile.
    ///
    /// Patterns accepted before the failing one stay in the set.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not valid gitignore syntax.
    pub fn add_patterns<I, S>(&mut self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Ok(());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Err(e) = self.validate(pattern) {
                result = Err(WatcherError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                }
                .into());
                break;
            }
            self.patterns.push(pattern.to_string());
        }
        self.rebuild();
        result
    }

    /// Check if a path relative to the root is ignored, treating it as a file.
    ///
    /// The root itself (empty path) is never ignored.
    #[must_use]
    pub fn is_ignored(&self, relative: impl AsRef<Path>) -> bool {
        self.is_ignored_entry(relative.as_ref(), false)
    }

    /// Check if a path relative to the root is ignored.
    ///
    /// A path is ignored when any of its parent directories is ignored, or
    /// when it matches itself. As with git, a negated pattern cannot
    /// re-include a path whose parent directory is excluded.
    #[must_use]
    pub fn is_ignored_entry(&self, relative: &Path, is_dir: bool) -> bool {
        if relative.as_os_str().is_empty() || relative.has_root() {
            return false;
        }
        let parent_ignored = relative
            .ancestors()
            .skip(1)
            .take_while(|parent| !parent.as_os_str().is_empty())
            .any(|parent| self.matcher.matched(parent, true).is_ignore());

        parent_ignored || self.matcher.matched(relative, is_dir).is_ignore()
    }

    /// Patterns in evaluation order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Root the patterns are anchored to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extend_lenient<'a>(&mut self, patterns: impl IntoIterator<Item = &'a str>) {
        for pattern in patterns {
            match self.validate(pattern) {
                Ok(()) => self.patterns.push(pattern.to_string()),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Skipping invalid ignore pattern");
                }
            }
        }
        self.rebuild();
    }

    fn validate(&self, pattern: &str) -> std::result::Result<(), ignore::Error> {
        GitignoreBuilder::new(&self.root)
            .add_line(None, pattern)
            .map(|_| ())
    }

    fn rebuild(&mut self) {
        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid ignore pattern");
            }
        }
        match builder.build() {
            Ok(matcher) => self.matcher = matcher,
            Err(e) => tracing::error!(error = %e, "Failed to compile ignore rules, keeping previous set"),
        }
    }
}

/// Split ignore file content into rule lines, dropping blanks and comments.
#[must_use]
pub fn parse_ignore_file(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ignore_file() {
        let content = "# build output\nbuild/\n\n   \n*.log\r\n#another\n!keep.log\n";
        assert_eq!(
            parse_ignore_file(content),
            vec!["build/", "*.log", "!keep.log"]
        );
    }

    #[test]
    fn test_empty_rule_set_ignores_nothing() {
        let rules = IgnoreRuleSet::new("/proj");
        assert!(!rules.is_ignored("node_modules/pkg/index.js"));
        assert!(rules.patterns().is_empty());
    }

    #[tokio::test]
    async fn test_load_with_ignore_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "build/\n# comment\n*.log\n").unwrap();

        let rules = IgnoreRuleSet::load(tmp.path(), &IgnoreSources::default()).await;

        assert!(rules.is_ignored("build/out.js"));
        assert!(rules.is_ignored("debug.log"));
        assert!(rules.is_ignored("src/nested/trace.log"));
        assert!(rules.is_ignored("node_modules/pkg/index.js"));
        assert!(rules.is_ignored(".hai/index.db"));
        assert!(!rules.is_ignored("src/a.ts"));
        assert!(!rules.is_ignored("hai-instructions/rule1.md"));
        assert_eq!(rules.patterns()[0], "build/");
    }

    #[tokio::test]
    async fn test_load_without_ignore_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();

        let rules = IgnoreRuleSet::load(tmp.path(), &IgnoreSources::default()).await;

        assert_eq!(rules.patterns().len(), DEFAULT_EXCLUDED_DIRS.len() + 1);
        assert_eq!(rules.patterns().last().unwrap(), CONTEXT_DIRECTORY);
        assert!(rules.is_ignored("node_modules/left-pad/index.js"));
        assert!(rules.is_ignored("packages/web/node_modules/x.js"));
        assert!(!rules.is_ignored("build/out.js"));
    }

    #[tokio::test]
    async fn test_dir_only_pattern_needs_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "build/\n").unwrap();

        let rules = IgnoreRuleSet::load(tmp.path(), &IgnoreSources::default()).await;

        assert!(rules.is_ignored_entry(Path::new("build"), true));
        assert!(!rules.is_ignored_entry(Path::new("build"), false));
    }

    #[tokio::test]
    async fn test_root_is_never_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*\n").unwrap();

        let rules = IgnoreRuleSet::load(tmp.path(), &IgnoreSources::default()).await;

        assert!(!rules.is_ignored(""));
        assert!(!rules.is_ignored_entry(Path::new(""), true));
        assert!(rules.is_ignored("anything.txt"));
    }

    #[test]
    fn test_is_ignored_is_idempotent() {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(["*.tmp", "cache/"]).unwrap();

        for path in ["a.tmp", "cache/x", "src/main.rs", ""] {
            let first = rules.is_ignored(path);
            for _ in 0..5 {
                assert_eq!(rules.is_ignored(path), first, "path {path:?}");
            }
        }
    }

    #[test]
    fn test_add_patterns_is_additive() {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(["*.tmp"]).unwrap();
        rules.add_patterns(["*.bak"]).unwrap();

        assert_eq!(rules.patterns(), ["*.tmp", "*.bak"]);
        assert!(rules.is_ignored("a.tmp"));
        assert!(rules.is_ignored("b.bak"));
    }

    #[test]
    fn test_negated_pattern_whitelists() {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(["*.log", "!keep.log"]).unwrap();

        assert!(rules.is_ignored("drop.log"));
        assert!(!rules.is_ignored("keep.log"));
    }

    #[test]
    fn test_negation_cannot_reinclude_under_ignored_dir() {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(["build/", "!build/keep.js"]).unwrap();

        assert!(rules.is_ignored("build/keep.js"));
        assert!(rules.is_ignored("build/nested/keep.js"));
        assert!(rules.is_ignored_entry(Path::new("build"), true));
    }

    #[test]
    fn test_negation_under_globbed_contents() {
        let mut rules = IgnoreRuleSet::new("/proj");
        rules.add_patterns(["build/*", "!build/keep.js"]).unwrap();

        assert!(!rules.is_ignored_entry(Path::new("build"), true));
        assert!(rules.is_ignored("build/out.js"));
        assert!(!rules.is_ignored("build/keep.js"));
    }

    #[test]
    fn test_add_patterns_rejects_invalid() {
        let mut rules = IgnoreRuleSet::new("/proj");
        let err = rules.add_patterns(["*.tmp", "foo[", "*.bak"]).unwrap_err();

        assert!(err.to_string().contains("foo["));
        assert_eq!(rules.patterns(), ["*.tmp"]);
        assert!(rules.is_ignored("a.tmp"));
    }

    #[tokio::test]
    async fn test_load_skips_invalid_lines() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "foo[\n*.log\n").unwrap();

        let rules = IgnoreRuleSet::load(tmp.path(), &IgnoreSources::default()).await;

        assert!(!rules.patterns().iter().any(|p| p == "foo["));
        assert!(rules.is_ignored("x.log"));
    }
}
