use crate::error::{Error, Result};
use crate::matcher::{IgnoreRuleSet, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Version-control metadata names pruned unconditionally, whether they
/// appear as directories or as gitlink files (submodules, worktrees).
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// A file selected for packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute path on disk
    pub absolute_path: PathBuf,

    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,
}

/// Walks the repository root and returns a deterministically ordered
/// list of candidate files.
pub struct FileCollector {
    root: PathBuf,
    excludes: Vec<Pattern>,
    ignore_rules: IgnoreRuleSet,
}

impl FileCollector {
    /// Creates a collector for the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude pattern is invalid or the ignore
    /// file cannot be read.
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_patterns: &[String],
        respect_ignore_file: bool,
    ) -> Result<Self> {
        let root = root.into();
        let excludes = crate::matcher::compile_patterns(exclude_patterns)?;
        let ignore_rules = if respect_ignore_file {
            IgnoreRuleSet::load(&root)?
        } else {
            IgnoreRuleSet::default()
        };

        Ok(Self {
            root,
            excludes,
            ignore_rules,
        })
    }

    /// Enumerates all regular files under the root that survive
    /// exclusion and ignore rules.
    ///
    /// The returned order is stable across repeated invocations on an
    /// unmodified tree regardless of filesystem iteration order: files
    /// are grouped by containing directory, directory groups sorted
    /// lexicographically by relative path, files within a group sorted
    /// by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or is not a
    /// directory, or if the walk fails.
    pub fn collect(&self) -> Result<Vec<CandidateFile>> {
        if !self.root.is_dir() {
            return Err(Error::config(format!(
                "Repository path '{}' does not exist or is not a directory",
                self.root.display()
            )));
        }

        let mut candidates = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_vcs_entry(entry.path()));

        for result in walker {
            let entry = result.map_err(|e| {
                let path = e
                    .path()
                    .map_or_else(|| self.root.clone(), Path::to_path_buf);
                Error::Io {
                    path,
                    message: e.to_string(),
                }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = relative_to(entry.path(), &self.root);

            if self.is_excluded(&relative_path) {
                trace!("Excluded: {}", relative_path);
                continue;
            }

            candidates.push(CandidateFile {
                absolute_path: entry.path().to_path_buf(),
                relative_path,
            });
        }

        // Group by containing directory, then sort within each group.
        candidates.sort_by(|a, b| {
            let (dir_a, name_a) = split_dir_name(&a.relative_path);
            let (dir_b, name_b) = split_dir_name(&b.relative_path);
            dir_a.cmp(dir_b).then_with(|| name_a.cmp(name_b))
        });

        debug!(
            "Collected {} files under {}",
            candidates.len(),
            self.root.display()
        );

        Ok(candidates)
    }

    /// Returns true if a relative path matches any exclude pattern or
    /// ignore rule.
    fn is_excluded(&self, relative_path: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(relative_path))
            || self.ignore_rules.is_ignored(relative_path)
    }
}

fn is_vcs_entry(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| VCS_DIRS.contains(&n))
        .unwrap_or(false)
}

/// Computes the `/`-normalized path of `path` relative to `root`.
pub(crate) fn relative_to(path: &Path, root: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let text = rel.to_string_lossy();
    if text.contains('\\') {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}

fn split_dir_name(relative_path: &str) -> (&str, &str) {
    match relative_path.rfind('/') {
        Some(pos) => (&relative_path[..pos], &relative_path[pos + 1..]),
        None => ("", relative_path),
    }
}
