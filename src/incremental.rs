//! Base-commit recovery and changed-file resolution for incremental packs.

use crate::collector::CandidateFile;
use crate::entry::BaseReference;
use crate::error::{Error, Result};
use crate::git;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Recovers a base revision from a previously produced artifact and
/// computes the changed-file candidate list.
pub struct IncrementalResolver<'a> {
    root: &'a Path,
}

impl<'a> IncrementalResolver<'a> {
    /// Creates a resolver for the given repository root.
    #[must_use]
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Scans a prior artifact for its embedded base commit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incremental`] if the artifact does not exist or
    /// carries no commit-hash-shaped token.
    pub fn resolve_base(&self, prior_artifact: &Path) -> Result<BaseReference> {
        let content = fs::read_to_string(prior_artifact).map_err(|e| {
            Error::incremental(format!(
                "cannot read base file '{}': {e}",
                prior_artifact.display()
            ))
        })?;

        let commit_hash = scan_commit_hash(&content).ok_or_else(|| {
            Error::incremental(format!(
                "no base commit found in '{}'; was it produced by a pack of a git repository?",
                prior_artifact.display()
            ))
        })?;

        info!("Resolved base commit {} from prior artifact", commit_hash);
        Ok(BaseReference { commit_hash })
    }

    /// Returns the files changed since the base, restricted to paths
    /// that currently exist as regular files under the root, in
    /// collection order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Git`] if the root is not a repository or the
    /// base commit is unreachable.
    pub fn changed_files_since(&self, base: &BaseReference) -> Result<Vec<CandidateFile>> {
        let changed = git::changed_paths(self.root, &base.commit_hash)?;

        let mut candidates: Vec<CandidateFile> = changed
            .into_iter()
            .filter_map(|rel| {
                let absolute = self.root.join(&rel);
                if absolute.is_file() {
                    Some(CandidateFile {
                        absolute_path: absolute,
                        relative_path: rel.replace('\\', "/"),
                    })
                } else {
                    debug!("Dropping deleted or non-regular path: {}", rel);
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            let (dir_a, name_a) = split_dir_name(&a.relative_path);
            let (dir_b, name_b) = split_dir_name(&b.relative_path);
            dir_a.cmp(dir_b).then_with(|| name_a.cmp(name_b))
        });

        Ok(candidates)
    }
}

/// Derives the output path for an incremental run by inserting a
/// `_diff_<timestamp>` marker before the extension, so repeated runs
/// never overwrite one another.
#[must_use]
pub fn diff_output_path(base_output: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H%M%S");
    let stem = base_output
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());

    let file_name = match base_output.extension() {
        Some(ext) => format!("{stem}_diff_{timestamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_diff_{timestamp}"),
    };

    base_output.with_file_name(file_name)
}

/// Finds the first commit-hash-shaped token (7-40 hex characters)
/// following a `commit` marker, in any of the formats' footers
/// (`Commit: <hash>`, `"commit": "<hash>"`, `<commit><hash></commit>`).
fn scan_commit_hash(text: &str) -> Option<String> {
    const MARKER: &[u8] = b"commit";
    const SKIP: &[u8] = b": \t\"'>=";

    let bytes = text.as_bytes();
    let mut i = 0;

    while i + MARKER.len() <= bytes.len() {
        if !bytes[i..i + MARKER.len()].eq_ignore_ascii_case(MARKER) {
            i += 1;
            continue;
        }

        let mut j = i + MARKER.len();
        while j < bytes.len() && SKIP.contains(&bytes[j]) {
            j += 1;
        }

        let start = j;
        while j < bytes.len() && bytes[j].is_ascii_hexdigit() {
            j += 1;
        }

        let run = j - start;
        let boundary = j >= bytes.len() || !bytes[j].is_ascii_alphanumeric();
        if (7..=40).contains(&run) && boundary {
            return Some(text[start..j].to_string());
        }

        i += MARKER.len();
    }

    None
}

fn split_dir_name(relative_path: &str) -> (&str, &str) {
    match relative_path.rfind('/') {
        Some(pos) => (&relative_path[..pos], &relative_path[pos + 1..]),
        None => ("", relative_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::{commit_all, git_available, init_repo};
    use assert_fs::prelude::*;

    #[test]
    fn test_scan_plain_footer() {
        let text = "End of Repository Export\nFiles: 2\nCommit: a1b2c3d4e5f60718\n";
        assert_eq!(scan_commit_hash(text).unwrap(), "a1b2c3d4e5f60718");
    }

    #[test]
    fn test_scan_json_footer() {
        let text = r#"{"stats": {"commit": "abcdef1234567", "file_count": 3}}"#;
        assert_eq!(scan_commit_hash(text).unwrap(), "abcdef1234567");
    }

    #[test]
    fn test_scan_xml_footer() {
        let text = "<stats><commit>fedcba9876543</commit></stats>";
        assert_eq!(scan_commit_hash(text).unwrap(), "fedcba9876543");
    }

    #[test]
    fn test_scan_requires_hash_shape() {
        assert!(scan_commit_hash("no markers here").is_none());
        assert!(scan_commit_hash("Commit: short1").is_none());
        assert!(scan_commit_hash("commitment issues").is_none());
        // 41 hex chars is not a hash
        let text = format!("Commit: {}", "a".repeat(41));
        assert!(scan_commit_hash(&text).is_none());
    }

    #[test]
    fn test_scan_first_marker_wins() {
        let text = "Commit: 1111111\nBase commit: 2222222\n";
        assert_eq!(scan_commit_hash(text).unwrap(), "1111111");
    }

    #[test]
    fn test_resolve_base_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let resolver = IncrementalResolver::new(temp.path());
        let result = resolver.resolve_base(&temp.path().join("missing.txt"));
        assert!(matches!(result, Err(Error::Incremental { .. })));
    }

    #[test]
    fn test_resolve_base_no_commit_in_artifact() {
        let temp = assert_fs::TempDir::new().unwrap();
        let prior = temp.child("pack.txt");
        prior.write_str("Repository Export\nno metadata\n").unwrap();

        let resolver = IncrementalResolver::new(temp.path());
        let result = resolver.resolve_base(prior.path());
        assert!(matches!(result, Err(Error::Incremental { .. })));
    }

    #[test]
    fn test_diff_output_path_shape() {
        let path = diff_output_path(Path::new("/out/pack.txt"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pack_diff_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(path.parent().unwrap(), Path::new("/out"));
    }

    #[test]
    fn test_diff_output_path_without_extension() {
        let path = diff_output_path(Path::new("pack"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pack_diff_"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_changed_files_filtered_to_existing() {
        if !git_available() {
            return;
        }

        let temp = assert_fs::TempDir::new().unwrap();
        init_repo(temp.path());
        temp.child("keep.txt").write_str("keep").unwrap();
        temp.child("remove.txt").write_str("remove").unwrap();
        let base = commit_all(temp.path(), "initial");

        temp.child("keep.txt").write_str("keep changed").unwrap();
        std::fs::remove_file(temp.path().join("remove.txt")).unwrap();
        temp.child("added.txt").write_str("added").unwrap();
        commit_all(temp.path(), "second");

        let resolver = IncrementalResolver::new(temp.path());
        let changed = resolver
            .changed_files_since(&BaseReference {
                commit_hash: base,
            })
            .unwrap();

        let paths: Vec<&str> = changed.iter().map(|c| c.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["added.txt", "keep.txt"]);
    }

    #[test]
    fn test_resolve_base_from_real_artifact_text() {
        let temp = assert_fs::TempDir::new().unwrap();
        let prior = temp.child("pack.txt");
        prior
            .write_str(
                "================================================================\n\
                 End of Repository Export\n\
                 Files: 2\n\
                 Branch: main\n\
                 Commit: 0123456789abcdef0123456789abcdef01234567\n",
            )
            .unwrap();

        let resolver = IncrementalResolver::new(temp.path());
        let base = resolver.resolve_base(prior.path()).unwrap();
        assert_eq!(
            base.commit_hash,
            "0123456789abcdef0123456789abcdef01234567"
        );
    }
}
