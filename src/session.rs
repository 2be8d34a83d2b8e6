//! The pack session: drives collection, rendering and artifact
//! splitting for one invocation.

use crate::collector::{CandidateFile, FileCollector};
use crate::config::Config;
use crate::entry::{self, Artifact, FileEntry, PackSummary};
use crate::error::{Error, Result};
use crate::format::{create_formatter, ArtifactStats, Formatter};
use crate::git;
use crate::incremental::{self, IncrementalResolver};
use crate::strip;
use crate::token::{create_counter, TokenCounter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Git and incremental metadata shared by every artifact footer of a run.
#[derive(Debug, Clone, Default)]
struct RunMetadata {
    branch: Option<String>,
    commit: Option<String>,
    base_commit: Option<String>,
    changed_files: Option<usize>,
}

/// Executes one pack invocation against a validated [`Config`].
pub struct PackSession {
    config: Config,
    counter: Arc<dyn TokenCounter>,
}

impl PackSession {
    /// Creates a session for the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let counter = create_counter(config.token_counter.as_deref());
        Self { config, counter }
    }

    /// Runs the pack and returns the aggregate summary.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid configuration, unresolvable
    /// incremental base, token counter failure, or any write failure.
    pub fn run(&self) -> Result<PackSummary> {
        self.config.validate()?;

        let root = &self.config.repository_path;
        let mut metadata = RunMetadata::default();

        if let Some(info) = git::repo_info(root) {
            if !info.branch.is_empty() {
                metadata.branch = Some(info.branch);
            }
            metadata.commit = Some(info.commit);
        }

        let (candidates, output_path) = if self.config.incremental {
            let base_file = self
                .config
                .base_file
                .as_deref()
                .ok_or_else(|| Error::config("Incremental mode requires a base file"))?;

            let resolver = IncrementalResolver::new(root);
            let base = resolver.resolve_base(base_file)?;
            let candidates = resolver.changed_files_since(&base)?;

            info!(
                "Incremental pack: {} files changed since {}",
                candidates.len(),
                base.commit_hash
            );

            metadata.changed_files = Some(candidates.len());
            metadata.base_commit = Some(base.commit_hash);

            (candidates, incremental::diff_output_path(&self.config.output_path))
        } else {
            let collector = FileCollector::new(
                root.clone(),
                &self.config.exclude_patterns,
                self.config.respect_gitignore,
            )?;
            (collector.collect()?, self.config.output_path.clone())
        };

        self.pack(&candidates, &output_path, &metadata)
    }

    fn pack(
        &self,
        candidates: &[CandidateFile],
        output_path: &Path,
        metadata: &RunMetadata,
    ) -> Result<PackSummary> {
        let mut artifacts = Vec::new();
        let mut unreadable_files = Vec::new();
        let mut binary_files = Vec::new();

        let mut writer = ArtifactWriter::open(
            part_path(output_path, artifacts.len()),
            artifacts.len(),
            create_formatter(self.config.format),
        )?;

        for candidate in candidates {
            let path = &candidate.absolute_path;

            if entry::has_binary_extension(path) {
                debug!("Skipping binary (by extension): {}", candidate.relative_path);
                binary_files.push(candidate.relative_path.clone());
                continue;
            }

            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {e}", candidate.relative_path);
                    unreadable_files.push(candidate.relative_path.clone());
                    continue;
                }
            };

            match entry::is_likely_binary(path) {
                Ok(true) => {
                    debug!("Skipping binary (by content): {}", candidate.relative_path);
                    binary_files.push(candidate.relative_path.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Skipping unreadable file {}: {e}", candidate.relative_path);
                    unreadable_files.push(candidate.relative_path.clone());
                    continue;
                }
            }

            let mut content = String::from_utf8_lossy(&bytes).into_owned();
            if self.config.compress {
                content = strip::clean(&content);
            }

            // Token counts come from the file on disk; a counter
            // failure aborts the whole run rather than skewing budgets.
            let token_count = self.counter.count(path, self.config.encoding)?;
            let char_count = content.chars().count();

            let over_budget = self.config.max_tokens > 0
                && writer.artifact.file_count > 0
                && writer.artifact.total_tokens + token_count > self.config.max_tokens;

            if over_budget {
                let finished = writer.finalize(metadata)?;
                info!(
                    "Artifact {} full at {} tokens, opening next part",
                    finished.index, finished.total_tokens
                );
                artifacts.push(finished);

                writer = ArtifactWriter::open(
                    part_path(output_path, artifacts.len()),
                    artifacts.len(),
                    create_formatter(self.config.format),
                )?;
            }

            let entry = FileEntry {
                absolute_path: path.clone(),
                relative_path: candidate.relative_path.clone(),
                size_bytes: bytes.len() as u64,
                char_count,
                token_count,
            };

            writer.write_entry(&candidate.relative_path, &content, entry)?;
        }

        artifacts.push(writer.finalize(metadata)?);

        let summary = PackSummary {
            total_files: artifacts.iter().map(|a| a.file_count).sum(),
            total_chars: artifacts.iter().map(|a| a.total_chars).sum(),
            total_tokens: artifacts.iter().map(|a| a.total_tokens).sum(),
            encoding: self.config.encoding.as_str().to_string(),
            artifacts,
            unreadable_files,
            binary_files,
            base_commit: metadata.base_commit.clone(),
            changed_file_count: metadata.changed_files,
        };

        info!(
            "Packed {} files ({} tokens) into {} artifact(s)",
            summary.total_files,
            summary.total_tokens,
            summary.artifacts.len()
        );

        Ok(summary)
    }
}

/// Streams one artifact to disk: header on open, a fragment per file,
/// footer on finalize.
struct ArtifactWriter {
    out: BufWriter<File>,
    path: PathBuf,
    formatter: Box<dyn Formatter>,
    artifact: Artifact,
}

impl ArtifactWriter {
    fn open(path: PathBuf, index: usize, mut formatter: Box<dyn Formatter>) -> Result<Self> {
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut out = BufWriter::new(file);

        let header = formatter.header();
        out.write_all(header.as_bytes())
            .and_then(|()| out.write_all(formatter.separator().as_bytes()))
            .map_err(|e| Error::io(&path, e))?;

        Ok(Self {
            out,
            artifact: Artifact::new(index, path.clone()),
            path,
            formatter,
        })
    }

    fn write_entry(&mut self, relative_path: &str, content: &str, entry: FileEntry) -> Result<()> {
        let fragment = self.formatter.format_file(relative_path, content);
        self.out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.write_all(self.formatter.separator().as_bytes()))
            .map_err(|e| Error::io(&self.path, e))?;

        self.artifact.record(entry);
        Ok(())
    }

    fn finalize(mut self, metadata: &RunMetadata) -> Result<Artifact> {
        let stats = ArtifactStats {
            file_count: self.artifact.file_count,
            total_chars: self.artifact.total_chars,
            total_tokens: self.artifact.total_tokens,
            branch: metadata.branch.clone(),
            commit: metadata.commit.clone(),
            base_commit: metadata.base_commit.clone(),
            changed_files: metadata.changed_files,
        };

        let footer = self.formatter.footer(&stats);
        self.out
            .write_all(footer.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| Error::io(&self.path, e))?;

        Ok(self.artifact)
    }
}

/// Path of the artifact at `index`: the base path for index 0, a
/// `-part{index + 1}` suffixed sibling otherwise.
fn part_path(base: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());

    let file_name = match base.extension() {
        Some(ext) => format!("{stem}-part{}.{}", index + 1, ext.to_string_lossy()),
        None => format!("{stem}-part{}", index + 1),
    };

    base.with_file_name(file_name)
}
