use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

/// A packed file as recorded in the artifact that holds it.
///
/// Immutable once computed; discarded with its [`Artifact`] after the
/// summary is emitted.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// Absolute path on disk
    pub absolute_path: PathBuf,

    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,

    /// Size of the packed content in bytes
    pub size_bytes: u64,

    /// Character count of the packed (possibly stripped) content
    pub char_count: usize,

    /// Token count reported by the token counter
    pub token_count: usize,
}

/// One complete output file produced by a pack invocation.
///
/// Index 0 lives at the unsuffixed base path; index n > 0 at a
/// `-part{n+1}` suffixed sibling. Never mutated after finalization.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Sequential artifact index (0-based)
    pub index: usize,

    /// Path the artifact was written to
    pub path: PathBuf,

    /// Number of files recorded in this artifact
    pub file_count: usize,

    /// Total characters across all entries
    pub total_chars: usize,

    /// Total tokens across all entries
    pub total_tokens: usize,

    /// Files recorded in this artifact, in emission order
    pub entries: Vec<FileEntry>,
}

impl Artifact {
    /// Creates an empty artifact record for the given index and path.
    #[must_use]
    pub fn new(index: usize, path: PathBuf) -> Self {
        Self {
            index,
            path,
            file_count: 0,
            total_chars: 0,
            total_tokens: 0,
            entries: Vec::new(),
        }
    }

    /// Records a packed file and accumulates running totals.
    pub fn record(&mut self, entry: FileEntry) {
        self.file_count += 1;
        self.total_chars += entry.char_count;
        self.total_tokens += entry.token_count;
        self.entries.push(entry);
    }
}

/// Base revision recovered from a prior artifact's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseReference {
    /// Full or abbreviated commit hash (7-40 hex characters)
    pub commit_hash: String,
}

/// Aggregate result of one pack invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    /// Total files packed across all artifacts
    pub total_files: usize,

    /// Total characters packed
    pub total_chars: usize,

    /// Total tokens packed
    pub total_tokens: usize,

    /// Encoding identifier used for token counting
    pub encoding: String,

    /// All artifacts produced, in index order
    pub artifacts: Vec<Artifact>,

    /// Files skipped because they could not be read
    pub unreadable_files: Vec<String>,

    /// Files skipped because they were classified binary
    pub binary_files: Vec<String>,

    /// Base commit resolved from the prior artifact (incremental mode)
    pub base_commit: Option<String>,

    /// Changed-file count fed into the session (incremental mode)
    pub changed_file_count: Option<usize>,
}

impl PackSummary {
    /// Returns up to `n` packed files with the highest token counts.
    #[must_use]
    pub fn top_files_by_tokens(&self, n: usize) -> Vec<&FileEntry> {
        let mut all: Vec<&FileEntry> = self
            .artifacts
            .iter()
            .flat_map(|a| a.entries.iter())
            .collect();
        all.sort_by(|a, b| b.token_count.cmp(&a.token_count));
        all.truncate(n);
        all
    }

    /// Prints a human-readable summary to stdout.
    pub fn print(&self) {
        println!("\n📊 Pack Summary:");
        println!("────────────────");
        println!("  Total Files: {} files", self.total_files);
        println!("  Total Chars: {} chars", self.total_chars);
        println!(" Total Tokens: {} tokens", self.total_tokens);
        println!("     Encoding: {}", self.encoding);
        for artifact in &self.artifacts {
            println!(
                "       Output: {} ({} files, {} tokens)",
                artifact.path.display(),
                artifact.file_count,
                artifact.total_tokens
            );
        }

        let top = self.top_files_by_tokens(5);
        if !top.is_empty() {
            println!("\n📈 Top {} Files by Token Count:", top.len());
            println!("──────────────────────────────");
            for (i, entry) in top.iter().enumerate() {
                println!(
                    "{}.  {} ({} chars, {} tokens)",
                    i + 1,
                    entry.relative_path,
                    entry.char_count,
                    entry.token_count
                );
            }
        }

        if let (Some(base), Some(changed)) = (&self.base_commit, self.changed_file_count) {
            println!("\n🔀 Incremental:");
            println!("───────────────");
            println!("  Base Commit: {base}");
            println!("Changed Files: {changed}");
        }

        if !self.unreadable_files.is_empty() || !self.binary_files.is_empty() {
            println!("\n⚠️  Unprocessed Files:");
            println!("──────────────────────");
            for file in &self.unreadable_files {
                println!("  - {file} (unreadable)");
            }
            for file in &self.binary_files {
                println!("  - {file} (binary)");
            }
        }

        println!();
    }
}

/// Determines if a file is likely binary by analyzing its content.
///
/// Reads the first 8KB and classifies on null bytes or a low ASCII
/// ratio. Empty files are text.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension marks a known binary format.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    fn entry(rel: &str, chars: usize, tokens: usize) -> FileEntry {
        FileEntry {
            absolute_path: PathBuf::from(rel),
            relative_path: rel.to_string(),
            size_bytes: chars as u64,
            char_count: chars,
            token_count: tokens,
        }
    }

    #[test]
    fn test_artifact_record_accumulates() {
        let mut artifact = Artifact::new(0, PathBuf::from("pack.txt"));
        artifact.record(entry("a.rs", 100, 25));
        artifact.record(entry("b.rs", 60, 15));

        assert_eq!(artifact.file_count, 2);
        assert_eq!(artifact.total_chars, 160);
        assert_eq!(artifact.total_tokens, 40);
        assert_eq!(artifact.entries.len(), 2);
    }

    #[test]
    fn test_top_files_by_tokens() {
        let mut a0 = Artifact::new(0, PathBuf::from("pack.txt"));
        a0.record(entry("small.rs", 10, 3));
        a0.record(entry("large.rs", 400, 100));
        let mut a1 = Artifact::new(1, PathBuf::from("pack-part2.txt"));
        a1.record(entry("medium.rs", 200, 50));

        let summary = PackSummary {
            total_files: 3,
            total_chars: 610,
            total_tokens: 153,
            encoding: "p50k_base".to_string(),
            artifacts: vec![a0, a1],
            unreadable_files: vec![],
            binary_files: vec![],
            base_commit: None,
            changed_file_count: None,
        };

        let top = summary.top_files_by_tokens(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].relative_path, "large.rs");
        assert_eq!(top[1].relative_path, "medium.rs");
    }

    #[test]
    fn test_is_likely_binary_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.txt");
        file.write_str("Hello, world!").unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_null_bytes() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.bin");

        let mut f = File::create(file.path()).unwrap();
        f.write_all(&[0u8; 100]).unwrap();

        assert!(is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_empty_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("empty.txt");
        file.touch().unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_has_binary_extension() {
        assert!(has_binary_extension(Path::new("app.exe")));
        assert!(has_binary_extension(Path::new("image.png")));
        assert!(has_binary_extension(Path::new("archive.zip")));
        assert!(!has_binary_extension(Path::new("code.rs")));
        assert!(!has_binary_extension(Path::new("no_extension")));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = PackSummary {
            total_files: 0,
            total_chars: 0,
            total_tokens: 0,
            encoding: "p50k_base".to_string(),
            artifacts: vec![],
            unreadable_files: vec![],
            binary_files: vec![],
            base_commit: Some("abcdef1".to_string()),
            changed_file_count: Some(2),
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("abcdef1"));
    }
}
