use crate::config::Encoding;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

const HEURISTIC_CHARS_PER_TOKEN: usize = 4;

/// Capability for counting the tokens of a file on disk.
///
/// The pipeline treats counting as an abstract capability so an
/// external executable and an in-process estimator are interchangeable.
/// A failing invocation is fatal for the whole run.
pub trait TokenCounter: Send + Sync {
    /// Counts tokens in the file at `path` under the given encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenCount`] if the count cannot be produced.
    fn count(&self, path: &Path, encoding: Encoding) -> Result<usize>;
}

/// Creates the token counter for a run.
///
/// With an executable path, counting shells out to it; otherwise the
/// in-process heuristic estimator is used.
#[must_use]
pub fn create_counter(executable: Option<&Path>) -> Arc<dyn TokenCounter> {
    match executable {
        Some(path) => Arc::new(CommandTokenCounter::new(path.to_path_buf())),
        None => Arc::new(HeuristicTokenCounter),
    }
}

/// Token counter backed by an external executable.
///
/// Invoked as `<exe> -encoding <id> -file <path>`; stdout must be a
/// single non-negative integer.
#[derive(Debug, Clone)]
pub struct CommandTokenCounter {
    executable: PathBuf,
}

impl CommandTokenCounter {
    /// Creates a counter for the given executable path.
    #[must_use]
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl TokenCounter for CommandTokenCounter {
    fn count(&self, path: &Path, encoding: Encoding) -> Result<usize> {
        let output = Command::new(&self.executable)
            .arg("-encoding")
            .arg(encoding.as_str())
            .arg("-file")
            .arg(path)
            .output()
            .map_err(|e| {
                Error::token_count(
                    path,
                    format!(
                        "failed to execute '{}': {e}",
                        self.executable.display()
                    ),
                )
            })?;

        if !output.status.success() {
            return Err(Error::token_count(
                path,
                format!("token counter exited with {}", output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::token_count(path, format!("unreadable output '{}'", stdout.trim())))
    }
}

/// In-process token estimator.
///
/// Uses the ~4 characters per token heuristic, which tracks real
/// tokenizers closely enough for budget bounding on source code.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, path: &Path, _encoding: Encoding) -> Result<usize> {
        let bytes = fs::read(path).map_err(|e| Error::token_count(path, e.to_string()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(estimate_tokens(&text))
    }
}

/// Estimates the token count of a text.
#[must_use]
pub(crate) fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let char_count = text.chars().count();
    char_count
        .saturating_add(HEURISTIC_CHARS_PER_TOKEN - 1)
        .saturating_div(HEURISTIC_CHARS_PER_TOKEN)
        .max(1)
}
