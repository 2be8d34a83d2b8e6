use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the repopack library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid exclude or ignore pattern.
    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Token counting failed for a file.
    ///
    /// Always fatal for the whole run: a silently wrong budget is worse
    /// than aborting with the offending path.
    #[error("Token counting failed for '{path}': {message}")]
    TokenCount {
        /// File the counter was invoked on
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Git invocation or repository state error.
    #[error("Git error: {message}")]
    Git {
        /// Error message
        message: String,
    },

    /// Incremental base resolution error.
    #[error("Incremental resolution failed: {message}")]
    Incremental {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a token counting error.
    #[must_use]
    pub fn token_count(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TokenCount {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Creates an incremental resolution error.
    #[must_use]
    pub fn incremental(message: impl Into<String>) -> Self {
        Self::Incremental {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is a token counting error.
    #[must_use]
    pub const fn is_token_count(&self) -> bool {
        matches!(self, Self::TokenCount { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_token_count_error() {
        let err = Error::token_count("/repo/big.rs", "exit code 1");
        assert!(err.is_token_count());
        assert!(err.to_string().contains("big.rs"));
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::git("not a repository");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
