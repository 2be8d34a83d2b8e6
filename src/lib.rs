//! # repopack
//!
//! Packs a code repository into a single text artifact for LLM consumption.
//!
//! ## Features
//!
//! - Deterministic file collection with glob excludes and `.gitignore` support
//! - Plain text, Markdown, JSON and XML output formats
//! - Optional comment and blank-line stripping
//! - Token-budget splitting into `-partN` artifacts
//! - Incremental packs of the files changed since a previous artifact
//!
//! ## Quick Start
//!
//! ```no_run
//! use repopack::{Config, OutputFormat, PackSession};
//!
//! # fn main() -> repopack::Result<()> {
//! let config = Config::builder()
//!     .repository_path("./my-project")
//!     .output_path("pack.md")
//!     .format(OutputFormat::Markdown)
//!     .max_tokens(100_000)
//!     .build()?;
//!
//! let summary = PackSession::new(config).run()?;
//! summary.print();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A pack runs as a pipeline:
//! 1. **Collector**: enumerates candidate files in a stable order
//! 2. **Token counter**: prices each file for budget decisions
//! 3. **Formatter**: renders files into the selected output format
//! 4. **Session**: streams artifacts to disk, splitting on the budget

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod collector;
mod config;
mod entry;
mod error;
mod session;
mod token;

pub mod format;
pub mod git;
pub mod incremental;
pub mod matcher;
pub mod strip;

pub use collector::{CandidateFile, FileCollector};
pub use config::{
    Config, ConfigBuilder, Encoding, FileConfig, OutputFormat, CONFIG_FILE_NAMES,
    DEFAULT_EXCLUDE_PATTERNS,
};
pub use entry::{Artifact, BaseReference, FileEntry, PackSummary};
pub use error::{Error, Result};
pub use incremental::IncrementalResolver;
pub use session::PackSession;
pub use token::{create_counter, CommandTokenCounter, HeuristicTokenCounter, TokenCounter};

/// Packs a repository with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The incremental base artifact cannot be resolved
/// - Token counting fails for any file
/// - An artifact cannot be written
///
/// # Examples
///
/// ```no_run
/// use repopack::{run, Config};
///
/// # fn main() -> repopack::Result<()> {
/// let config = Config::builder()
///     .repository_path(".")
///     .output_path("pack.txt")
///     .build()?;
///
/// let summary = run(config)?;
/// println!("{} files packed", summary.total_files);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PackSummary> {
    PackSession::new(config).run()
}
