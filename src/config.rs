use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Exclude patterns applied to every pack, ahead of user-supplied ones.
///
/// Lockfiles, environment files, editor droppings and tool caches add
/// bulk without telling a model anything useful.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "composer.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    ".env",
    ".env.*",
    ".DS_Store",
    "Thumbs.db",
    "*.log",
    ".phpunit.cache",
    ".phpunit.result.cache",
    ".php-cs-fixer.cache",
    ".phpcs.cache",
    "docker-compose.override.yml",
];

/// Configuration file names probed in the working directory, dotfile
/// first.
pub const CONFIG_FILE_NAMES: &[&str] = &[".repopack.json", "repopack.json"];

/// Output format for generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text with banner-style file headers
    Plain,
    /// Markdown with fenced code blocks
    Markdown,
    /// Single JSON document with a `files` array and trailing `stats`
    Json,
    /// XML document with one `<file>` element per entry
    Xml,
}

impl OutputFormat {
    /// Returns the canonical name for this format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

/// Token encoding identifier passed to the token counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// cl100k_base (GPT-4 family)
    Cl100kBase,
    /// p50k_base (default, GPT-3 family)
    #[default]
    P50kBase,
    /// r50k_base
    R50kBase,
    /// p50k_edit
    P50kEdit,
}

impl Encoding {
    /// Returns the encoding identifier string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::P50kBase => "p50k_base",
            Self::R50kBase => "r50k_base",
            Self::P50kEdit => "p50k_edit",
        }
    }
}

/// Options loaded from a `repopack.json` configuration file.
///
/// Every field is optional. The file seeds defaults only: anything set
/// explicitly on the [`ConfigBuilder`] (e.g. from the command line)
/// wins over the file's value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    /// Output format
    pub format: Option<OutputFormat>,

    /// Token encoding identifier
    pub encoding: Option<Encoding>,

    /// Extra exclude patterns, merged ahead of command-line ones
    pub exclude: Vec<String>,

    /// Whether to honor the repository's `.gitignore`
    pub gitignore: Option<bool>,

    /// Strip comments and blank lines from packed content
    pub compress: Option<bool>,

    /// Maximum tokens per artifact
    pub max_tokens: Option<usize>,

    /// Incremental mode
    pub incremental: Option<bool>,

    /// Prior artifact to recover the base commit from
    pub base_file: Option<PathBuf>,

    /// External token counter executable
    pub token_counter: Option<PathBuf>,
}

impl FileConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "invalid configuration file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Probes `dir` for a configuration file, trying each name in
    /// [`CONFIG_FILE_NAMES`] order, and loads the first one found.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be parsed.
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                info!("Loading configuration from {}", path.display());
                return Self::load(&path).map(Some);
            }
        }
        Ok(None)
    }
}

/// Configuration for one pack invocation.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Repository root to pack
    pub repository_path: PathBuf,

    /// Path of artifact index 0; split parts derive from it
    pub output_path: PathBuf,

    /// Output format
    pub format: OutputFormat,

    /// Token encoding identifier
    pub encoding: Encoding,

    /// Exclude patterns, defaults merged ahead of user patterns
    pub exclude_patterns: Vec<String>,

    /// Whether to honor the root's `.gitignore`
    pub respect_gitignore: bool,

    /// Strip comments and blank lines from file content
    pub compress: bool,

    /// Maximum tokens per artifact; 0 disables splitting
    pub max_tokens: usize,

    /// Restrict the candidate list to files changed since the base artifact
    pub incremental: bool,

    /// Prior artifact to recover the base commit from (incremental mode)
    pub base_file: Option<PathBuf>,

    /// External token counter executable; heuristic estimator when unset
    pub token_counter: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use repopack::Config;
    ///
    /// let config = Config::builder()
    ///     .repository_path(".")
    ///     .output_path("pack.txt")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Repository root doesn't exist or is not a directory
    /// - Output directory doesn't exist
    /// - Incremental mode is requested without an existing base file
    pub fn validate(&self) -> Result<()> {
        if !self.repository_path.exists() {
            return Err(Error::config(format!(
                "Repository path does not exist: {}",
                self.repository_path.display()
            )));
        }

        if !self.repository_path.is_dir() {
            return Err(Error::config(format!(
                "Repository path is not a directory: {}",
                self.repository_path.display()
            )));
        }

        let output_dir = self
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        if !output_dir.is_dir() {
            return Err(Error::config(format!(
                "Output directory does not exist: {}",
                output_dir.display()
            )));
        }

        if self.incremental {
            let Some(base) = &self.base_file else {
                return Err(Error::config(
                    "Incremental mode requires a base file. \
                    Use Config::builder().base_file(..)",
                ));
            };

            if !base.is_file() {
                return Err(Error::config(format!(
                    "Base file does not exist: {}",
                    base.display()
                )));
            }
        }

        if let Some(counter) = &self.token_counter {
            if !counter.is_file() {
                return Err(Error::config(format!(
                    "Token counter executable not found at: {}",
                    counter.display()
                )));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository_path: PathBuf::from("."),
            output_path: PathBuf::from("repopack.txt"),
            format: OutputFormat::Plain,
            encoding: Encoding::default(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            respect_gitignore: true,
            compress: false,
            max_tokens: 0,
            incremental: false,
            base_file: None,
            token_counter: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    repository_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    format: Option<OutputFormat>,
    encoding: Option<Encoding>,
    exclude_patterns: Vec<String>,
    respect_gitignore: Option<bool>,
    compress: Option<bool>,
    max_tokens: Option<usize>,
    incremental: Option<bool>,
    base_file: Option<PathBuf>,
    token_counter: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the repository root to pack.
    #[must_use]
    pub fn repository_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_path = Some(path.into());
        self
    }

    /// Sets the output artifact path.
    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the token encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Adds exclude patterns on top of the defaults.
    #[must_use]
    pub fn exclude_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.exclude_patterns.extend(patterns);
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = Some(enabled);
        self
    }

    /// Enables comment and blank-line stripping.
    #[must_use]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = Some(enabled);
        self
    }

    /// Sets the maximum tokens per artifact; 0 disables splitting.
    #[must_use]
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Enables incremental mode.
    #[must_use]
    pub fn incremental(mut self, enabled: bool) -> Self {
        self.incremental = Some(enabled);
        self
    }

    /// Sets the base artifact for incremental mode.
    #[must_use]
    pub fn base_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_file = Some(path.into());
        self
    }

    /// Sets the external token counter executable.
    #[must_use]
    pub fn token_counter(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_counter = Some(path.into());
        self
    }

    /// Fills every option still unset from a configuration file.
    ///
    /// Explicit builder calls always win; file excludes land ahead of
    /// builder excludes (and after the built-in defaults).
    #[must_use]
    pub fn file_defaults(mut self, file: FileConfig) -> Self {
        self.format = self.format.or(file.format);
        self.encoding = self.encoding.or(file.encoding);
        self.respect_gitignore = self.respect_gitignore.or(file.gitignore);
        self.compress = self.compress.or(file.compress);
        self.max_tokens = self.max_tokens.or(file.max_tokens);
        self.incremental = self.incremental.or(file.incremental);
        self.base_file = self.base_file.or(file.base_file);
        self.token_counter = self.token_counter.or(file.token_counter);

        let mut excludes = file.exclude;
        excludes.append(&mut self.exclude_patterns);
        self.exclude_patterns = excludes;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut exclude_patterns: Vec<String> = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(ToString::to_string)
            .collect();
        exclude_patterns.extend(self.exclude_patterns);

        let config = Config {
            repository_path: self.repository_path.unwrap_or_else(|| PathBuf::from(".")),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from("repopack.txt")),
            format: self.format.unwrap_or(OutputFormat::Plain),
            encoding: self.encoding.unwrap_or_default(),
            exclude_patterns,
            respect_gitignore: self.respect_gitignore.unwrap_or(true),
            compress: self.compress.unwrap_or(false),
            max_tokens: self.max_tokens.unwrap_or(0),
            incremental: self.incremental.unwrap_or(false),
            base_file: self.base_file,
            token_counter: self.token_counter,
        };

        config.validate()?;
        Ok(config)
    }
}
