use anyhow::Context;
use clap::Parser;
use repopack::{Config, Encoding, FileConfig, OutputFormat, PackSession};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "repopack",
    version,
    author,
    about = "Pack a code repository into a single LLM-ready artifact",
    long_about = "Pack a code repository into a single text artifact for Large Language Models.\n\n\
    The tool walks a repository, filters files through exclude patterns and .gitignore \
    rules, and writes everything into one artifact in plain text, Markdown, JSON or XML. \
    Artifacts can be split on a token budget and re-packed incrementally from the files \
    changed since a previous run.\n\n\
    Options may also be supplied in a .repopack.json (or repopack.json) file in the \
    working directory; command-line options take precedence over the file.\n\n\
    USAGE EXAMPLES:\n  \
      # Pack the current directory\n  \
      repopack pack.txt\n\n  \
      # Pack a project as Markdown with a token budget\n  \
      repopack pack.md ./my-project --format markdown --max-tokens 100000\n\n  \
      # Strip comments and blank lines\n  \
      repopack pack.txt ./src --compress\n\n  \
      # Pack only the files changed since a previous artifact\n  \
      repopack pack.txt ./src --incremental --base-file pack.txt"
)]
struct Cli {
    /// Output artifact path; split parts and diff outputs derive from it
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Repository root to pack
    #[arg(value_name = "PATH", default_value = ".")]
    repository: PathBuf,

    /// Output format [default: plain]
    #[arg(short, long, value_enum)]
    format: Option<CliFormat>,

    /// Token encoding identifier passed to the token counter [default: p50k-base]
    #[arg(short, long, value_enum)]
    encoding: Option<CliEncoding>,

    /// Extra exclude pattern (can be used multiple times)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Do not honor the repository's .gitignore
    #[arg(long)]
    no_gitignore: bool,

    /// Strip comments and blank lines from packed content
    #[arg(short, long)]
    compress: bool,

    /// Max tokens per artifact; 0 disables splitting [default: 0]
    #[arg(long, value_name = "N")]
    max_tokens: Option<usize>,

    /// Pack only the files changed since the base artifact
    #[arg(short, long)]
    incremental: bool,

    /// Previous artifact to recover the base commit from
    #[arg(long, value_name = "FILE")]
    base_file: Option<PathBuf>,

    /// External token counter executable; heuristic estimation when unset
    #[arg(long, value_name = "EXE")]
    token_counter: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Plain,
    Markdown,
    Json,
    Xml,
}

impl From<CliFormat> for OutputFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Plain => Self::Plain,
            CliFormat::Markdown => Self::Markdown,
            CliFormat::Json => Self::Json,
            CliFormat::Xml => Self::Xml,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliEncoding {
    Cl100kBase,
    P50kBase,
    R50kBase,
    P50kEdit,
}

impl From<CliEncoding> for Encoding {
    fn from(e: CliEncoding) -> Self {
        match e {
            CliEncoding::Cl100kBase => Self::Cl100kBase,
            CliEncoding::P50kBase => Self::P50kBase,
            CliEncoding::R50kBase => Self::R50kBase,
            CliEncoding::P50kEdit => Self::P50kEdit,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .repository_path(cli.repository)
        .output_path(cli.output)
        .exclude_patterns(cli.exclude);

    if let Some(format) = cli.format {
        builder = builder.format(format.into());
    }

    if let Some(encoding) = cli.encoding {
        builder = builder.encoding(encoding.into());
    }

    if let Some(max_tokens) = cli.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }

    if cli.no_gitignore {
        builder = builder.respect_gitignore(false);
    }

    if cli.compress {
        builder = builder.compress(true);
    }

    if cli.incremental {
        builder = builder.incremental(true);
    }

    if let Some(base_file) = cli.base_file {
        builder = builder.base_file(base_file);
    }

    if let Some(token_counter) = cli.token_counter {
        builder = builder.token_counter(token_counter);
    }

    if let Some(file) = FileConfig::discover(Path::new("."))
        .context("Failed to load configuration file")?
    {
        builder = builder.file_defaults(file);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let summary = PackSession::new(config)
        .run()
        .context("Pack execution failed")?;

    summary.print();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("repopack=info"),
        1 => EnvFilter::new("repopack=debug"),
        _ => EnvFilter::new("repopack=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
