//! Output formatters for the supported artifact kinds.

use crate::config::OutputFormat;
use serde::Serialize;
use serde_json::json;

/// Per-artifact totals and metadata rendered into the artifact footer.
///
/// The `commit` field is what a later incremental run scrapes to
/// recover its base revision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactStats {
    /// Number of files recorded in the artifact
    pub file_count: usize,

    /// Total characters across recorded files
    pub total_chars: usize,

    /// Total tokens across recorded files
    pub total_tokens: usize,

    /// Current branch, when the root is a git repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Repository HEAD commit, when the root is a git repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Base commit the incremental diff was computed against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_commit: Option<String>,

    /// Changed-file count in incremental mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<usize>,
}

/// Renders packed files into one of the closed set of output formats.
///
/// Concatenating `header()`, each `format_file()` fragment with
/// `separator()` between, and `footer()` in emission order yields a
/// syntactically valid document of the format's kind.
pub trait Formatter {
    /// Artifact header, written once when the artifact opens.
    fn header(&mut self) -> String;

    /// Renders a single file's content.
    fn format_file(&mut self, relative_path: &str, content: &str) -> String;

    /// Separator written after the header and after each fragment.
    fn separator(&self) -> &'static str;

    /// Artifact footer with the closing stats block.
    fn footer(&mut self, stats: &ArtifactStats) -> String;
}

/// Creates a fresh formatter for one artifact.
///
/// Formatters are stateful (the JSON variant tracks entry commas), so
/// every artifact gets its own instance.
#[must_use]
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Plain => Box::new(PlainFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::default()),
        OutputFormat::Xml => Box::new(XmlFormatter),
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn git_footer_lines(stats: &ArtifactStats, prefix: &str) -> String {
    let mut out = String::new();
    if let Some(branch) = &stats.branch {
        out.push_str(&format!("{prefix}Branch: {branch}\n"));
    }
    if let Some(commit) = &stats.commit {
        out.push_str(&format!("{prefix}Commit: {commit}\n"));
    }
    if let Some(base) = &stats.base_commit {
        out.push_str(&format!("{prefix}Base commit: {base}\n"));
    }
    if let Some(changed) = stats.changed_files {
        out.push_str(&format!("{prefix}Changed files: {changed}\n"));
    }
    out
}

struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn header(&mut self) -> String {
        format!(
            "================================================================\n\
             Repository Export\n\
             Generated: {}\n\
             ================================================================",
            timestamp()
        )
    }

    fn format_file(&mut self, relative_path: &str, content: &str) -> String {
        format!(
            "================\n\
             File: {relative_path}\n\
             ================\n\
             {content}"
        )
    }

    fn separator(&self) -> &'static str {
        "\n\n"
    }

    fn footer(&mut self, stats: &ArtifactStats) -> String {
        format!(
            "================================================================\n\
             End of Repository Export\n\
             Files: {}\n\
             Chars: {}\n\
             Tokens: {}\n\
             {}",
            stats.file_count,
            stats.total_chars,
            stats.total_tokens,
            git_footer_lines(stats, "")
        )
    }
}

struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn header(&mut self) -> String {
        format!(
            "# Repository Export\nGenerated: {}\n\n---",
            timestamp()
        )
    }

    fn format_file(&mut self, relative_path: &str, content: &str) -> String {
        let language = language_for(relative_path);
        format!("### File: {relative_path}\n```{language}\n{content}\n```")
    }

    fn separator(&self) -> &'static str {
        "\n\n"
    }

    fn footer(&mut self, stats: &ArtifactStats) -> String {
        format!(
            "---\n*End of Repository Export*\n\n\
             - Files: {}\n\
             - Chars: {}\n\
             - Tokens: {}\n\
             {}",
            stats.file_count,
            stats.total_chars,
            stats.total_tokens,
            git_footer_lines(stats, "- ")
        )
    }
}

#[derive(Default)]
struct JsonFormatter {
    entries_written: usize,
}

impl Formatter for JsonFormatter {
    fn header(&mut self) -> String {
        "{\n  \"files\": [".to_string()
    }

    fn format_file(&mut self, relative_path: &str, content: &str) -> String {
        let entry = json!({
            "path": relative_path,
            "size": content.len(),
            "extension": extension_of(relative_path),
            "content": content,
        });

        let prefix = if self.entries_written == 0 { "\n" } else { ",\n" };
        self.entries_written += 1;

        format!("{prefix}    {entry}")
    }

    fn separator(&self) -> &'static str {
        ""
    }

    fn footer(&mut self, stats: &ArtifactStats) -> String {
        let mut stats_value = serde_json::to_value(stats).unwrap_or_else(|_| json!({}));
        if let Some(obj) = stats_value.as_object_mut() {
            obj.insert("generated_at".to_string(), json!(timestamp()));
        }

        format!("\n  ],\n  \"stats\": {stats_value}\n}}\n")
    }
}

struct XmlFormatter;

impl Formatter for XmlFormatter {
    fn header(&mut self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <repository>\n\
             \x20 <metadata>\n\
             \x20   <title>Repository Export</title>\n\
             \x20   <generated_at>{}</generated_at>\n\
             \x20 </metadata>",
            timestamp()
        )
    }

    fn format_file(&mut self, relative_path: &str, content: &str) -> String {
        format!(
            "  <file>\n\
             \x20   <path>{}</path>\n\
             \x20   <content><![CDATA[{}]]></content>\n\
             \x20 </file>",
            xml_escape(relative_path),
            cdata_escape(content)
        )
    }

    fn separator(&self) -> &'static str {
        "\n"
    }

    fn footer(&mut self, stats: &ArtifactStats) -> String {
        let mut optional = String::new();
        if let Some(branch) = &stats.branch {
            optional.push_str(&format!("    <branch>{}</branch>\n", xml_escape(branch)));
        }
        if let Some(commit) = &stats.commit {
            optional.push_str(&format!("    <commit>{commit}</commit>\n"));
        }
        if let Some(base) = &stats.base_commit {
            optional.push_str(&format!("    <base_commit>{base}</base_commit>\n"));
        }
        if let Some(changed) = stats.changed_files {
            optional.push_str(&format!("    <changed_files>{changed}</changed_files>\n"));
        }

        format!(
            "  <stats>\n\
             \x20   <files>{}</files>\n\
             \x20   <chars>{}</chars>\n\
             \x20   <tokens>{}</tokens>\n\
             {}\x20 </stats>\n\
             </repository>\n",
            stats.file_count, stats.total_chars, stats.total_tokens, optional
        )
    }
}

fn extension_of(path: &str) -> &str {
    path.rsplit_once('/')
        .map_or(path, |(_, name)| name)
        .rsplit_once('.')
        .map_or("", |(_, ext)| ext)
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits `]]>` occurrences so CDATA content can never close early.
fn cdata_escape(content: &str) -> String {
    content.replace("]]>", "]]]]><![CDATA[>")
}

/// Maps a file extension to a fenced-code-block language tag.
fn language_for(path: &str) -> &'static str {
    match extension_of(path).to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "php" => "php",
        "js" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "css" => "css",
        "scss" | "sass" => "scss",
        "html" => "html",
        "json" => "json",
        "xml" => "xml",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        "sql" => "sql",
        "sh" | "bash" => "bash",
        "py" => "python",
        "rb" => "ruby",
        "java" => "java",
        "c" | "cpp" | "h" | "hpp" => "cpp",
        "cs" => "csharp",
        "go" => "go",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(
        format: OutputFormat,
        files: &[(&str, &str)],
        stats: &ArtifactStats,
    ) -> String {
        let mut formatter = create_formatter(format);
        let mut out = formatter.header();
        out.push_str(formatter.separator());
        for (path, content) in files {
            out.push_str(&formatter.format_file(path, content));
            out.push_str(formatter.separator());
        }
        out.push_str(&formatter.footer(stats));
        out
    }

    fn sample_stats() -> ArtifactStats {
        ArtifactStats {
            file_count: 2,
            total_chars: 30,
            total_tokens: 8,
            branch: Some("main".to_string()),
            commit: Some("abcdef1234567".to_string()),
            base_commit: None,
            changed_files: None,
        }
    }

    #[test]
    fn test_plain_output_structure() {
        let out = render(
            OutputFormat::Plain,
            &[("src/main.rs", "fn main() {}")],
            &sample_stats(),
        );

        assert!(out.contains("Repository Export"));
        assert!(out.contains("File: src/main.rs"));
        assert!(out.contains("fn main() {}"));
        assert!(out.contains("End of Repository Export"));
        assert!(out.contains("Commit: abcdef1234567"));
    }

    #[test]
    fn test_markdown_fenced_blocks() {
        let out = render(
            OutputFormat::Markdown,
            &[("src/main.rs", "fn main() {}"), ("note.txt", "hi")],
            &sample_stats(),
        );

        assert!(out.contains("### File: src/main.rs\n```rust\nfn main() {}\n```"));
        assert!(out.contains("```plaintext\nhi\n```"));
        assert!(out.contains("*End of Repository Export*"));
    }

    #[test]
    fn test_json_parses_and_round_trips() {
        let out = render(
            OutputFormat::Json,
            &[
                ("src/a.rs", "fn a() {}"),
                ("src/b.rs", "fn b() { \"quoted\" }"),
            ],
            &sample_stats(),
        );

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let files = parsed["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["path"], "src/a.rs");
        assert_eq!(files[0]["extension"], "rs");
        assert_eq!(files[1]["content"], "fn b() { \"quoted\" }");
        assert_eq!(parsed["stats"]["file_count"], 2);
        assert_eq!(parsed["stats"]["commit"], "abcdef1234567");
    }

    #[test]
    fn test_json_footer_commit_precedes_base_commit() {
        let stats = ArtifactStats {
            file_count: 1,
            total_chars: 5,
            total_tokens: 2,
            branch: None,
            commit: Some("1111111".to_string()),
            base_commit: Some("2222222".to_string()),
            changed_files: Some(1),
        };

        // Base recovery takes the first hash after a commit marker, so
        // the current commit must serialize ahead of the base commit.
        let out = render(OutputFormat::Json, &[("f.rs", "x")], &stats);
        assert!(out.find(r#""commit""#).unwrap() < out.find(r#""base_commit""#).unwrap());
    }

    #[test]
    fn test_json_empty_artifact_parses() {
        let out = render(OutputFormat::Json, &[], &ArtifactStats::default());
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["files"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_xml_structure_and_escaping() {
        let out = render(
            OutputFormat::Xml,
            &[("a&b.rs", "let x = 1 < 2;")],
            &sample_stats(),
        );

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("<path>a&amp;b.rs</path>"));
        assert!(out.contains("<content><![CDATA[let x = 1 < 2;]]></content>"));
        assert!(out.trim_end().ends_with("</repository>"));
        assert!(out.contains("<commit>abcdef1234567</commit>"));
    }

    #[test]
    fn test_xml_round_trip_recovers_paths_and_content() {
        let files = [
            ("a&b.rs", "let x = 1 < 2;"),
            ("src/raw.rs", "let close = \"]]>\"; // tricky & <tag>"),
        ];
        let out = render(OutputFormat::Xml, &files, &sample_stats());

        let doc = roxmltree::Document::parse(&out).unwrap();
        let recovered: Vec<(String, String)> = doc
            .descendants()
            .filter(|n| n.has_tag_name("file"))
            .map(|file| {
                let path = file
                    .descendants()
                    .find(|n| n.has_tag_name("path"))
                    .and_then(|n| n.text())
                    .unwrap()
                    .to_string();
                // CDATA splitting can break content into several text
                // nodes; the document yields them back in order.
                let content: String = file
                    .descendants()
                    .find(|n| n.has_tag_name("content"))
                    .unwrap()
                    .children()
                    .filter_map(|c| c.text())
                    .collect();
                (path, content)
            })
            .collect();

        assert_eq!(recovered.len(), files.len());
        for ((path, content), (expected_path, expected_content)) in
            recovered.iter().zip(files.iter())
        {
            assert_eq!(path, expected_path);
            assert_eq!(content, expected_content);
        }
    }

    #[test]
    fn test_cdata_close_sequence_split() {
        assert_eq!(cdata_escape("no close here"), "no close here");
        assert_eq!(
            cdata_escape("before ]]> after"),
            "before ]]]]><![CDATA[> after"
        );
    }

    #[test]
    fn test_language_mapping() {
        assert_eq!(language_for("src/lib.rs"), "rust");
        assert_eq!(language_for("app.PY"), "python");
        assert_eq!(language_for("Makefile"), "plaintext");
        assert_eq!(language_for("deep/dir/schema.sql"), "sql");
    }

    #[test]
    fn test_extension_of_handles_dotted_dirs() {
        assert_eq!(extension_of("a.dir/file"), "");
        assert_eq!(extension_of("a.dir/file.rs"), "rs");
        assert_eq!(extension_of("plain"), "");
    }

    #[test]
    fn test_incremental_metadata_in_footer() {
        let stats = ArtifactStats {
            file_count: 1,
            total_chars: 5,
            total_tokens: 2,
            branch: None,
            commit: Some("1111111".to_string()),
            base_commit: Some("2222222".to_string()),
            changed_files: Some(3),
        };

        let out = render(OutputFormat::Plain, &[("f.rs", "x")], &stats);
        assert!(out.contains("Commit: 1111111"));
        assert!(out.contains("Base commit: 2222222"));
        assert!(out.contains("Changed files: 3"));

        // The current commit comes first so base recovery picks it up.
        assert!(out.find("Commit: 1111111").unwrap() < out.find("Base commit:").unwrap());
    }
}
