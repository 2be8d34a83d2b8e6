//! Comment and blank-line stripping for the `--compress` pass.

/// Removes comments and blank lines from source content.
///
/// Handles `//` and `#` line comments and `/* .. */` block comments.
/// String literals are left intact, and here-document blocks
/// (`<<<LABEL` .. `LABEL`) pass through verbatim. Trailing whitespace
/// is trimmed from every surviving line.
#[must_use]
pub fn clean(content: &str) -> String {
    let mut stripper = Stripper::default();
    let mut out = String::with_capacity(content.len());

    for line in content.lines() {
        if let Some(cleaned) = stripper.process_line(line) {
            out.push_str(&cleaned);
            out.push('\n');
        }
    }

    out
}

#[derive(Default)]
struct Stripper {
    in_block_comment: bool,
    heredoc_label: Option<String>,
}

impl Stripper {
    /// Cleans one line; returns None when nothing survives.
    fn process_line(&mut self, line: &str) -> Option<String> {
        // Inside a here-document everything is verbatim, including
        // blank lines, until the closing label.
        if let Some(label) = &self.heredoc_label {
            let trimmed = line.trim();
            if trimmed == label || trimmed == format!("{label};") {
                self.heredoc_label = None;
            }
            return Some(line.trim_end().to_string());
        }

        let cleaned = self.strip_comments(line);
        let cleaned = cleaned.trim_end();

        if cleaned.trim().is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }

    fn strip_comments(&mut self, line: &str) -> String {
        let bytes = line.as_bytes();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        let mut in_string: Option<u8> = None;

        while i < bytes.len() {
            if self.in_block_comment {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            let c = bytes[i];

            if let Some(delim) = in_string {
                if c == b'\\' && i + 1 < bytes.len() {
                    let esc_len = 1 + utf8_len(bytes[i + 1]);
                    out.push_str(&line[i..i + esc_len]);
                    i += esc_len;
                    continue;
                }
                let ch_len = utf8_len(c);
                out.push_str(&line[i..i + ch_len]);
                if c == delim {
                    in_string = None;
                }
                i += ch_len;
                continue;
            }

            match c {
                b'"' => {
                    in_string = Some(c);
                    out.push('"');
                    i += 1;
                }
                // A single quote opens a string only when it closes on
                // the same line; lifetimes and apostrophes pass through.
                b'\'' if bytes[i + 1..].contains(&b'\'') => {
                    in_string = Some(c);
                    out.push('\'');
                    i += 1;
                }
                b'<' if bytes[i..].starts_with(b"<<<") => {
                    // Here-doc opener: the rest of the line and the block
                    // that follows are verbatim.
                    let label: String = line[i + 3..]
                        .trim_start_matches(['\'', '"'])
                        .chars()
                        .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
                        .collect();
                    if label.is_empty() {
                        out.push('<');
                        i += 1;
                    } else {
                        self.heredoc_label = Some(label);
                        out.push_str(&line[i..]);
                        return out;
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => return out,
                b'#' => return out,
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    self.in_block_comment = true;
                    i += 2;
                }
                _ => {
                    // Push the full UTF-8 character, not just its first byte.
                    let ch_len = utf8_len(c);
                    out.push_str(&line[i..i + ch_len]);
                    i += ch_len;
                }
            }
        }

        out
    }
}

const fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        _ => 4,
    }
}
