//! Lossy comment stripping applied to chunks before they enter a prompt.
//!
//! Pattern based, not a parser: comment markers inside string literals are stripped too, and
//! `//` in URLs truncates the line.

use std::sync::LazyLock;

use regex::Regex;

static HASH_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#.*").unwrap());
static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//.*").unwrap());
static BLOCK_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Strip `#` and `//` line comments, `/* */` blocks, surrounding whitespace, and blank lines.
#[must_use]
pub fn clean_code(code: &str) -> String {
    let stripped = HASH_COMMENT_RE.replace_all(code, "");
    let stripped = LINE_COMMENT_RE.replace_all(&stripped, "");
    let stripped = BLOCK_COMMENT_RE.replace_all(&stripped, "");

    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hash_comment() {
        let cleaned = clean_code("# comment\nprint(\"Hello\")\n");
        assert!(cleaned.contains("print(\"Hello\")"));
        assert!(!cleaned.contains('#'));
    }

    #[test]
    fn strips_line_and_block_comments() {
        let code = "int x = 1; // counter\n/* multi\n line */\nreturn x;";
        assert_eq!(clean_code(code), "int x = 1;\nreturn x;");
    }

    #[test]
    fn drops_blank_lines_and_indentation() {
        assert_eq!(clean_code("  fn a() {\n\n\n      b();\n  }\n"), "fn a() {\nb();\n}");
    }

    #[test]
    fn comment_markers_inside_strings_are_not_protected() {
        assert_eq!(clean_code("url = \"http://example.com\""), "url = \"http:");
    }

    #[test]
    fn empty_input() {
        assert_eq!(clean_code(""), "");
        assert_eq!(clean_code("# only a comment"), "");
    }
}
