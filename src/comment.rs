//! Comment normalizer — strips `/** */` and `///` decoration from raw
//! comment text.

use crate::text::dedent;
use regex::Regex;
use std::sync::LazyLock;

static RE_LINE_DOC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*///\s?").unwrap());

static RE_STAR_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\* ?").unwrap());

/// Strip comment decoration and return clean paragraph text.
pub fn clean_comment(raw: &str) -> String {
    if raw.trim_start().starts_with("///") {
        let body = raw
            .lines()
            .map(|l| RE_LINE_DOC.replace(l, "").into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        return dedent(&body).trim().to_string();
    }

    let mut text = raw.trim();
    text = text
        .strip_prefix("/**")
        .or_else(|| text.strip_prefix("/*"))
        .unwrap_or(text);
    text = text.strip_suffix("*/").unwrap_or(text);

    let lines: Vec<String> = text
        .lines()
        .map(|l| RE_STAR_PREFIX.replace(l, "").into_owned())
        .collect();

    let start = lines.iter().position(|l| !is_junk(l)).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !is_junk(l))
        .map_or(start, |i| i + 1);

    let kept: Vec<&str> = lines[start..end.max(start)]
        .iter()
        .map(String::as_str)
        .filter(|l| !matches!(l.trim(), "/**" | "**/"))
        .collect();

    dedent(&kept.join("\n")).trim().to_string()
}

/// Decoration-only lines dropped at either end of a block.
fn is_junk(line: &str) -> bool {
    let t = line.trim();
    matches!(t, "" | "*" | "/" | "/**" | "*/" | "**/") || t.chars().all(|c| c == '=')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_block_decoration() {
        let raw = "/**\n * Initialize the thing.\n *\n * More text.\n */";
        assert_eq!(clean_comment(raw), "Initialize the thing.\n\nMore text.");
    }

    #[test]
    fn strips_single_line_block() {
        assert_eq!(clean_comment("/** Maximum threads. */"), "Maximum threads.");
    }

    #[test]
    fn strips_line_doc_comments() {
        let raw = "/// First line.\n/// Second line.";
        assert_eq!(clean_comment(raw), "First line.\nSecond line.");
    }

    #[test]
    fn keeps_relative_indentation() {
        let raw = "/**\n * Example:\n *     foo();\n */";
        assert_eq!(clean_comment(raw), "Example:\n    foo();");
    }

    #[test]
    fn drops_rule_lines_at_edges() {
        let raw = "/**\n * ========\n * Body\n * ========\n */";
        assert_eq!(clean_comment(raw), "Body");
    }

    #[test]
    fn drops_interior_openers() {
        let raw = "/**\n * a\n/**\n * b\n */";
        assert_eq!(clean_comment(raw), "a\nb");
    }

    #[test]
    fn empty_comment() {
        assert_eq!(clean_comment("/** */"), "");
        assert_eq!(clean_comment("/**\n *\n */"), "");
    }
}
