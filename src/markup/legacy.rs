//! gtk-doc markup → structured (reST-style) markup.
//!
//! Free-form sections (`Example:`, `HowTo:`, `Notes:`) and already-fenced
//! code are hidden behind vault tokens while the sigil substitutions run,
//! so code quoted in them is never rewritten.

use crate::text::{replace_guarded, Vault};
use regex::{Captures, Regex};
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_CODEBLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\|\[(?:\s*<!--\s*language="([\w+-]+)"\s*-->)?[ \t]*\n?(.*?)\]\|"#).unwrap()
});

static RE_FENCE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+-]*\n.*?```").unwrap());

static RE_CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]+`").unwrap());

static RE_SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:examples?|example usage|how\s*to|notes?)\s*:?\s*$").unwrap()
});

static RE_FIELD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:@\w+\s*:|returns?:|return value:|since:|deprecated:)").unwrap()
});

static RE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<literal>(.+?)</literal>").unwrap());

static RE_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<emphasis>(.+?)</emphasis>").unwrap());

static RE_PARAM_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@(\w+):[ \t]*(.+)$").unwrap());

static RE_RETURNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:Returns?|Return value):[ \t]*(.+)$").unwrap());

static RE_SINCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Since:[ \t]*(.+)$").unwrap());

static RE_DEPRECATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Deprecated:[ \t]*(.+)$").unwrap());

static RE_TYPE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)(?:\.(\w+))?").unwrap());

static RE_CONST_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\w+)").unwrap());

static RE_FUNC_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+)\(\)").unwrap());

static RE_PARAM_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").unwrap());

// -- Public API -------------------------------------------------------------------

/// Convert gtk-doc markup in `text` to structured markup.
pub fn gtkdoc_to_rst(text: &str) -> String {
    let mut vault = Vault::new();
    let text = Vault::sanitize(text);

    let text = hide_sections(&text, &mut vault);
    let text = convert_codeblocks(&text);
    let text = vault.hide_all(&RE_FENCE_BLOCK, &text);
    let text = vault.hide_all(&RE_CODE_SPAN, &text);

    let text = substitute(&text);
    vault.restore(&text)
}

/// `|[ ... ]|` → fenced block. The language tag is lower-cased and
/// defaults to `c`.
pub fn convert_codeblocks(text: &str) -> String {
    RE_CODEBLOCK
        .replace_all(text, |caps: &Captures| {
            let lang = caps
                .get(1)
                .map_or_else(|| "c".to_string(), |m| m.as_str().to_lowercase());
            format!("\n```{}\n{}\n```\n", lang, caps[2].trim_end())
        })
        .into_owned()
}

// -- Sections -----------------------------------------------------------------------

/// Hide each free-form section (header line through the line before the
/// next field marker or section header). Code blocks inside are still
/// converted.
fn hide_sections(text: &str, vault: &mut Vault) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        if !RE_SECTION_HEADER.is_match(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        let mut in_codeblock = false;
        while i < lines.len() {
            let line = lines[i];
            if !in_codeblock
                && (RE_FIELD_MARKER.is_match(line) || RE_SECTION_HEADER.is_match(line))
            {
                break;
            }
            if line.contains("|[") && !line.contains("]|") {
                in_codeblock = true;
            } else if line.contains("]|") {
                in_codeblock = false;
            }
            i += 1;
        }

        // A trailing blank line belongs to the surrounding text.
        let mut end = i;
        while end > start + 1 && lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        let section = convert_codeblocks(&lines[start..end].join("\n"));
        out.push(vault.hide(section));
        out.extend(lines[end..i].iter().map(|l| l.to_string()));
    }

    out.join("\n")
}

// -- Substitutions -------------------------------------------------------------------

fn substitute(text: &str) -> String {
    let text = RE_LITERAL.replace_all(text, "``$1``");
    let text = RE_EMPHASIS.replace_all(&text, "*$1*");
    let text = RE_PARAM_FIELD.replace_all(&text, ":param $1: $2");
    let text = RE_RETURNS.replace_all(&text, ":returns: $1");
    let text = RE_SINCE.replace_all(&text, "Since: $1");
    let text = RE_DEPRECATED.replace_all(&text, "Deprecated: $1");

    // #Type and #Type.member, unless escaped.
    let text = replace_guarded(&RE_TYPE_REF, &text, |caps, before, _| {
        if before == Some('\\') {
            return None;
        }
        Some(match caps.get(2) {
            Some(member) => format!(":member:`{}.{}`", &caps[1], member.as_str()),
            None => format!(":type:`{}`", &caps[1]),
        })
    });

    let text = replace_guarded(&RE_CONST_REF, &text, |caps, before, _| {
        if before.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '\\') {
            return None;
        }
        Some(format!(":const:`{}`", &caps[1]))
    });

    let text = replace_guarded(&RE_FUNC_REF, &text, |caps, before, after| {
        let marked = before.is_some_and(|c| {
            matches!(c, '`' | '\\' | '#' | '@' | '%') || c.is_alphanumeric() || c == '_'
        });
        if marked || after == Some('`') {
            return None;
        }
        Some(format!(":func:`{}`", &caps[1]))
    });

    replace_guarded(&RE_PARAM_REF, &text, |caps, before, _| {
        if before.is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        Some(format!("``{}``", &caps[1]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_reference() {
        assert_eq!(gtkdoc_to_rst("Call foo_init() first."), "Call :func:`foo_init` first.");
    }

    #[test]
    fn type_and_member_reference() {
        assert_eq!(gtkdoc_to_rst("See #GObject."), "See :type:`GObject`.");
        assert_eq!(
            gtkdoc_to_rst("Uses #Engine.flags here."),
            "Uses :member:`Engine.flags` here."
        );
    }

    #[test]
    fn escaped_hash_is_kept() {
        assert_eq!(gtkdoc_to_rst(r"Use \#ifdef guards."), r"Use \#ifdef guards.");
    }

    #[test]
    fn constant_reference() {
        assert_eq!(gtkdoc_to_rst("Returns %TRUE on success"), "Returns :const:`TRUE` on success");
    }

    #[test]
    fn parameter_field_and_inline() {
        let out = gtkdoc_to_rst("@fd: the file descriptor\n\nReads from @fd.");
        assert_eq!(out, ":param fd: the file descriptor\n\nReads from ``fd``.");
    }

    #[test]
    fn returns_field() {
        assert_eq!(gtkdoc_to_rst("Returns: zero"), ":returns: zero");
        assert_eq!(gtkdoc_to_rst("Return value: the size"), ":returns: the size");
    }

    #[test]
    fn since_and_deprecated_pass_through() {
        assert_eq!(gtkdoc_to_rst("Since: 1.2"), "Since: 1.2");
        assert_eq!(gtkdoc_to_rst("Deprecated:   use bar"), "Deprecated: use bar");
    }

    #[test]
    fn literal_and_emphasis() {
        assert_eq!(
            gtkdoc_to_rst("<literal>NULL</literal> is <emphasis>never</emphasis> ok"),
            "``NULL`` is *never* ok"
        );
    }

    #[test]
    fn codeblock_with_language() {
        let out = gtkdoc_to_rst("Text\n|[<!-- language=\"Python\" -->\nprint(1)\n]|");
        assert!(out.contains("```python\nprint(1)\n```"));
    }

    #[test]
    fn codeblock_defaults_to_c() {
        let out = gtkdoc_to_rst("|[\nfoo();\n]|");
        assert!(out.contains("```c\nfoo();\n```"));
        assert!(!out.contains(":func:"));
    }

    #[test]
    fn example_section_is_protected() {
        let input = "Does a thing.\n\nExample:\n    x = foo();\n    #bar %baz\n\n@a: first";
        let out = gtkdoc_to_rst(input);
        assert!(out.contains("    x = foo();\n    #bar %baz"));
        assert!(out.contains(":param a: first"));
    }

    #[test]
    fn existing_fence_is_protected() {
        let input = "Use it:\n```c\nfoo();\n```\nthen bar().";
        let out = gtkdoc_to_rst(input);
        assert!(out.contains("```c\nfoo();\n```"));
        assert!(out.contains(":func:`bar`"));
    }

    #[test]
    fn code_span_is_not_rewritten() {
        assert_eq!(gtkdoc_to_rst("Use `already_code()` now"), "Use `already_code()` now");
    }

    #[test]
    fn clean_text_is_unchanged() {
        let input = "Plain prose with no markup.\n\nSecond paragraph: still plain.";
        assert_eq!(gtkdoc_to_rst(input), input);
    }
}
