//! Cross-reference resolver — rewrites references in rendered markdown
//! into links using the [`Registry`].

use crate::registry::Registry;
use crate::text::{replace_guarded, Vault};
use regex::{Captures, Regex};
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_EXPLICIT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r":(?:c(?:pp)?:)?(?:func|macro|type|const|var|struct|union|enum|member|data|class|test|subtest|file):`([^`]+)`",
    )
    .unwrap()
});

static RE_EXAMPLE_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="hm-example">.*?</div>"#).unwrap());

static RE_FENCE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^[ \t]*```.*?^[ \t]*```[ \t]*$").unwrap());

static RE_BACKTICK_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"`([\w][\w.-]*/[\w][\w./-]*\.\w+|[\w][\w.-]*\.(?:c|h|cpp|hpp|cc|hh|cxx|hxx))`",
    )
    .unwrap()
});

static RE_BACKTICK_FUNC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(\w+)\(\)`").unwrap());

static RE_BACKTICK_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(\w[\w-]*)`").unwrap());

static RE_MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[`?([^\]]+?)`?\]\(([^)]+)\)").unwrap());

static RE_CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

static RE_ARTIFACT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:/\*\*|\*\*/|/\*|\*/)\s*$").unwrap());

const HTML_OPENERS: &[&str] = &[
    "<table", "<thead", "<tbody", "<tr", "<td", "<th", "<div", "<ol", "<ul", "<li",
];

// -- Resolver ---------------------------------------------------------------------

pub struct Resolver<'a> {
    registry: &'a Registry,
    auto_xref: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, auto_xref: bool) -> Self {
        Self {
            registry,
            auto_xref,
        }
    }

    /// Rewrite references in `markdown`, which will be served as `page`.
    /// Example cards and fenced code are left untouched.
    pub fn apply(&self, markdown: &str, page: &str) -> String {
        let mut vault = Vault::new();
        let text = Vault::sanitize(markdown);
        let text = vault.hide_all(&RE_EXAMPLE_CARD, &text);
        let text = vault.hide_all(&RE_FENCE_BLOCK, &text);

        let text = self.explicit_refs(&text, page);
        let text = if self.auto_xref {
            self.implicit_refs(&text, page)
        } else {
            text
        };

        let text = md_links_in_html(&text);
        let text = sanitize_output(&text);
        vault.restore(&text)
    }

    /// `:func:\`name\`` and friends → link, or a plain code span when the
    /// name is unknown.
    fn explicit_refs(&self, text: &str, page: &str) -> String {
        RE_EXPLICIT_REF
            .replace_all(text, |caps: &Captures| {
                let name = &caps[1];
                let display = name.strip_suffix("()").unwrap_or(name);
                match self.registry.resolve(name, page) {
                    Some(url) if !url.is_empty() => format!("[`{display}`]({url})"),
                    _ => format!("`{display}`"),
                }
            })
            .into_owned()
    }

    /// Backtick spans that name a known file, function or symbol.
    fn implicit_refs(&self, text: &str, page: &str) -> String {
        let unlinked = |before: Option<char>, after: Option<char>| {
            before != Some('[') && after != Some(']')
        };

        let text = replace_guarded(&RE_BACKTICK_FILE, text, |caps, before, after| {
            let name = &caps[1];
            if !unlinked(before, after) || !self.registry.contains(name) {
                return None;
            }
            self.link(name, page).map(|url| format!("[`{name}`]({url})"))
        });

        let text = replace_guarded(&RE_BACKTICK_FUNC, &text, |caps, before, after| {
            let name = &caps[1];
            if !unlinked(before, after) {
                return None;
            }
            self.link(name, page).map(|url| format!("[`{name}()`]({url})"))
        });

        replace_guarded(&RE_BACKTICK_IDENT, &text, |caps, before, after| {
            let name = &caps[1];
            if !unlinked(before, after) || !self.registry.contains(name) {
                return None;
            }
            self.link(name, page).map(|url| format!("[`{name}`]({url})"))
        })
    }

    fn link(&self, name: &str, page: &str) -> Option<String> {
        self.registry.resolve(name, page).filter(|url| !url.is_empty())
    }
}

// -- Post-processing ------------------------------------------------------------------

/// Markdown links and code spans inside raw HTML blocks are not rendered
/// by the site generator; turn them into HTML.
pub fn md_links_in_html(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_html = false;
    for line in text.split('\n') {
        let stripped = line.trim();
        if HTML_OPENERS.iter().any(|p| stripped.starts_with(p))
            || stripped.starts_with("</table")
            || stripped.starts_with("</tbody")
            || stripped.starts_with("</div>")
        {
            in_html = true;
        }

        let mut line = line.to_string();
        if in_html {
            line = RE_MD_LINK
                .replace_all(&line, r#"<a href="$2"><code>$1</code></a>"#)
                .into_owned();
            line = RE_CODE_SPAN
                .replace_all(&line, "<code>$1</code>")
                .into_owned();
        }

        if stripped.starts_with("</table") || stripped.starts_with("</div>") {
            in_html = false;
        }
        out.push(line);
    }
    out.join("\n")
}

/// Drop stray comment delimiter lines outside code.
pub fn sanitize_output(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_code = false;
    let mut in_pre = false;
    for line in text.split('\n') {
        if line.trim().starts_with("```") {
            in_code = !in_code;
        }
        if line.contains("<pre>") || line.contains("<code") {
            in_pre = true;
        }
        if line.contains("</pre>") || line.contains("</code>") {
            in_pre = false;
        }
        if !in_code && !in_pre && RE_ARTIFACT_LINE.is_match(line) {
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentedEntity, EntityKind};
    use crate::registry::UrlStyle;

    fn registry() -> Registry {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register(
            &[
                DocumentedEntity::new("engine_init", EntityKind::Function, ""),
                DocumentedEntity::new("engine_config", EntityKind::Struct, ""),
            ],
            "api/engine.h.md",
            "API",
        );
        r.register_file("core/engine.h", "api/engine.h.md", "api", "API");
        r
    }

    #[test]
    fn explicit_reference_links() {
        let r = registry();
        let out = Resolver::new(&r, true).apply("See :c:func:`engine_init`.", "api/uart.c.md");
        assert_eq!(
            out,
            "See [`engine_init`](../engine.h/?h=engine_init#func-engine_init)."
        );
    }

    #[test]
    fn explicit_reference_same_page() {
        let r = registry();
        let out = Resolver::new(&r, true).apply(":struct:`engine_config`", "api/engine.h.md");
        assert_eq!(out, "[`engine_config`](#struct-engine_config)");
    }

    #[test]
    fn unknown_explicit_reference_degrades() {
        let r = registry();
        let out = Resolver::new(&r, true).apply(":func:`missing()`", "api/uart.c.md");
        assert_eq!(out, "`missing`");
    }

    #[test]
    fn implicit_function_keeps_call_suffix() {
        let r = registry();
        let out = Resolver::new(&r, true).apply("Call `engine_init()` first.", "api/engine.h.md");
        assert_eq!(out, "Call [`engine_init()`](#func-engine_init) first.");
    }

    #[test]
    fn implicit_identifier_only_when_known() {
        let r = registry();
        let out = Resolver::new(&r, true).apply("`engine_config` and `value`", "api/engine.h.md");
        assert_eq!(out, "[`engine_config`](#struct-engine_config) and `value`");
    }

    #[test]
    fn implicit_file_reference() {
        let r = registry();
        let out = Resolver::new(&r, true).apply("Defined in `engine.h`.", "api/index.md");
        assert_eq!(out, "Defined in [`engine.h`](engine.h/).");
    }

    #[test]
    fn auto_xref_can_be_disabled() {
        let r = registry();
        let out = Resolver::new(&r, false).apply("`engine_init()`", "api/engine.h.md");
        assert_eq!(out, "`engine_init()`");
    }

    #[test]
    fn existing_links_are_not_relinked() {
        let r = registry();
        let text = "[`engine_init`](#func-engine_init)";
        assert_eq!(Resolver::new(&r, true).apply(text, "api/engine.h.md"), text);
    }

    #[test]
    fn example_cards_are_untouched() {
        let r = registry();
        let card = "<div class=\"hm-example\"><pre><code>`engine_init()`</code></pre></div>";
        let out = Resolver::new(&r, true).apply(card, "api/engine.h.md");
        assert_eq!(out, card);
    }

    #[test]
    fn unregistered_name_stays_plain() {
        let r = Registry::new(UrlStyle::Flat);
        let out = Resolver::new(&r, true).apply("`nothing()` and `x`", "a.md");
        assert_eq!(out, "`nothing()` and `x`");
    }

    #[test]
    fn links_inside_html_become_anchors() {
        let text = "<table>\n<tr><td>[`foo`](a/#x) and `bar`</td></tr>\n</table>\n`after`";
        let out = md_links_in_html(text);
        assert!(out.contains(r#"<a href="a/#x"><code>foo</code></a> and <code>bar</code>"#));
        assert!(out.ends_with("`after`"));
    }

    #[test]
    fn stray_comment_lines_removed_outside_code() {
        let text = "a\n/**\nb\n```c\n*/\n```\n */";
        assert_eq!(sanitize_output(text), "a\nb\n```c\n*/\n```");
    }
}
