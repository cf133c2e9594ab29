//! `::: c:autofunction`-style directives in hand-written pages.
//!
//! A directive is a header line followed by option lines indented deeper
//! than the header:
//!
//! ```text
//! ::: c:autofunction
//!     :file: core/engine.h
//!     :name: engine_init
//! ```
//!
//! The whole block is replaced by the rendered documentation, or by an
//! HTML comment naming what is missing.

use super::Build;
use crate::model::EntityKind;
use crate::render::{render_autodoc, render_single};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([ \t]*):::[ \t]+(c|cpp):(autodoc|autofunction|autostruct|autounion|autoenum|automacro|autovar|autotype)\s*$",
    )
    .unwrap()
});

static RE_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]+:(\w+):(.*)$").unwrap());

/// Entity kind a single-symbol directive selects.
fn directive_kind(directive: &str) -> Option<EntityKind> {
    match directive {
        "autofunction" => Some(EntityKind::Function),
        "autostruct" => Some(EntityKind::Struct),
        "autounion" => Some(EntityKind::Union),
        "autoenum" => Some(EntityKind::Enum),
        "automacro" => Some(EntityKind::Macro),
        "autovar" => Some(EntityKind::Variable),
        "autotype" => Some(EntityKind::Typedef),
        _ => None,
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

struct Directive<'a> {
    domain: &'a str,
    name: &'a str,
    options: HashMap<String, String>,
}

impl Build {
    /// Replace every directive block in `markdown` with its rendering.
    pub fn expand_directives(&mut self, markdown: &str) -> String {
        let lines: Vec<&str> = markdown.split('\n').collect();
        let mut out: Vec<String> = Vec::with_capacity(lines.len());

        let mut i = 0;
        while i < lines.len() {
            let Some(caps) = RE_HEADER.captures(lines[i]) else {
                out.push(lines[i].to_string());
                i += 1;
                continue;
            };
            let indent = caps.get(1).map_or("", |m| m.as_str());
            let mut directive = Directive {
                domain: caps.get(2).map_or("c", |m| m.as_str()),
                name: caps.get(3).map_or("", |m| m.as_str()),
                options: HashMap::new(),
            };

            i += 1;
            while i < lines.len() {
                let Some(caps) = lines[i]
                    .strip_prefix(indent)
                    .and_then(|rest| RE_OPTION.captures(rest))
                else {
                    break;
                };
                let value = caps[2].trim();
                if !value.is_empty() {
                    directive.options.insert(caps[1].to_string(), value.to_string());
                }
                i += 1;
            }

            let rendered = self.render_directive(&directive);
            out.push(rendered.trim_end_matches('\n').to_string());
        }
        out.join("\n")
    }

    fn render_directive(&mut self, directive: &Directive) -> String {
        let Directive {
            domain,
            name,
            options,
        } = directive;
        let Some(file) = options.get("file") else {
            return format!("<!-- cdoc: missing :file: for {domain}:{name} -->\n");
        };

        let path = self.directive_path(file);
        debug!("{}:{} from {}", domain, name, path.display());
        let args = self.config.parser_args.clone();
        let entities = self.cache.get(&path, &args);

        let mut cfg = self.render_config_for(domain);
        if let Some(Ok(level)) = options.get("heading_level").map(|v| v.parse::<usize>()) {
            cfg.heading_level = level;
        }
        if let Some(members) = options.get("members") {
            cfg.members = truthy(members);
        }

        if *name == "autodoc" {
            return render_autodoc(&entities, &cfg, options.get("title").map(String::as_str));
        }
        let Some(symbol) = options.get("name") else {
            return format!("<!-- cdoc: missing :name: for {domain}:{name} -->\n");
        };
        render_single(&entities, symbol, directive_kind(name), &cfg)
    }

    /// Absolute paths are taken as-is; relative ones are looked up under
    /// each collection root, defaulting to the first.
    fn directive_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.groups
            .iter()
            .map(|g| g.root.join(path))
            .find(|candidate| candidate.is_file())
            .or_else(|| self.groups.first().map(|g| g.root.join(path)))
            .unwrap_or_else(|| self.base_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SourceSpec};
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "\
/** Start the engine. */
int engine_init(int flags);

/** A flag. */
#define ENGINE_FAST 1

/**
 * Engine state.
 */
struct engine {
\t/** Flags in use. */
\tint flags;
};
";

    fn build() -> (TempDir, Build) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/core")).unwrap();
        fs::write(tmp.path().join("src/core/engine.h"), HEADER).unwrap();
        let config = Config {
            sources: vec![SourceSpec::Root("src".into())],
            ..Config::default()
        };
        let mut build = Build::new(config, tmp.path());
        build.discover();
        (tmp, build)
    }

    #[test]
    fn single_function() {
        let (_tmp, mut build) = build();
        let md = build.expand_directives(
            "Intro.\n\n::: c:autofunction\n    :file: core/engine.h\n    :name: engine_init\n\nAfter.",
        );
        assert!(md.starts_with("Intro.\n\n<a id=\"func-engine_init\"></a>\n\n## Function: `engine_init`"));
        assert!(md.contains("Start the engine."));
        assert!(md.ends_with("\n\nAfter."));
        assert!(!md.contains(":::"));
    }

    #[test]
    fn autodoc_with_options() {
        let (_tmp, mut build) = build();
        let md = build.expand_directives(
            "::: c:autodoc\n  :file: core/engine.h\n  :title: Engine\n  :heading_level: 3\n  :members: no\n",
        );
        assert!(md.starts_with("## Engine\n\n"));
        assert!(md.contains("### Struct: `engine`"));
        assert!(md.contains("### Macro: `ENGINE_FAST`"));
        assert!(!md.contains("Flags in use."));
    }

    #[test]
    fn macro_directive() {
        let (_tmp, mut build) = build();
        let md = build.expand_directives(
            "::: c:automacro\n    :file: core/engine.h\n    :name: ENGINE_FAST",
        );
        assert!(md.contains("Macro: `ENGINE_FAST`"));
    }

    #[test]
    fn missing_options_become_comments() {
        let (_tmp, mut build) = build();
        assert_eq!(
            build.expand_directives("::: cpp:autostruct\n    :name: engine\n"),
            "<!-- cdoc: missing :file: for cpp:autostruct -->\n"
        );
        assert_eq!(
            build.expand_directives("::: c:autofunction\n    :file: core/engine.h"),
            "<!-- cdoc: missing :name: for c:autofunction -->"
        );
    }

    #[test]
    fn unknown_symbol_and_kind_mismatch() {
        let (_tmp, mut build) = build();
        let md = build.expand_directives(
            "::: c:autostruct\n    :file: core/engine.h\n    :name: engine_init",
        );
        assert_eq!(md, "<!-- cdoc: symbol 'engine_init' not found -->");
    }

    #[test]
    fn options_must_be_indented_deeper() {
        let (_tmp, mut build) = build();
        let md = build.expand_directives("  ::: c:autodoc\n  :file: core/engine.h\n");
        assert!(md.starts_with("<!-- cdoc: missing :file: for c:autodoc -->\n  :file:"));
    }

    #[test]
    fn text_without_directives_is_unchanged() {
        let (_tmp, mut build) = build();
        let text = "# Title\n\n:::note\n    :file: x\n";
        assert_eq!(build.expand_directives(text), text);
    }
}
