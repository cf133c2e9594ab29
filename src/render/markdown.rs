//! Markdown rendering of documented entities.

use crate::markup::{
    rst_to_markdown, APPENDIX_END, APPENDIX_RENDER_END, APPENDIX_RENDER_START, APPENDIX_START,
    EXAMPLE_END, EXAMPLE_START, HOWTO_END, HOWTO_START, NOTES_END, NOTES_START,
};
use crate::model::{DocumentedEntity, EntityKind};
use crate::render::html::example_card;
use crate::render::{RenderConfig, SignatureStyle};

fn heading(text: &str, level: usize) -> String {
    format!("{} {}", "#".repeat(level.max(1)), text)
}

fn source_link(entity: &DocumentedEntity, cfg: &RenderConfig) -> String {
    if !cfg.show_source_link || cfg.source_uri.is_empty() {
        return String::new();
    }
    let uri = cfg
        .source_uri
        .replace("{filename}", &entity.source_file)
        .replace("{line}", &entity.source_line.to_string());
    format!(" [[source]({uri})]")
}

/// Render one entity and, when enabled, its members one level deeper.
pub fn render_doc(entity: &DocumentedEntity, cfg: &RenderConfig) -> String {
    let mut lines: Vec<String> = Vec::new();

    let mut title = if entity.name.is_empty() {
        "Documentation".to_string()
    } else {
        format!("`{}`", entity.name)
    };
    let label = entity.kind.label();
    if !label.is_empty() {
        title = format!("{label}: {title}");
    }
    title.push_str(&source_link(entity, cfg));

    lines.push(format!("<a id=\"{}\"></a>", entity.anchor()));
    lines.push(String::new());
    lines.push(heading(&title, cfg.heading_level));
    lines.push(String::new());

    if !entity.signature.is_empty() {
        match cfg.signature_style {
            SignatureStyle::Code => {
                lines.push(format!("```{}", cfg.language));
                lines.push(entity.signature.clone());
                lines.push("```".to_string());
            }
            SignatureStyle::Plain => lines.push(format!("`{}`", entity.signature)),
        }
        lines.push(String::new());
    }

    let comment = if cfg.convert_rst {
        rst_to_markdown(&entity.comment, Some(entity))
    } else {
        entity.comment.clone()
    };
    if !comment.is_empty() {
        let (comment, appendix) = split_appendix(&comment);
        let (examples, body) = split_examples(&comment);
        for example in &examples {
            lines.push(example.card());
            lines.push(String::new());
        }
        for part in body {
            lines.push(part);
            lines.push(String::new());
        }
        if let Some(appendix) = appendix {
            lines.push(appendix);
        }
    }

    if cfg.members && !entity.members.is_empty() {
        let nested = cfg.nested();
        for member in &entity.members {
            lines.push(render_doc(member, &nested));
        }
    }

    lines.join("\n")
}

/// Render entities separated by horizontal rules.
pub fn render_docs(entities: &[DocumentedEntity], cfg: &RenderConfig) -> String {
    entities
        .iter()
        .map(|e| render_doc(e, cfg))
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Render a whole file, optionally under a title one level above the
/// symbol headings.
pub fn render_autodoc(
    entities: &[DocumentedEntity],
    cfg: &RenderConfig,
    title: Option<&str>,
) -> String {
    let mut parts = Vec::new();
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        parts.push(heading(title, cfg.heading_level.saturating_sub(1).max(1)));
        parts.push(String::new());
    }
    parts.push(render_docs(entities, cfg));
    parts.join("\n")
}

/// Render the first top-level entity or member called `name` (and of
/// `kind`, when given). Object-like and function-like macros match either
/// macro kind.
pub fn render_single(
    entities: &[DocumentedEntity],
    name: &str,
    kind: Option<EntityKind>,
    cfg: &RenderConfig,
) -> String {
    let kind_matches =
        |k: EntityKind, e: EntityKind| e == k || (k.is_macro() && e.is_macro());
    let wanted =
        |e: &DocumentedEntity| e.name == name && kind.map_or(true, |k| kind_matches(k, e.kind));
    for entity in entities {
        if wanted(entity) {
            return render_doc(entity, cfg);
        }
        if let Some(member) = entity.members.iter().find(|m| wanted(*m)) {
            return render_doc(member, cfg);
        }
    }
    format!("<!-- cdoc: symbol '{name}' not found -->\n")
}

// -- Appendix ----------------------------------------------------------------------

/// Cut the translator's appendix out of `comment` and re-emit it as a
/// renderer appendix block. The block is `None` when it has no content.
fn split_appendix(comment: &str) -> (String, Option<String>) {
    let Some((before, rest)) = comment.split_once(APPENDIX_START) else {
        return (comment.to_string(), None);
    };
    let block = rest.split_once(APPENDIX_END).map_or(rest, |(b, _)| b);

    let (howto, block) = between(block, HOWTO_START, HOWTO_END);
    let (notes, _) = between(block, NOTES_START, NOTES_END);

    let body = before.trim_end().to_string();
    if howto.is_empty() && notes.is_empty() {
        return (body, None);
    }

    let mut out = vec![String::new(), APPENDIX_RENDER_START.to_string()];
    if !howto.is_empty() {
        out.extend(["**How To:**".to_string(), String::new(), howto, String::new()]);
    }
    if !notes.is_empty() {
        out.push(String::new());
        out.push("!!! warning \"Note\"".to_string());
        out.extend(notes.split('\n').map(|l| format!("    {l}")));
        out.push(String::new());
    }
    out.push(APPENDIX_RENDER_END.to_string());
    (body, Some(out.join("\n")))
}

/// Trimmed text between `start` and `end` in `block`, plus what follows
/// `end`. Missing markers yield empty text and the block unchanged.
fn between<'a>(block: &'a str, start: &str, end: &str) -> (String, &'a str) {
    match block.split_once(start) {
        Some((_, rest)) => match rest.split_once(end) {
            Some((inner, after)) => (inner.trim().to_string(), after),
            None => (rest.trim().to_string(), ""),
        },
        None => (String::new(), block),
    }
}

/// Move a rendered appendix block out of `rendered`, returning the text
/// without it and the block's inner content.
pub fn take_render_appendix(rendered: &str) -> (String, Option<String>) {
    let Some((before, rest)) = rendered.split_once(APPENDIX_RENDER_START) else {
        return (rendered.to_string(), None);
    };
    let (inner, after) = rest.split_once(APPENDIX_RENDER_END).unwrap_or((rest, ""));
    (format!("{before}{after}"), Some(inner.trim().to_string()))
}

// -- Examples --------------------------------------------------------------------------

struct Example {
    label: String,
    lang: String,
    code: String,
}

impl Example {
    fn card(&self) -> String {
        example_card(&self.label, &self.lang, &self.code)
    }
}

/// Split example blocks out of `comment`. Returns the examples in order
/// and the non-empty prose parts around them.
fn split_examples(comment: &str) -> (Vec<Example>, Vec<String>) {
    let mut examples = Vec::new();
    let mut body = Vec::new();
    let mut rest = comment;

    while let Some((before, after)) = rest.split_once(EXAMPLE_START) {
        let Some((header, tail)) = after.split_once(" -->") else {
            break;
        };
        let (content, next) = tail.split_once(EXAMPLE_END).unwrap_or((tail, ""));
        push_part(&mut body, before);
        examples.push(parse_example(header, content));
        rest = next;
    }
    push_part(&mut body, rest);
    (examples, body)
}

fn push_part(parts: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        parts.push(text.to_string());
    }
}

/// The fenced code of one example block. Text outside the fence is dropped.
fn parse_example(label: &str, content: &str) -> Example {
    let label = if label.trim().is_empty() {
        "Example"
    } else {
        label.trim()
    };
    let mut lang = "c".to_string();
    let mut code = Vec::new();
    let mut in_fence = false;
    for line in content.trim().split('\n') {
        let stripped = line.trim();
        if let Some(tag) = stripped.strip_prefix("```") {
            if !in_fence {
                let tag = tag.trim();
                if !tag.is_empty() {
                    lang = tag.to_string();
                }
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            code.push(line);
        }
    }
    Example {
        label: label.to_string(),
        lang,
        code: code.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;

    fn cfg() -> RenderConfig {
        RenderConfig {
            heading_level: 2,
            ..RenderConfig::default()
        }
    }

    fn function(name: &str, comment: &str) -> DocumentedEntity {
        let mut e = DocumentedEntity::new(name, EntityKind::Function, comment);
        e.signature = format!("int {name}(int x)");
        e.return_type = "int".into();
        e.parameters = vec![Parameter::new("int", "x")];
        e.source_file = "engine.c".into();
        e.source_line = 12;
        e
    }

    #[test]
    fn heading_anchor_and_signature() {
        let md = render_doc(&function("engine_start", "Starts it."), &cfg());
        assert!(md.starts_with("<a id=\"func-engine_start\"></a>\n\n## Function: `engine_start`\n"));
        assert!(md.contains("```c\nint engine_start(int x)\n```"));
        assert!(md.contains("Starts it."));
    }

    #[test]
    fn plain_signature_style() {
        let cfg = RenderConfig {
            signature_style: SignatureStyle::Plain,
            ..cfg()
        };
        let md = render_doc(&function("f", ""), &cfg);
        assert!(md.contains("\n`int f(int x)`\n"));
        assert!(!md.contains("```"));
    }

    #[test]
    fn anonymous_entity_heading() {
        let e = DocumentedEntity::new("", EntityKind::Generic, "Text.");
        let md = render_doc(&e, &cfg());
        assert!(md.contains("## Documentation"));
    }

    #[test]
    fn source_link_template() {
        let cfg = RenderConfig {
            show_source_link: true,
            source_uri: "https://git.example.org/src/{filename}#L{line}".into(),
            ..cfg()
        };
        let md = render_doc(&function("f", ""), &cfg);
        assert!(md.contains("## Function: `f` [[source](https://git.example.org/src/engine.c#L12)]"));
    }

    #[test]
    fn parameter_row_from_field_marker() {
        let md = render_doc(&function("f", "Does f.\n\n:param x: the value"), &cfg());
        assert!(md.contains("| `x` | `int` | the value |"));
    }

    #[test]
    fn examples_become_cards_before_body() {
        let comment = "Intro.\n\nExample:\n    f(1 < 2);\n\nMore prose.\n\nExample:\n    f(3);";
        let md = render_doc(&function("f", comment), &cfg());
        let first = md.find("<span class=\"hm-example-label\">Example</span>").unwrap();
        let second = md.find("<span class=\"hm-example-label\">Example 2</span>").unwrap();
        let intro = md.find("Intro.").unwrap();
        assert!(first < second && second < intro);
        assert!(md.contains("f(1 &lt; 2);"));
        assert!(md.contains("More prose."));
        assert!(!md.contains(EXAMPLE_START));
    }

    #[test]
    fn appendix_is_reemitted() {
        let comment = "Does f.\n\nHowTo:\nCall it first.\n\nNotes:\nNot thread safe.\nReally.";
        let md = render_doc(&function("f", comment), &cfg());
        let start = md.find(APPENDIX_RENDER_START).unwrap();
        let end = md.find(APPENDIX_RENDER_END).unwrap();
        let block = &md[start..end];
        assert!(block.contains("**How To:**\n\nCall it first."));
        assert!(block.contains("!!! warning \"Note\"\n    Not thread safe.\n    Really."));
        assert!(!md.contains(APPENDIX_START));
    }

    #[test]
    fn take_appendix_from_rendered() {
        let md = render_doc(&function("f", "Does f.\n\nHowTo:\nStep."), &cfg());
        let (rest, inner) = take_render_appendix(&md);
        assert_eq!(inner.as_deref().map(|s| s.starts_with("**How To:**")), Some(true));
        assert!(!rest.contains("APPENDIX_RENDER"));
        assert!(rest.contains("Does f."));
    }

    #[test]
    fn members_one_level_deeper() {
        let mut s = DocumentedEntity::new("cfg", EntityKind::Struct, "Settings.");
        s.members
            .push(DocumentedEntity::new("debug", EntityKind::Field, "Debug flag."));
        let md = render_doc(&s, &cfg());
        assert!(md.contains("## Struct: `cfg`"));
        assert!(md.contains("<a id=\"field-debug\"></a>\n\n### Field: `debug`"));

        let no_members = RenderConfig {
            members: false,
            ..cfg()
        };
        assert!(!render_doc(&s, &no_members).contains("debug"));
    }

    #[test]
    fn docs_joined_by_rule_and_titled() {
        let docs = vec![function("a", ""), function("b", "")];
        let md = render_autodoc(&docs, &cfg(), Some("Engine"));
        assert!(md.starts_with("# Engine\n\n"));
        assert_eq!(md.matches("\n---\n\n").count(), 1);
    }

    #[test]
    fn single_lookup_and_missing_marker() {
        let mut s = DocumentedEntity::new("cfg", EntityKind::Struct, "");
        s.members.push(DocumentedEntity::new("debug", EntityKind::Field, ""));
        let docs = vec![function("a", ""), s];

        assert!(render_single(&docs, "debug", None, &cfg()).contains("Field: `debug`"));
        assert!(render_single(&docs, "a", Some(EntityKind::Function), &cfg()).contains("`a`"));
        assert_eq!(
            render_single(&docs, "a", Some(EntityKind::Struct), &cfg()),
            "<!-- cdoc: symbol 'a' not found -->\n"
        );
    }
}
