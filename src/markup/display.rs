//! Structured markup → display markdown.
//!
//! A line scanner with one open section at a time (body, example, how-to,
//! notes). [`transition`] decides what each line does given the scanner
//! state; the scanner applies the decision to its buffers. Field markers
//! are gathered into a parameter table and a returns line, examples are
//! wrapped in `EXAMPLE_START`/`EXAMPLE_END` markers at the paragraph that
//! introduced them, and how-to/notes prose goes into an appendix block.

use super::{
    APPENDIX_END, APPENDIX_START, EXAMPLE_END, EXAMPLE_START, HOWTO_END, HOWTO_START, NOTES_END,
    NOTES_START,
};
use crate::model::{DocumentedEntity, EntityKind, FieldMap, Parameter};
use crate::text::dedent;
use regex::Regex;
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:param\s+(\w+):\s*(.+)").unwrap());

static RE_TYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:type\s+(\w+):\s*(.+)").unwrap());

static RE_RETURNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:returns?:\s*(.+)").unwrap());

static RE_RTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:rtype:\s*(.+)").unwrap());

static RE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r":(?:c(?:pp)?:)?(?:func|macro|type|const|var|struct|union|enum|member|data|class):`([^`]+)`",
    )
    .unwrap()
});

static RE_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"``([^`]+)``").unwrap());

static RE_NAME_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+\s*:\s*$").unwrap());

static RE_EXAMPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:examples?|example usage|usage example|samples?|sample usage)\s*:?\s*$")
        .unwrap()
});

static RE_EXAMPLE_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:examples?|samples?)\s*:\s*$").unwrap());

static RE_HOWTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^how\s*to\s*:?\s*$").unwrap());

static RE_HOWTO_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhow\s*to\s*:\s*$").unwrap());

static RE_NOTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^notes?\s*:?\s*$").unwrap());

static RE_NOTES_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnotes?\s*:\s*$").unwrap());

// -- Scanner state ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    Body,
    Example,
    HowTo,
    Notes,
}

/// A recognized field marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Param { name: String, description: String },
    ParamType { name: String, ty: String },
    Returns(String),
    ReturnType(String),
}

/// What the scanner knows when it looks at the next line.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub section: Section,
    /// Non-blank lines collected in the open section.
    pub collected: usize,
    /// Fence lines collected in the open section.
    pub fences: usize,
    /// At least one line has been processed.
    pub started: bool,
}

impl ScanState {
    fn in_fence(&self) -> bool {
        self.section == Section::Example && self.fences % 2 == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Emit {
    #[default]
    Nothing,
    Body(String),
    /// Append to the open section's buffer.
    Collect(String),
    Field(Field),
}

/// Effect of one line. Applied in field order: close, paragraph reset,
/// lead, emit, paragraph break, open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub close: bool,
    /// The next paragraph starts at the current end of the body.
    pub reset_paragraph: bool,
    /// Text before an inline section header.
    pub lead: Option<String>,
    pub emit: Emit,
    /// The line was a blank body line.
    pub paragraph_break: bool,
    pub open: Option<Section>,
}

/// Decide what `line` does in state `state`. `name` is the documented
/// entity's name, used to drop a redundant `name:` first line.
pub fn transition(state: &ScanState, line: &str, name: &str) -> Transition {
    let stripped = line.trim();
    let mut t = Transition::default();

    let in_fence = state.in_fence();
    let header = if in_fence {
        None
    } else {
        detect_header(stripped, state.section)
    };

    if let Some((section, lead)) = header {
        t.close = state.section != Section::Body;
        t.lead = lead;
        t.open = Some(section);
        return t;
    }

    if !state.started && state.section == Section::Body && is_name_line(stripped, name) {
        return t;
    }

    let field = parse_field(stripped);
    match state.section {
        Section::Body => {}
        Section::HowTo | Section::Notes => {
            if field.is_none() {
                t.emit = Emit::Collect(line.to_string());
                return t;
            }
            t.close = true;
        }
        Section::Example => {
            if field.is_some() {
                t.close = true;
            } else if state.collected > 0
                && !in_fence
                && !stripped.is_empty()
                && !line.starts_with([' ', '\t'])
                && !stripped.starts_with("```")
            {
                // Unindented prose after code ends the example.
                t.close = true;
                t.reset_paragraph = true;
                if let Some((section, lead)) = detect_header(stripped, Section::Body) {
                    t.lead = lead;
                    t.open = Some(section);
                    return t;
                }
            } else {
                t.emit = Emit::Collect(line.to_string());
                return t;
            }
        }
    }

    match field {
        Some(field) => t.emit = Emit::Field(field),
        None => {
            t.paragraph_break = stripped.is_empty();
            t.emit = Emit::Body(rewrite_inline(line));
        }
    }
    t
}

/// A header line opening `section`, and for inline headers the text
/// preceding it.
fn detect_header(stripped: &str, current: Section) -> Option<(Section, Option<String>)> {
    let table: [(Section, &Regex, &Regex); 3] = [
        (Section::HowTo, &*RE_HOWTO, &*RE_HOWTO_INLINE),
        (Section::Notes, &*RE_NOTES, &*RE_NOTES_INLINE),
        (Section::Example, &*RE_EXAMPLE, &*RE_EXAMPLE_INLINE),
    ];
    for (section, standalone, inline) in table {
        if standalone.is_match(stripped)
            || (section == Section::Example && stripped.starts_with(".. code-block::"))
        {
            return Some((section, None));
        }
        if current != section {
            if let Some(m) = inline.find(stripped) {
                let lead = stripped[..m.start()].trim_end();
                return Some((section, (!lead.is_empty()).then(|| lead.to_string())));
            }
        }
    }
    None
}

fn parse_field(stripped: &str) -> Option<Field> {
    if let Some(c) = RE_PARAM.captures(stripped) {
        return Some(Field::Param {
            name: c[1].to_string(),
            description: c[2].trim().to_string(),
        });
    }
    if let Some(c) = RE_TYPE.captures(stripped) {
        return Some(Field::ParamType {
            name: c[1].to_string(),
            ty: c[2].trim().to_string(),
        });
    }
    if let Some(c) = RE_RETURNS.captures(stripped) {
        return Some(Field::Returns(c[1].trim().to_string()));
    }
    RE_RTYPE
        .captures(stripped)
        .map(|c| Field::ReturnType(c[1].trim().to_string()))
}

fn is_name_line(stripped: &str, name: &str) -> bool {
    if RE_NAME_COLON.is_match(stripped) {
        return true;
    }
    !name.is_empty()
        && stripped
            .strip_suffix(':')
            .is_some_and(|rest| rest.trim_end() == name)
}

/// Cross-reference markup and double-backtick literals → code spans.
fn rewrite_inline(line: &str) -> String {
    let line = RE_REF.replace_all(line, "`$1`");
    RE_LITERAL.replace_all(&line, "`$1`").into_owned()
}

// -- Scanner --------------------------------------------------------------------------

struct Example {
    lines: Vec<String>,
    anchor: usize,
}

#[derive(Default)]
struct Scanner {
    state: ScanState,
    body: Vec<String>,
    params: FieldMap,
    param_types: FieldMap,
    returns: Option<String>,
    examples: Vec<Example>,
    section_lines: Vec<String>,
    paragraph: usize,
    howto: Vec<String>,
    notes: Vec<String>,
}

impl Scanner {
    fn feed(&mut self, line: &str, name: &str) {
        let t = transition(&self.state, line, name);
        self.state.started = true;

        if t.close {
            self.close_section();
        }
        if t.reset_paragraph {
            self.paragraph = self.body.len();
        }
        if let Some(lead) = t.lead {
            self.body.push(rewrite_inline(&lead));
        }
        match t.emit {
            Emit::Nothing => {}
            Emit::Body(text) => self.body.push(text),
            Emit::Collect(text) => {
                let stripped = text.trim();
                if !stripped.is_empty() {
                    self.state.collected += 1;
                }
                if stripped.starts_with("```") {
                    self.state.fences += 1;
                }
                self.section_lines.push(text);
            }
            Emit::Field(field) => self.record(field),
        }
        if t.paragraph_break {
            self.paragraph = self.body.len();
        }
        if let Some(section) = t.open {
            self.state.section = section;
        }
    }

    fn record(&mut self, field: Field) {
        match field {
            Field::Param { name, description } => self.params.insert(name, description),
            Field::ParamType { name, ty } => self.param_types.insert(name, ty),
            Field::Returns(text) => self.returns = Some(text),
            Field::ReturnType(_) => {}
        }
    }

    fn close_section(&mut self) {
        let lines = std::mem::take(&mut self.section_lines);
        match self.state.section {
            Section::Body => {}
            Section::Example => self.examples.push(Example {
                lines,
                anchor: self.paragraph,
            }),
            Section::HowTo => self.howto.extend(lines),
            Section::Notes => self.notes.extend(lines),
        }
        self.state.section = Section::Body;
        self.state.collected = 0;
        self.state.fences = 0;
    }

    fn finish(mut self, entity: Option<&DocumentedEntity>) -> String {
        self.close_section();

        let mut out = self.body;
        while out.last().is_some_and(|l| l.trim().is_empty()) {
            out.pop();
        }

        let mut param_types = FieldMap::new();
        if let Some(entity) = entity {
            for Parameter { ty, name } in &entity.parameters {
                if !ty.is_empty() && !name.is_empty() {
                    param_types.insert(name.clone(), ty.clone());
                }
            }
        }
        for (name, ty) in self.param_types.iter() {
            param_types.insert(name, ty);
        }

        let returns = self.returns.or_else(|| entity.and_then(synthesize_returns));

        if !self.params.is_empty() {
            push_param_table(&mut out, &self.params, &param_types);
        }
        if let Some(returns) = returns {
            out.push(String::new());
            out.push(format!("**Returns:** {returns}"));
        }

        let examples: Vec<Example> = self
            .examples
            .into_iter()
            .filter_map(|mut ex| {
                trim_blank_edges(&mut ex.lines);
                (!ex.lines.is_empty()).then_some(ex)
            })
            .collect();
        for (idx, ex) in examples.iter().enumerate().rev() {
            let label = example_label(idx);
            let block = example_block(&label, &ex.lines);
            let at = ex.anchor.min(out.len());
            out.splice(at..at, block);
        }

        let howto = self.howto.join("\n").trim().to_string();
        let notes = self.notes.join("\n").trim().to_string();
        if !howto.is_empty() || !notes.is_empty() {
            out.push(String::new());
            out.push(APPENDIX_START.to_string());
            if !howto.is_empty() {
                out.extend([HOWTO_START.to_string(), howto, HOWTO_END.to_string()]);
            }
            if !notes.is_empty() {
                out.extend([NOTES_START.to_string(), notes, NOTES_END.to_string()]);
            }
            out.push(APPENDIX_END.to_string());
        }

        out.join("\n")
    }
}

// -- Output assembly ----------------------------------------------------------------

/// Returns text derived from the declared return type, or `None` when
/// nothing should be shown (no type, `void`, macros).
fn synthesize_returns(entity: &DocumentedEntity) -> Option<String> {
    if entity.kind.is_macro() || matches!(entity.kind, EntityKind::Test | EntityKind::Subtest) {
        return None;
    }
    let rt = entity.return_type.trim();
    if rt.is_empty() || rt == "void" {
        return None;
    }
    if !rt.contains('*') {
        return Some(format!("`{rt}`"));
    }
    let stars = rt.matches('*').count();
    let base = rt.replace('*', "");
    let base = base.trim();
    let prefix = if stars > 1 {
        "Pointer to pointer to"
    } else {
        "Pointer to"
    };
    Some(if base.is_empty() {
        format!("{prefix} void")
    } else {
        format!("{prefix} `{base}`")
    })
}

fn push_param_table(out: &mut Vec<String>, params: &FieldMap, types: &FieldMap) {
    let has_types = params.keys().any(|name| types.contains_key(name));
    out.extend(["".to_string(), "**Parameters:**".to_string(), "".to_string()]);
    if has_types {
        out.push("| Name | Type | Description |".to_string());
        out.push("|------|------|-------------|".to_string());
    } else {
        out.push("| Name | Description |".to_string());
        out.push("|------|-------------|".to_string());
    }
    for (name, desc) in params.iter() {
        let desc = rewrite_inline(desc);
        match types.get(name) {
            Some(ty) => out.push(format!("| `{name}` | `{ty}` | {desc} |")),
            None if has_types => out.push(format!("| `{name}` | | {desc} |")),
            None => out.push(format!("| `{name}` | {desc} |")),
        }
    }
}

fn example_label(idx: usize) -> String {
    if idx == 0 {
        "Example".to_string()
    } else {
        format!("Example {}", idx + 1)
    }
}

fn example_block(label: &str, lines: &[String]) -> Vec<String> {
    let mut block = vec![format!("{EXAMPLE_START}{label} -->")];
    if lines.iter().any(|l| l.trim().starts_with("```")) {
        block.extend(lines.iter().cloned());
    } else {
        block.push(format!("```{}", detect_code_lang(lines)));
        block.extend(dedent(&lines.join("\n")).split('\n').map(str::to_string));
        block.push("```".to_string());
    }
    block.push(EXAMPLE_END.to_string());
    block
}

/// Shell prompts mean a shell session; anything else is C.
fn detect_code_lang(lines: &[String]) -> &'static str {
    let shell = lines.iter().any(|l| {
        let s = l.trim();
        s.starts_with('$') || s.starts_with("# $")
    });
    if shell {
        "bash"
    } else {
        "c"
    }
}

fn trim_blank_edges(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let lead = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..lead);
}

// -- Public API -----------------------------------------------------------------------

/// Convert structured markup to display markdown. `entity` supplies the
/// name, kind, parameter types and return type used for the parameter
/// table and the synthesized returns line.
pub fn rst_to_markdown(text: &str, entity: Option<&DocumentedEntity>) -> String {
    let name = entity.map_or("", |e| e.name.as_str());
    let mut scanner = Scanner::default();
    for line in text.split('\n') {
        scanner.feed(line, name);
    }
    scanner.finish(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;

    fn function(name: &str, ret: &str, params: &[(&str, &str)]) -> DocumentedEntity {
        let mut e = DocumentedEntity::new(name, EntityKind::Function, "");
        e.return_type = ret.to_string();
        e.parameters = params.iter().map(|(t, n)| Parameter::new(*t, *n)).collect();
        e
    }

    #[test]
    fn param_table_with_types() {
        let e = function("f", "void", &[("int", "x")]);
        let md = rst_to_markdown("Does f.\n\n:param x: the value", Some(&e));
        assert!(md.contains("| Name | Type | Description |"));
        assert!(md.contains("| `x` | `int` | the value |"));
        assert!(!md.contains("**Returns:**"));
    }

    #[test]
    fn param_table_without_types() {
        let md = rst_to_markdown(":param a: first\n:param b: second", None);
        assert!(md.contains("| Name | Description |"));
        let a = md.find("| `a` | first |").unwrap();
        let b = md.find("| `b` | second |").unwrap();
        assert!(a < b);
    }

    #[test]
    fn explicit_type_field_overrides_signature() {
        let e = function("f", "void", &[("int", "x")]);
        let md = rst_to_markdown(":param x: v\n:type x: long", Some(&e));
        assert!(md.contains("| `x` | `long` | v |"));
    }

    #[test]
    fn pointer_return_is_synthesized() {
        let e = function("name", "char *", &[]);
        let md = rst_to_markdown("Gets the name.", Some(&e));
        assert!(md.contains("**Returns:** Pointer to `char`"));
    }

    #[test]
    fn double_pointer_and_void_pointer() {
        let e = function("f", "char **", &[]);
        assert!(rst_to_markdown("x", Some(&e)).contains("Pointer to pointer to `char`"));
        let e = function("f", "void *", &[]);
        assert!(rst_to_markdown("x", Some(&e)).contains("Pointer to `void`"));
        let e = function("f", "*", &[]);
        assert!(rst_to_markdown("x", Some(&e)).contains("Pointer to void"));
    }

    #[test]
    fn plain_return_type() {
        let e = function("f", "int", &[]);
        assert!(rst_to_markdown("x", Some(&e)).contains("**Returns:** `int`"));
    }

    #[test]
    fn explicit_returns_wins() {
        let e = function("f", "int", &[]);
        let md = rst_to_markdown(":returns: zero on success", Some(&e));
        assert!(md.contains("**Returns:** zero on success"));
        assert!(!md.contains("`int`"));
    }

    #[test]
    fn macros_get_no_synthesized_returns() {
        let mut e = function("M", "int", &[]);
        e.kind = EntityKind::MacroFunction;
        assert!(!rst_to_markdown("x", Some(&e)).contains("Returns"));
    }

    #[test]
    fn references_become_code_spans() {
        let md = rst_to_markdown("See :c:func:`other` and ``NULL``.", None);
        assert_eq!(md, "See `other` and `NULL`.");
    }

    #[test]
    fn redundant_name_line_dropped() {
        let e = function("engine_run", "void", &[]);
        assert_eq!(rst_to_markdown("engine_run:\nRuns it.", Some(&e)), "Runs it.");
        assert_eq!(rst_to_markdown("whatever:\nBody.", None), "Body.");
    }

    #[test]
    fn single_example_is_fenced_and_dedented() {
        let md = rst_to_markdown("Intro.\n\nExample:\n    foo(1);\n    bar(2);", None);
        assert!(md.contains("<!-- EXAMPLE_START:Example -->\n```c\nfoo(1);\nbar(2);\n```\n<!-- EXAMPLE_END -->"));
        assert!(md.starts_with("Intro."));
    }

    #[test]
    fn two_examples_separated_by_prose() {
        let text = "Intro.\n\nExample:\n    one();\n\nMiddle prose.\n\nExample:\n    two();";
        let md = rst_to_markdown(text, None);
        let first = md.find("EXAMPLE_START:Example -->").unwrap();
        let second = md.find("EXAMPLE_START:Example 2 -->").unwrap();
        assert!(first < second);
        assert_eq!(md.matches("EXAMPLE_START").count(), 2);
        let middle = md.find("Middle prose.").unwrap();
        let first_end = md.find(EXAMPLE_END).unwrap();
        assert!(first_end < middle && middle < second);
        assert!(md.contains("one();"));
        assert!(md.contains("two();"));
    }

    #[test]
    fn existing_fence_kept_verbatim() {
        let text = "Example:\n```c\nint x = 1;\n```";
        let md = rst_to_markdown(text, None);
        assert!(md.contains("<!-- EXAMPLE_START:Example -->\n```c\nint x = 1;\n```\n<!-- EXAMPLE_END -->"));
        assert_eq!(md.matches("```").count(), 2);
    }

    #[test]
    fn shell_example_detected() {
        let md = rst_to_markdown("Example:\n    $ tool --run", None);
        assert!(md.contains("```bash"));
    }

    #[test]
    fn empty_example_dropped() {
        let md = rst_to_markdown("Body.\n\nExample:\n\n:param x: y", None);
        assert!(!md.contains("EXAMPLE_START"));
        assert!(md.contains("| `x` | y |"));
    }

    #[test]
    fn field_marker_closes_section() {
        let md = rst_to_markdown("HowTo:\nCall it first.\n:param x: y", None);
        assert!(md.contains("<!-- HOWTO_START -->\nCall it first.\n<!-- HOWTO_END -->"));
        assert!(md.contains("| `x` | y |"));
    }

    #[test]
    fn appendix_holds_howto_and_notes() {
        let md = rst_to_markdown("Body.\n\nHowTo:\nStep one.\n\nNotes:\nCareful.", None);
        let start = md.find(APPENDIX_START).unwrap();
        assert!(md[start..].contains("<!-- HOWTO_START -->\nStep one.\n<!-- HOWTO_END -->"));
        assert!(md[start..].contains("<!-- NOTES_START -->\nCareful.\n<!-- NOTES_END -->"));
        assert!(md.ends_with(APPENDIX_END));
        assert!(md.starts_with("Body."));
    }

    #[test]
    fn inline_header_flushes_lead() {
        let md = rst_to_markdown("Use it like this. Example:\n    run();", None);
        let card = md.find("EXAMPLE_START").unwrap();
        let lead = md.find("Use it like this.").unwrap();
        assert!(card < lead);
        assert!(md.contains("run();"));
        assert!(!md.contains("Example:"));
    }

    #[test]
    fn unindented_prose_ends_example() {
        let md = rst_to_markdown("Example:\n    a();\nAfter the example.", None);
        let end = md.find(EXAMPLE_END).unwrap();
        assert!(md[end..].contains("After the example."));
    }

    #[test]
    fn header_inside_fence_is_code() {
        let md = rst_to_markdown("Example:\n```\nNotes:\n```", None);
        assert!(!md.contains(NOTES_START));
        assert!(md.contains("```\nNotes:\n```"));
    }

    #[test]
    fn transition_opens_example() {
        let state = ScanState {
            started: true,
            ..ScanState::default()
        };
        let t = transition(&state, "Example:", "");
        assert_eq!(t.open, Some(Section::Example));
        assert!(!t.close);
        assert_eq!(t.emit, Emit::Nothing);
    }

    #[test]
    fn transition_collects_in_howto() {
        let state = ScanState {
            section: Section::HowTo,
            started: true,
            ..ScanState::default()
        };
        let t = transition(&state, "do this", "");
        assert_eq!(t.emit, Emit::Collect("do this".to_string()));
        assert_eq!(t.open, None);
    }

    #[test]
    fn transition_blank_body_line_breaks_paragraph() {
        let state = ScanState {
            started: true,
            ..ScanState::default()
        };
        let t = transition(&state, "", "");
        assert!(t.paragraph_break);
        assert_eq!(t.emit, Emit::Body(String::new()));
    }
}
