//! Fallback backend: a doc comment followed by the next declaration line,
//! classified by its leading keyword.

use super::{display_name, SourceParser};
use crate::comment::clean_comment;
use crate::error::ParseError;
use crate::model::{DocumentedEntity, EntityKind, Parameter};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_DOC_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(.+?)\*/[ \t]*\r?\n\s*(.+?)(?:\n|;|\{)").unwrap());

static RE_MEMBER_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(.+?)\*/\s*(.+?)(?:\n|;|,|\{|\})").unwrap());

static RE_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:static|extern|const)\s+)*(struct|union|enum)\b\s*(\w*)").unwrap()
});

static RE_TYPEDEF_RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^typedef\s+(struct|union|enum)\b\s*(\w*)").unwrap());

static RE_FUNC_POINTER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\*\s*(\w+)\s*\)").unwrap());

static RE_TRAILING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*;").unwrap());

pub struct PatternParser;

impl SourceParser for PatternParser {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn is_precise(&self) -> bool {
        false
    }

    fn parse(
        &self,
        path: &Path,
        source: &str,
        _args: &[String],
    ) -> Result<Vec<DocumentedEntity>, ParseError> {
        let file = display_name(path);
        let mut entities = Vec::new();
        let mut consumed = 0;

        for caps in RE_DOC_DECL.captures_iter(source) {
            let (Some(whole), Some(decl_match)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if whole.start() < consumed {
                continue;
            }
            let decl = complete_parens(source, decl_match.start(), decl_match.as_str());
            let decl = decl.trim();
            if decl.is_empty() || decl.starts_with("/*") || decl.starts_with("//") {
                continue;
            }

            let comment = clean_comment(&format!("/**{}*/", &caps[1]));
            let mut entity = classify(decl, comment);
            entity.source_file = file.clone();
            entity.source_line = line_of(source, decl_match.start());

            let body = body_start(source, whole.end()).filter(|_| entity.kind.is_container());
            if let Some(open) = body {
                if let Some(close) = matching_brace(source, open) {
                    let body = &source[open + 1..close];
                    entity.members = members(body, entity.kind, &file, source, open + 1);
                    if decl.starts_with("typedef") {
                        if let Some(name) = RE_TRAILING_NAME.captures(&source[close + 1..]) {
                            entity.name = name[1].to_string();
                            entity.signature = format!("{} {}", entity.signature, entity.name);
                        }
                    }
                    consumed = close;
                }
            }
            entities.push(entity);
        }
        Ok(entities)
    }
}

/// Build an entity from one declaration line.
fn classify(decl: &str, comment: String) -> DocumentedEntity {
    let signature = squash(decl.trim_end_matches(['{', ';']).trim());

    if let Some(rest) = decl.strip_prefix("#define") {
        let rest = rest.trim_start();
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let is_function = rest[name.len()..].starts_with('(');
        let kind = if is_function {
            EntityKind::MacroFunction
        } else {
            EntityKind::Macro
        };
        let mut entity = DocumentedEntity::new(name.as_str(), kind, comment);
        if is_function {
            entity.parameters = paren_contents(&rest[name.len()..])
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Parameter::new("", p))
                .collect();
        }
        entity.signature = signature;
        return entity;
    }

    if let Some(caps) = RE_TYPEDEF_RECORD.captures(decl) {
        if !decl.contains(';') && (decl.trim_end().ends_with(&caps[0]) || caps[2].is_empty()) {
            // typedef struct [tag] { ... } name; the name follows the body.
            let mut entity = DocumentedEntity::new(&caps[2], record_kind(&caps[1]), comment);
            entity.signature = format!("typedef {}", squash(&caps[0]["typedef".len()..]));
            return entity;
        }
    }

    if decl.starts_with("typedef ") {
        let name = RE_FUNC_POINTER_NAME
            .captures(decl)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| last_identifier(&signature));
        let mut entity = DocumentedEntity::new(name, EntityKind::Typedef, comment);
        entity.signature = signature;
        return entity;
    }

    if let Some(caps) = RE_RECORD.captures(decl) {
        if !decl.contains('(') {
            let mut entity = DocumentedEntity::new(&caps[2], record_kind(&caps[1]), comment);
            entity.signature = signature;
            return entity;
        }
    }

    if let Some(open) = decl.find('(') {
        let mut entity = function(decl, open, comment);
        entity.signature = signature;
        return entity;
    }

    let head = decl.split('=').next().unwrap_or(decl);
    let head = head.split('[').next().unwrap_or(head);
    let mut entity = DocumentedEntity::new(last_identifier(head), EntityKind::Variable, comment);
    entity.signature = signature;
    entity
}

fn record_kind(keyword: &str) -> EntityKind {
    match keyword {
        "union" => EntityKind::Union,
        "enum" => EntityKind::Enum,
        _ => EntityKind::Struct,
    }
}

fn function(decl: &str, open: usize, comment: String) -> DocumentedEntity {
    let pre = decl[..open].trim();
    let mut tokens: Vec<&str> = pre.split_whitespace().collect();
    let raw_name = tokens.pop().unwrap_or("");
    let name = raw_name.trim_start_matches('*');
    let stars = "*".repeat(raw_name.len() - name.len());

    let mut entity = DocumentedEntity::new(name, EntityKind::Function, comment);
    let base = tokens.join(" ");
    entity.return_type = match (base.is_empty(), stars.is_empty()) {
        (_, true) => base,
        (true, false) => stars,
        (false, false) => format!("{base} {stars}"),
    };

    let params = paren_contents(&decl[open..]).trim();
    if !params.is_empty() && params != "void" {
        entity.parameters = params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(parameter)
            .collect();
    }
    entity
}

/// `const char *name` → (`const char *`, `name`).
fn parameter(text: &str) -> Parameter {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            let name = last.trim_start_matches('*');
            let stars = &last[..last.len() - name.len()];
            let name = name.split('[').next().unwrap_or(name);
            let ty = format!("{} {}", rest.join(" "), stars);
            Parameter::new(ty.trim(), name)
        }
        _ => Parameter::new("", text),
    }
}

/// Documented fields or enumerators inside a braced body starting at
/// byte `offset` of `source`.
fn members(
    body: &str,
    parent: EntityKind,
    file: &str,
    source: &str,
    offset: usize,
) -> Vec<DocumentedEntity> {
    let mut members = Vec::new();
    for caps in RE_MEMBER_DECL.captures_iter(body) {
        let Some(decl_match) = caps.get(2) else {
            continue;
        };
        let decl = decl_match.as_str().trim();
        if decl.is_empty() || decl.starts_with("/*") || decl.starts_with("//") {
            continue;
        }
        let comment = clean_comment(&format!("/**{}*/", &caps[1]));
        let head = decl.split('=').next().unwrap_or(decl);
        let head = head.split('[').next().unwrap_or(head);
        let name = last_identifier(head);
        let kind = if parent == EntityKind::Enum {
            EntityKind::EnumConstant
        } else {
            EntityKind::Field
        };
        let mut member = DocumentedEntity::new(name, kind, comment);
        member.signature = squash(decl);
        member.source_file = file.to_string();
        member.source_line = line_of(source, offset + decl_match.start());
        members.push(member);
    }
    members
}

// -- Helpers --------------------------------------------------------------------------

/// Extend a declaration cut at a newline so an open parameter list is
/// closed (`int f(int a,\n int b)`).
fn complete_parens<'s>(source: &'s str, start: usize, decl: &'s str) -> &'s str {
    let Some(open) = decl.find('(') else {
        return decl;
    };
    match matching(source, start + open, '(', ')') {
        Some(close) if close >= start + decl.len() => &source[start..=close],
        _ => decl,
    }
}

/// Byte index of the `{` opening a body for a declaration match ending at
/// `end`: either its terminator or the first character of the next line.
fn body_start(source: &str, end: usize) -> Option<usize> {
    if source[..end].ends_with('{') {
        return Some(end - 1);
    }
    if !source[..end].ends_with('\n') {
        return None;
    }
    let rest = &source[end..];
    let trimmed = rest.trim_start();
    trimmed
        .starts_with('{')
        .then(|| end + (rest.len() - trimmed.len()))
}

fn matching_brace(source: &str, open: usize) -> Option<usize> {
    matching(source, open, '{', '}')
}

/// Byte index of the delimiter closing the one at `open`.
fn matching(source: &str, open: usize, opener: char, closer: char) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in source[open..].char_indices() {
        if c == opener {
            depth += 1;
        } else if c == closer {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(open + idx);
            }
        }
    }
    None
}

/// Text inside the first parenthesized group of `text`.
fn paren_contents(text: &str) -> &str {
    let Some(open) = text.find('(') else {
        return "";
    };
    match matching(text, open, '(', ')') {
        Some(close) => &text[open + 1..close],
        None => &text[open + 1..],
    }
}

fn last_identifier(text: &str) -> String {
    text.split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
        .to_string()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<DocumentedEntity> {
        PatternParser
            .parse(Path::new("src/uart.c"), source, &[])
            .unwrap()
    }

    #[test]
    fn function_with_pointer_return() {
        let entities = parse("/**\n * Read a line.\n */\nchar *uart_readline(struct uart *u, size_t max)\n{\n}\n");
        let f = &entities[0];
        assert_eq!(f.kind, EntityKind::Function);
        assert_eq!(f.name, "uart_readline");
        assert_eq!(f.return_type, "char *");
        assert_eq!(
            f.parameters,
            vec![
                Parameter::new("struct uart *", "u"),
                Parameter::new("size_t", "max")
            ]
        );
        assert_eq!(f.signature, "char *uart_readline(struct uart *u, size_t max)");
        assert_eq!(f.comment, "Read a line.");
        assert_eq!(f.source_file, "uart.c");
        assert_eq!(f.source_line, 4);
    }

    #[test]
    fn multi_line_parameters() {
        let entities = parse("/** Write. */\nint uart_write(struct uart *u,\n\t       const void *buf, size_t len);\n");
        let f = &entities[0];
        assert_eq!(f.parameters.len(), 3);
        assert_eq!(f.parameters[1], Parameter::new("const void *", "buf"));
    }

    #[test]
    fn void_parameter_list() {
        let entities = parse("/** Reset. */\nvoid uart_reset(void);\n");
        assert!(entities[0].parameters.is_empty());
        assert_eq!(entities[0].return_type, "void");
    }

    #[test]
    fn macros() {
        let entities = parse(
            "/** Baud. */\n#define UART_BAUD 115200\n/** Bit. */\n#define UART_BIT(n) (1u << (n))\n",
        );
        assert_eq!(entities[0].kind, EntityKind::Macro);
        assert_eq!(entities[0].name, "UART_BAUD");
        assert_eq!(entities[1].kind, EntityKind::MacroFunction);
        assert_eq!(entities[1].name, "UART_BIT");
        assert_eq!(entities[1].parameters, vec![Parameter::new("", "n")]);
    }

    #[test]
    fn struct_members() {
        let src = "/** A port. */\nstruct uart {\n\t/** Base address. */\n\tunsigned long base;\n\tint irq;\n\t/** Name. */\n\tconst char *name;\n};\n\n/** After. */\nint uart_count;\n";
        let entities = parse(src);
        assert_eq!(entities.len(), 2);
        let s = &entities[0];
        assert_eq!(s.kind, EntityKind::Struct);
        assert_eq!(s.name, "uart");
        assert_eq!(s.signature, "struct uart");
        let names: Vec<_> = s.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["base", "name"]);
        assert_eq!(s.members[0].kind, EntityKind::Field);
        assert_eq!(s.members[0].source_line, 4);
        assert_eq!(entities[1].kind, EntityKind::Variable);
        assert_eq!(entities[1].name, "uart_count");
    }

    #[test]
    fn typedef_anonymous_enum() {
        let src = "/** Parity. */\ntypedef enum {\n\t/** None. */\n\tPARITY_NONE = 0,\n\t/** Odd. */\n\tPARITY_ODD,\n} uart_parity;\n";
        let entities = parse(src);
        assert_eq!(entities.len(), 1);
        let e = &entities[0];
        assert_eq!(e.kind, EntityKind::Enum);
        assert_eq!(e.name, "uart_parity");
        assert_eq!(e.signature, "typedef enum uart_parity");
        let members: Vec<_> = e.members.iter().map(|m| (m.name.as_str(), m.kind)).collect();
        assert_eq!(
            members,
            vec![
                ("PARITY_NONE", EntityKind::EnumConstant),
                ("PARITY_ODD", EntityKind::EnumConstant)
            ]
        );
    }

    #[test]
    fn brace_on_next_line() {
        let src = "/** Mode. */\ntypedef enum\n{\n\t/** Fast. */\n\tMODE_FAST,\n} uart_mode;\n";
        let entities = parse(src);
        assert_eq!(entities[0].name, "uart_mode");
        assert_eq!(entities[0].members[0].name, "MODE_FAST");
    }

    #[test]
    fn plain_typedefs() {
        let entities = parse("/** Handler. */\ntypedef void (*uart_handler)(int irq);\n/** Id. */\ntypedef unsigned int uart_id;\n");
        assert_eq!(entities[0].kind, EntityKind::Typedef);
        assert_eq!(entities[0].name, "uart_handler");
        assert_eq!(entities[1].name, "uart_id");
    }

    #[test]
    fn variables_with_initializers() {
        let entities = parse("/** Names. */\nstatic const char *uart_names[] = {\n\t\"a\",\n};\n");
        assert_eq!(entities[0].kind, EntityKind::Variable);
        assert_eq!(entities[0].name, "uart_names");
    }
}
