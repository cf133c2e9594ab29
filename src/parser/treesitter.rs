//! Precise backend on the tree-sitter C grammar.

use super::{display_name, SourceParser};
use crate::comment::clean_comment;
use crate::error::ParseError;
use crate::model::{DocumentedEntity, EntityKind, Parameter};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct TreeSitterParser;

impl SourceParser for TreeSitterParser {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn is_precise(&self) -> bool {
        true
    }

    /// `args` are compiler flags for preprocessing backends; the grammar
    /// parses unpreprocessed source and does not need them.
    fn parse(
        &self,
        path: &Path,
        source: &str,
        _args: &[String],
    ) -> Result<Vec<DocumentedEntity>, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::language())
            .map_err(|e| ParseError::Unavailable {
                backend: self.name(),
                message: e.to_string(),
            })?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParseError::Unavailable {
                backend: self.name(),
                message: "parser returned no tree".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::Syntax {
                path: path.to_path_buf(),
                errors: count_errors(root),
            });
        }

        let mut visitor = Visitor {
            source: source.as_bytes(),
            file: display_name(path),
            entities: Vec::new(),
        };
        visitor.visit_scope(root);
        Ok(visitor.entities)
    }
}

fn count_errors(node: Node) -> usize {
    let own = usize::from(node.is_error() || node.is_missing());
    let mut cursor = node.walk();
    own + node
        .children(&mut cursor)
        .map(count_errors)
        .sum::<usize>()
}

// -- Visitor --------------------------------------------------------------------

struct Visitor<'a> {
    source: &'a [u8],
    file: String,
    entities: Vec<DocumentedEntity>,
}

impl<'a> Visitor<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    /// Top level, including the bodies of `#if`/`#ifdef` blocks.
    fn visit_scope(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
                | "linkage_specification" | "declaration_list" => self.visit_scope(child),
                _ => {
                    if let Some(entity) = self.entity(child) {
                        self.entities.push(entity);
                    }
                }
            }
        }
    }

    /// Documented entity declared by `node`, if it carries a doc comment.
    fn entity(&self, node: Node) -> Option<DocumentedEntity> {
        let comment = self.doc_comment(node)?;
        let mut entity = match node.kind() {
            "function_definition" => self.function(node, node.child_by_field_name("declarator")?)?,
            "declaration" => self.declaration(node)?,
            "type_definition" => self.type_definition(node)?,
            "struct_specifier" | "union_specifier" | "enum_specifier" => self.record(node, None)?,
            "preproc_def" => self.macro_def(node, EntityKind::Macro)?,
            "preproc_function_def" => self.macro_def(node, EntityKind::MacroFunction)?,
            _ => return None,
        };
        entity.comment = comment;
        entity.source_file = self.file.clone();
        entity.source_line = node.start_position().row + 1;
        Some(entity)
    }

    /// The `/** */` comment or run of `///` lines directly above `node`.
    /// Trailing member comments (`/**<`, `///<`) belong to the previous
    /// declaration.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let first = node.prev_named_sibling().filter(|p| p.kind() == "comment")?;
        let text = self.text(first);
        if text.starts_with("/**") {
            if text.starts_with("/**<") || text.starts_with("/**/") {
                return None;
            }
            return Some(clean_comment(text));
        }
        if !text.starts_with("///") || text.starts_with("///<") {
            return None;
        }

        let mut lines = vec![text];
        let mut top = first;
        while let Some(prev) = top.prev_named_sibling().filter(|p| p.kind() == "comment") {
            let text = self.text(prev);
            if !text.starts_with("///") || prev.end_position().row + 1 != top.start_position().row {
                break;
            }
            lines.push(text);
            top = prev;
        }
        lines.reverse();
        Some(clean_comment(&lines.join("\n")))
    }

    // -- Declarations ---------------------------------------------------------------

    fn function(&self, node: Node, declarator: Node) -> Option<DocumentedEntity> {
        let (func, stars) = find_function_declarator(declarator)?;
        let name = declarator_name(func.child_by_field_name("declarator")?, self);
        let base = node
            .child_by_field_name("type")
            .map(|t| self.text(t))
            .unwrap_or("int");

        let mut entity = DocumentedEntity::new(name, EntityKind::Function, "");
        entity.return_type = pointer_type(&qualified_type(node, base, self), stars);
        entity.parameters = func
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p))
            .unwrap_or_default();

        let head_end = node
            .child_by_field_name("body")
            .map_or(node.end_byte(), |b| b.start_byte());
        entity.signature = squash(&String::from_utf8_lossy(
            &self.source[node.start_byte()..head_end],
        ));
        entity.signature = entity.signature.trim_end_matches(';').trim().to_string();
        Some(entity)
    }

    fn declaration(&self, node: Node) -> Option<DocumentedEntity> {
        let declarator = node.child_by_field_name("declarator")?;
        if find_function_declarator(declarator).is_some() {
            return self.function(node, declarator);
        }
        let name = declarator_name(declarator, self);
        let mut entity = DocumentedEntity::new(name, EntityKind::Variable, "");
        entity.signature = self.statement_text(node);
        Some(entity)
    }

    fn type_definition(&self, node: Node) -> Option<DocumentedEntity> {
        let declarator = node.child_by_field_name("declarator")?;
        let name = declarator_name(declarator, self);
        let ty = node.child_by_field_name("type")?;

        if ty.child_by_field_name("body").is_some() {
            // typedef struct { ... } name;
            let mut entity = self.record(ty, Some(name.clone()))?;
            let head = self.record_head(ty);
            entity.signature = format!("typedef {} {}", head, self.text(declarator));
            return Some(entity);
        }

        let mut entity = DocumentedEntity::new(name, EntityKind::Typedef, "");
        entity.signature = self.statement_text(node);
        Some(entity)
    }

    /// struct / union / enum. `alias` names an anonymous body.
    fn record(&self, node: Node, alias: Option<String>) -> Option<DocumentedEntity> {
        let kind = match node.kind() {
            "struct_specifier" => EntityKind::Struct,
            "union_specifier" => EntityKind::Union,
            "enum_specifier" => EntityKind::Enum,
            _ => return None,
        };
        let name = alias.or_else(|| {
            node.child_by_field_name("name")
                .map(|n| self.text(n).to_string())
        })?;

        let mut entity = DocumentedEntity::new(name, kind, "");
        entity.signature = self.record_head(node);
        if let Some(body) = node.child_by_field_name("body") {
            entity.members = self.members(body);
        }
        Some(entity)
    }

    /// `struct name` without the body.
    fn record_head(&self, node: Node) -> String {
        let end = node
            .child_by_field_name("body")
            .map_or(node.end_byte(), |b| b.start_byte());
        squash(&String::from_utf8_lossy(&self.source[node.start_byte()..end]))
    }

    fn members(&self, body: Node) -> Vec<DocumentedEntity> {
        let mut cursor = body.walk();
        let children: Vec<Node> = body.named_children(&mut cursor).collect();
        let mut members = Vec::new();
        for child in children {
            let (name, kind, signature) = match child.kind() {
                "field_declaration" => {
                    let Some(decl) = child.child_by_field_name("declarator") else {
                        continue;
                    };
                    (
                        declarator_name(decl, self),
                        EntityKind::Field,
                        self.statement_text(child),
                    )
                }
                "enumerator" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    (
                        self.text(name).to_string(),
                        EntityKind::EnumConstant,
                        squash(self.text(child)),
                    )
                }
                _ => continue,
            };
            let Some(comment) = self.doc_comment(child) else {
                continue;
            };
            let mut member = DocumentedEntity::new(name, kind, comment);
            member.signature = signature;
            member.source_file = self.file.clone();
            member.source_line = child.start_position().row + 1;
            members.push(member);
        }
        members
    }

    fn macro_def(&self, node: Node, kind: EntityKind) -> Option<DocumentedEntity> {
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let mut entity = DocumentedEntity::new(name, kind, "");
        entity.signature = squash(self.text(node).trim_end_matches(['\n', '\r']));
        if kind == EntityKind::MacroFunction {
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                entity.parameters = params
                    .named_children(&mut cursor)
                    .map(|p| Parameter::new("", self.text(p)))
                    .collect();
            }
        }
        Some(entity)
    }

    fn parameters(&self, list: Node) -> Vec<Parameter> {
        let mut cursor = list.walk();
        let children: Vec<Node> = list.named_children(&mut cursor).collect();
        let mut params = Vec::new();
        for child in children {
            match child.kind() {
                "parameter_declaration" => {
                    let base = child
                        .child_by_field_name("type")
                        .map(|t| self.text(t))
                        .unwrap_or("");
                    let base = qualified_type(child, base, self);
                    match child.child_by_field_name("declarator") {
                        Some(decl) => {
                            let (name, suffix) = declarator_info(decl, self);
                            params.push(Parameter::new(format!("{base}{suffix}").trim(), name));
                        }
                        // `(void)` declares no parameters.
                        None if base == "void" => {}
                        None => params.push(Parameter::new(base, "")),
                    }
                }
                "variadic_parameter" => params.push(Parameter::new("...", "...")),
                _ => {}
            }
        }
        params
    }

    /// Declaration text without its trailing `;`, whitespace collapsed.
    fn statement_text(&self, node: Node) -> String {
        squash(self.text(node))
            .trim_end_matches(';')
            .trim_end()
            .to_string()
    }
}

// -- Declarator helpers ------------------------------------------------------------

/// The `function_declarator` under `node` and the number of pointer
/// levels wrapped around it (the return type's indirection).
fn find_function_declarator(node: Node) -> Option<(Node, usize)> {
    match node.kind() {
        "function_declarator" => Some((node, 0)),
        "pointer_declarator" => {
            let inner = node.child_by_field_name("declarator")?;
            find_function_declarator(inner).map(|(f, n)| (f, n + 1))
        }
        "init_declarator" | "attributed_declarator" => {
            find_function_declarator(node.child_by_field_name("declarator")?)
        }
        _ => None,
    }
}

fn declarator_name(node: Node, v: &Visitor) -> String {
    declarator_info(node, v).0
}

/// Name declared by `node` and the type suffix it adds (`*`, `[]`).
fn declarator_info(node: Node, v: &Visitor) -> (String, String) {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => {
            (v.text(node).to_string(), String::new())
        }
        "pointer_declarator" => match node.child_by_field_name("declarator") {
            Some(inner) => {
                let (name, suffix) = declarator_info(inner, v);
                (name, format!(" *{}", suffix.trim_start()))
            }
            None => (String::new(), " *".to_string()),
        },
        "array_declarator" => match node.child_by_field_name("declarator") {
            Some(inner) => {
                let (name, suffix) = declarator_info(inner, v);
                (name, format!("{suffix}[]"))
            }
            None => (String::new(), "[]".to_string()),
        },
        _ => {
            if let Some(inner) = node.child_by_field_name("declarator") {
                return declarator_info(inner, v);
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            children
                .into_iter()
                .map(|c| declarator_info(c, v))
                .find(|(name, _)| !name.is_empty())
                .unwrap_or_default()
        }
    }
}

/// `const`/`volatile` qualifiers written before the base type.
fn qualified_type(node: Node, base: &str, v: &Visitor) -> String {
    let mut cursor = node.walk();
    let mut parts: Vec<&str> = node
        .children(&mut cursor)
        .take_while(|c| Some(*c) != node.child_by_field_name("type"))
        .filter(|c| c.kind() == "type_qualifier")
        .map(|c| v.text(c))
        .collect();
    parts.push(base);
    parts.join(" ")
}

fn pointer_type(base: &str, stars: usize) -> String {
    if stars == 0 {
        base.to_string()
    } else {
        format!("{} {}", base, "*".repeat(stars))
    }
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
