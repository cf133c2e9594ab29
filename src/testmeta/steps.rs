//! Procedural step extraction from test bodies.
//!
//! The body is first split into a token stream (comments, block opens,
//! block closes, statements) and then walked by a small recursive-descent
//! parser. Conditional blocks become [`Step::Branch`] items; every other
//! block is flattened into its parent.

use crate::model::{Condition, Step};
use regex::Regex;
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_SKIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bigt_skip\s*\(").unwrap());

static RE_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bigt_require\s*\(").unwrap());

static RE_ASSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bigt_assert(?:_eq|_neq|_lt|_lte|_f|_fd)?\s*\(").unwrap()
});

static RE_DOMAIN_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(igt_\w+|gem_\w+|kms_\w+|drmIoctl|drm_\w+|do_ioctl\w*)\s*\(").unwrap()
});

static RE_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_][\w \t]*?[\s*]+)?([A-Za-z_][\w.\->]*)\s*=\s*([^=].*)$").unwrap()
});

static RE_CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)\s*\(").unwrap());

static RE_IF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^if\s*\(").unwrap());

/// Calls that never become steps on their own.
const IGNORED_CALLS: &[&str] = &[
    "close", "free", "munmap", "memset", "memcpy", "errno", "return", "break", "continue", "if",
    "for", "while", "switch", "sizeof",
];

const SKIP_STEP: &str = "Skip if preconditions not met.";
const MAX_CONDITION: usize = 80;

// -- Tokens ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Header {
    If(String),
    ElseIf(String),
    Else,
    /// Any other block opener (`for (...)`, `do`, `igt_fixture`, a bare `{`).
    Block(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Comment(String),
    Open(Header),
    Close,
    Stmt(String),
}

/// Split a braced body into tokens. Strings and character literals are
/// kept opaque, preprocessor lines are dropped, and only comments that
/// start a line are kept.
fn tokenize(body: &str) -> Vec<Token> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut parens = 0usize;
    let mut line_has_code = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' => {
                line_has_code = false;
                if !buf.is_empty() {
                    buf.push(' ');
                }
                i += 1;
            }
            '/' if next == Some('/') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                if !line_has_code && buf.trim().is_empty() {
                    let text: String = chars[i + 2..end].iter().collect();
                    tokens.push(Token::Comment(text.trim().to_string()));
                }
                i = end;
            }
            '/' if next == Some('*') => {
                let mut end = i + 2;
                while end + 1 < chars.len() && !(chars[end] == '*' && chars[end + 1] == '/') {
                    end += 1;
                }
                let close = (end + 2).min(chars.len());
                if !line_has_code && buf.trim().is_empty() {
                    let inner: String = chars[i + 2..end.min(chars.len())].iter().collect();
                    if !inner.starts_with('<') && !inner.contains("language=") {
                        tokens.push(Token::Comment(collapse_comment(&inner)));
                    }
                }
                i = close;
            }
            '#' if !line_has_code && buf.trim().is_empty() => {
                // Preprocessor line, including backslash continuations.
                while i < chars.len() && chars[i] != '\n' {
                    if chars[i] == '\\' && chars.get(i + 1) == Some(&'\n') {
                        i += 1;
                    }
                    i += 1;
                }
            }
            '"' | '\'' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                buf.extend(&chars[start..i]);
                line_has_code = true;
            }
            '(' => {
                parens += 1;
                buf.push(c);
                line_has_code = true;
                i += 1;
            }
            ')' => {
                parens = parens.saturating_sub(1);
                buf.push(c);
                i += 1;
            }
            ';' if parens == 0 => {
                flush_stmt(&mut tokens, &mut buf);
                i += 1;
            }
            '{' if parens == 0 => {
                let header = classify_header(&squash(&buf));
                buf.clear();
                tokens.push(Token::Open(header));
                line_has_code = true;
                i += 1;
            }
            '}' if parens == 0 => {
                flush_stmt(&mut tokens, &mut buf);
                tokens.push(Token::Close);
                line_has_code = true;
                i += 1;
            }
            _ => {
                if !c.is_whitespace() {
                    line_has_code = true;
                }
                buf.push(c);
                i += 1;
            }
        }
    }
    flush_stmt(&mut tokens, &mut buf);
    tokens
}

/// Emit the buffered statement. A braceless conditional (`if (c) x();`,
/// `else y();`) is expanded into an open/statement/close triple.
fn flush_stmt(tokens: &mut Vec<Token>, buf: &mut String) {
    let text = squash(buf);
    buf.clear();
    push_stmt(tokens, text);
}

fn push_stmt(tokens: &mut Vec<Token>, text: String) {
    if text.is_empty() {
        return;
    }
    match split_conditional(&text) {
        Some((header, rest)) if !rest.is_empty() => {
            tokens.push(Token::Open(header));
            push_stmt(tokens, rest.to_string());
            tokens.push(Token::Close);
        }
        _ => tokens.push(Token::Stmt(text)),
    }
}

fn classify_header(text: &str) -> Header {
    match split_conditional(text) {
        Some((header, _)) => header,
        None => Header::Block(text.to_string()),
    }
}

/// Recognize `if (c)`, `else if (c)` and `else` at the start of `text`,
/// returning the header and whatever follows it.
fn split_conditional(text: &str) -> Option<(Header, &str)> {
    if let Some(rest) = text.strip_prefix("else") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim_start();
        if RE_IF.is_match(rest) {
            let (cond, tail) = split_if(rest)?;
            return Some((Header::ElseIf(cond), tail));
        }
        return Some((Header::Else, rest));
    }
    if RE_IF.is_match(text) {
        let (cond, tail) = split_if(text)?;
        return Some((Header::If(cond), tail));
    }
    None
}

fn split_if(text: &str) -> Option<(String, &str)> {
    let open = text.find('(')?;
    let (inner, end) = balanced(text, open)?;
    Some((inner.trim().to_string(), text[end..].trim()))
}

/// Contents of the parenthesized group opening at byte `open`, and the
/// byte offset just past its closing paren.
fn balanced(text: &str, open: usize) -> Option<(&str, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in text[open..].char_indices() {
        let pos = open + idx;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[open + 1..pos], pos + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_comment(inner: &str) -> String {
    inner
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// -- Classification -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Comment,
    Skip,
    Require,
    Assert,
    Call,
    Set,
    Branch,
}

#[derive(Debug)]
struct Item {
    origin: Origin,
    step: Step,
}

impl Item {
    fn text(origin: Origin, text: String) -> Self {
        Self {
            origin,
            step: Step::Text(text),
        }
    }
}

fn comment_step(text: &str) -> Option<Item> {
    let text = text.trim();
    if text.chars().count() <= 2 {
        return None;
    }
    let mut chars = text.chars();
    let first = chars.next()?;
    let sentence: String = first.to_uppercase().chain(chars).collect();
    Some(Item::text(
        Origin::Comment,
        format!("{}.", sentence.trim_end_matches('.')),
    ))
}

/// Argument text of the call whose name `re` matched.
fn call_argument<'t>(re: &Regex, stmt: &'t str) -> Option<&'t str> {
    let m = re.find(stmt)?;
    let (inner, _) = balanced(stmt, m.end() - 1)?;
    Some(inner.trim())
}

fn truncate(cond: &str) -> String {
    if cond.chars().count() > MAX_CONDITION {
        let head: String = cond.chars().take(MAX_CONDITION - 3).collect();
        format!("{head}...")
    } else {
        cond.to_string()
    }
}

fn is_ignored(name: &str) -> bool {
    IGNORED_CALLS.contains(&name)
}

/// Classify one statement; first match wins.
fn statement_step(stmt: &str) -> Option<Item> {
    if RE_SKIP.is_match(stmt) {
        return Some(Item::text(Origin::Skip, SKIP_STEP.to_string()));
    }
    if RE_REQUIRE.is_match(stmt) {
        let cond = call_argument(&RE_REQUIRE, stmt).unwrap_or_default();
        return Some(Item::text(Origin::Require, format!("Require `{cond}`.")));
    }
    if RE_ASSERT.is_match(stmt) {
        let cond = call_argument(&RE_ASSERT, stmt).unwrap_or_default();
        return Some(Item::text(
            Origin::Assert,
            format!("Assert `{}`.", truncate(cond)),
        ));
    }
    if let Some(caps) = RE_DOMAIN_CALL.captures(stmt) {
        return Some(Item::text(Origin::Call, format!("Call `{}()`.", &caps[1])));
    }
    if let Some(caps) = RE_ASSIGN.captures(stmt) {
        if let Some(call) = RE_CALL.captures(caps[2].trim()) {
            if !is_ignored(&call[1]) {
                return Some(Item::text(
                    Origin::Set,
                    format!("Set `{}` from `{}()`.", &caps[1], &call[1]),
                ));
            }
        }
    }
    let call = RE_CALL.captures(stmt)?;
    let name = &call[1];
    if is_ignored(name) || name.starts_with("__") {
        return None;
    }
    Some(Item::text(Origin::Call, format!("Call `{name}()`.")))
}

// -- Recursive descent ------------------------------------------------------------

/// Steps of one block starting at `i`, and the index just past its close.
fn block(tokens: &[Token], mut i: usize) -> (Vec<Item>, usize) {
    let mut items = Vec::new();
    while i < tokens.len() {
        match &tokens[i] {
            Token::Close => return (items, i + 1),
            Token::Comment(text) => {
                items.extend(comment_step(text));
                i += 1;
            }
            Token::Stmt(stmt) => {
                items.extend(statement_step(stmt));
                i += 1;
            }
            Token::Open(Header::If(cond)) | Token::Open(Header::ElseIf(cond)) => {
                i = chain(tokens, i, Condition::Expr(cond.clone()), &mut items);
            }
            Token::Open(Header::Else) => {
                i = chain(tokens, i, Condition::Otherwise, &mut items);
            }
            Token::Open(Header::Block(head)) => {
                items.extend(statement_step(head));
                let (inner, next) = block(tokens, i + 1);
                items.extend(inner);
                i = next;
            }
        }
    }
    (items, i)
}

/// Walk a conditional starting at `i` plus every `else if`/`else` chained
/// directly after it.
fn chain(tokens: &[Token], i: usize, condition: Condition, items: &mut Vec<Item>) -> usize {
    let (inner, mut next) = block(tokens, i + 1);
    push_branch(items, condition, inner);

    while let Some(Token::Open(header)) = tokens.get(next) {
        let condition = match header {
            Header::ElseIf(cond) => Condition::Expr(cond.clone()),
            Header::Else => Condition::Otherwise,
            _ => break,
        };
        let last = condition == Condition::Otherwise;
        let (inner, after) = block(tokens, next + 1);
        push_branch(items, condition, inner);
        next = after;
        if last {
            break;
        }
    }
    next
}

fn push_branch(items: &mut Vec<Item>, condition: Condition, inner: Vec<Item>) {
    if inner.is_empty() {
        return;
    }
    items.push(Item {
        origin: Origin::Branch,
        step: Step::Branch {
            condition,
            steps: finish(inner),
        },
    });
}

/// Drop a call-derived step that directly follows the comment explaining it.
fn finish(items: Vec<Item>) -> Vec<Step> {
    let mut out = Vec::with_capacity(items.len());
    let mut prev = None;
    for item in items {
        let explained = prev == Some(Origin::Comment)
            && matches!(item.origin, Origin::Assert | Origin::Call | Origin::Set);
        if explained {
            prev = None;
            continue;
        }
        prev = Some(item.origin);
        out.push(item.step);
    }
    out
}

// -- Public API -------------------------------------------------------------------

/// Extract the ordered procedural steps of a braced code body (without
/// its outer braces).
pub fn extract_steps(body: &str) -> Vec<Step> {
    let tokens = tokenize(body);
    let mut items = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        // A stray close brace ends `block` early; resume after it.
        let (inner, next) = block(&tokens, i);
        items.extend(inner);
        i = next;
    }
    finish(items)
}
