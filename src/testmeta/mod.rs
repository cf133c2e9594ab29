//! Test metadata: `TEST:`/`SUBTEST:` comment blocks plus the subtests
//! declared in code with `igt_subtest*()` and described by `igt_describe()`.

pub mod steps;

pub use steps::extract_steps;

use crate::model::{normalize_key, FieldMap, SubtestMetadata, TestMetadata};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

// -- Regex patterns -------------------------------------------------------------

static RE_DOC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(.+?)\*/").unwrap());

static RE_FIELD_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\s-]+$").unwrap());

static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(?:l{1,2}|h{1,2}|z)?[sdiux]").unwrap());

/// A `TEST:` key that is not the tail of `SUBTEST:`.
static RE_TEST_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|[^\w])TEST:").unwrap());

static RE_DESCRIBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bigt_describe(?:_f)?\s*\(").unwrap());

static RE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());

static RE_SUBTEST_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bigt_subtest(?:(_with_dynamic)(?:_f)?|_f)?\s*\(\s*"([^"]+)""#).unwrap()
});

static RE_SUBTEST_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bigt_subtest(?:_f|_with_dynamic(?:_f)?)?\s*\(\s*"([^"]+)""#).unwrap()
});

const MAX_KEY_WORDS: usize = 3;

// -- Field reader -----------------------------------------------------------------

/// Strip the ` * ` decoration of a comment block body.
fn structured_text(raw: &str) -> String {
    raw.split('\n')
        .map(|line| {
            let s = line.trim_start();
            s.strip_prefix("* ")
                .or_else(|| s.strip_prefix('*'))
                .unwrap_or(s)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split `Key: value` when the key looks like a field name: at most three
/// words of word, space or hyphen characters.
fn split_field(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty()
        || key.split_whitespace().count() > MAX_KEY_WORDS
        || !RE_FIELD_KEY.is_match(key)
    {
        return None;
    }
    Some((normalize_key(key), value.trim()))
}

fn is_placeholder(name: &str) -> bool {
    RE_PLACEHOLDER.is_match(name)
}

/// Tracks the last field read; its value continues on following non-blank
/// lines until a blank line or the next field.
#[derive(Default)]
struct FieldReader {
    pending: Option<String>,
}

impl FieldReader {
    fn reset(&mut self) {
        self.pending = None;
    }

    /// Feed one trimmed line that is not a `TEST:`/`SUBTEST:` marker.
    fn feed(&mut self, fields: &mut FieldMap, line: &str) {
        if let Some((key, value)) = split_field(line) {
            fields.insert(key.clone(), value);
            self.pending = Some(key);
            return;
        }
        if line.is_empty() {
            self.pending = None;
            return;
        }
        if let Some(key) = &self.pending {
            if let Some(existing) = fields.get_mut(key) {
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(line);
            }
        }
    }
}

// -- Primary block ------------------------------------------------------------------

enum Target {
    Test,
    Subtest(usize),
    Discard,
}

/// Parse a structured `TEST:` comment. Returns `None` when the text has no
/// `TEST:` marker or names no test.
pub fn parse_test_comment(text: &str) -> Option<TestMetadata> {
    let text = structured_text(text);
    if !text.contains("TEST:") {
        return None;
    }

    let mut test = TestMetadata::default();
    let mut target = Target::Test;
    let mut reader = FieldReader::default();

    for line in text.split('\n') {
        let line = line.trim();

        if let Some(name) = line.strip_prefix("SUBTEST:") {
            reader.reset();
            let name = name.trim();
            target = if is_placeholder(name) {
                Target::Discard
            } else {
                test.subtests.push(SubtestMetadata::new(name));
                Target::Subtest(test.subtests.len() - 1)
            };
            continue;
        }
        if let Some(name) = line.strip_prefix("TEST:") {
            reader.reset();
            test.name = name.trim().to_string();
            target = Target::Test;
            continue;
        }

        match target {
            Target::Test => reader.feed(&mut test.fields, line),
            Target::Subtest(idx) => reader.feed(&mut test.subtests[idx].fields, line),
            Target::Discard => {}
        }
    }

    (!test.name.is_empty()).then_some(test)
}

// -- Standalone SUBTEST blocks ---------------------------------------------------------

/// Subtests documented in comment blocks other than the `TEST:` block, in
/// encounter order. Subtests with no fields are left out.
fn standalone_subtests(source: &str) -> Vec<(String, FieldMap)> {
    let mut found: Vec<(String, FieldMap)> = Vec::new();
    let mut keep = |name: Option<String>, fields: FieldMap| {
        if let Some(name) = name {
            if fields.is_empty() {
                return;
            }
            match found.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = fields,
                None => found.push((name, fields)),
            }
        }
    };

    for caps in RE_DOC_BLOCK.captures_iter(source) {
        let text = structured_text(&caps[1]);
        if RE_TEST_KEY.is_match(&text) || !text.contains("SUBTEST:") {
            continue;
        }

        let mut name: Option<String> = None;
        let mut fields = FieldMap::new();
        let mut reader = FieldReader::default();
        for line in text.split('\n') {
            let line = line.trim();
            if let Some(next) = line.strip_prefix("SUBTEST:") {
                keep(name.take(), std::mem::take(&mut fields));
                reader.reset();
                let next = next.trim();
                if !is_placeholder(next) {
                    name = Some(next.to_string());
                }
                continue;
            }
            if name.is_some() {
                reader.feed(&mut fields, line);
            }
        }
        keep(name, fields);
    }
    found
}

// -- Code scan ---------------------------------------------------------------------

/// Join every string literal in an `igt_describe(...)` call.
fn describe_text(call: &str) -> Option<String> {
    let parts: Vec<&str> = RE_QUOTED
        .captures_iter(call)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    (!parts.is_empty()).then(|| parts.concat())
}

/// Net paren depth of `text`, ignoring string literals.
fn paren_balance(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote = None;
    let mut escaped = false;
    for c in text.chars() {
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
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Lines that keep a pending description alive between `igt_describe()`
/// and the subtest it documents.
fn keeps_description(line: &str) -> bool {
    line.is_empty()
        || ["//", "/*", "*", "{", "}", "igt_"]
            .iter()
            .any(|p| line.starts_with(p))
}

fn scan_code(source: &str, test: &mut TestMetadata) {
    let mut pending: Option<String> = None;
    let mut describe_buf: Option<String> = None;

    for (idx, raw) in source.split('\n').enumerate() {
        let line = raw.trim();

        if let Some(buf) = describe_buf.as_mut() {
            buf.push(' ');
            buf.push_str(line);
            if paren_balance(buf) <= 0 {
                pending = describe_text(buf);
                describe_buf = None;
            }
            continue;
        }

        if let Some(m) = RE_DESCRIBE.find(line) {
            let call = &line[m.start()..];
            if paren_balance(call) <= 0 {
                pending = describe_text(call);
            } else {
                describe_buf = Some(call.to_string());
            }
            continue;
        }

        if let Some(caps) = RE_SUBTEST_CALL.captures(line) {
            let name = &caps[2];
            let description = pending.take();
            if is_placeholder(name) {
                continue;
            }
            let dynamic = caps.get(1).is_some();
            match test.subtest_mut(name) {
                Some(sub) => {
                    if let Some(desc) = description {
                        if sub.fields.is_blank("description") {
                            sub.fields.insert("description", desc);
                        }
                    }
                    if sub.source_line == 0 {
                        sub.source_line = idx + 1;
                    }
                }
                None => {
                    let mut sub = SubtestMetadata::new(name);
                    sub.source_line = idx + 1;
                    if dynamic {
                        sub.fields.insert("dynamic", "true");
                    }
                    if let Some(desc) = description {
                        sub.fields.insert("description", desc);
                    }
                    test.subtests.push(sub);
                }
            }
            continue;
        }

        if !keeps_description(line) {
            pending = None;
        }
    }
}

/// Text between the brace at byte `open` and its match, skipping braces
/// inside string and character literals.
fn brace_body(source: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (idx, c) in source[open..].char_indices() {
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
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&source[open + 1..open + idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Braced bodies of every `igt_subtest*("name", ...) { ... }`, keyed by name.
fn subtest_bodies(source: &str) -> HashMap<String, &str> {
    let mut bodies = HashMap::new();
    for caps in RE_SUBTEST_OPEN.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(paren) = source[whole.start()..].find('(').map(|p| whole.start() + p) else {
            continue;
        };
        let Some(close) = matching_paren(source, paren) else {
            continue;
        };
        let rest = &source[close..];
        let trimmed = rest.trim_start();
        if !trimmed.starts_with('{') {
            continue;
        }
        let open = close + (rest.len() - trimmed.len());
        if let Some(body) = brace_body(source, open) {
            bodies.insert(caps[1].to_string(), body);
        }
    }
    bodies
}

/// Byte offset just past the paren matching the one at `open`.
fn matching_paren(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, c) in source[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

// -- Public API -------------------------------------------------------------------

/// Build the metadata of a test source file.
///
/// The first comment block with a `TEST:` marker supplies the test and its
/// documented subtests; without one the test is named after the file stem.
/// Subtests declared only in code are appended, then standalone `SUBTEST:`
/// blocks fill fields that are still missing. With `with_steps`, each
/// subtest's body is turned into procedural steps.
pub fn parse_test_source(source: &str, file_name: &str, with_steps: bool) -> TestMetadata {
    let mut test = RE_DOC_BLOCK
        .captures_iter(source)
        .find_map(|caps| parse_test_comment(&caps[1]))
        .unwrap_or_else(|| TestMetadata {
            name: Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string()),
            ..TestMetadata::default()
        });
    test.source_file = file_name.to_string();

    scan_code(source, &mut test);

    for (name, fields) in standalone_subtests(source) {
        match test.subtest_mut(&name) {
            Some(sub) => {
                for (key, value) in fields.iter() {
                    if sub.fields.is_blank(key) {
                        sub.fields.insert(key, value);
                    }
                }
            }
            None => {
                let mut sub = SubtestMetadata::new(name);
                sub.fields = fields;
                test.subtests.push(sub);
            }
        }
    }

    if with_steps {
        let bodies = subtest_bodies(source);
        for sub in &mut test.subtests {
            if let Some(body) = bodies.get(&sub.name) {
                sub.steps = extract_steps(body);
            }
        }
    }

    test
}
