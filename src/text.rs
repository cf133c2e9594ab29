//! Text helpers shared by the markup stages and the resolver.

use regex::{Captures, Regex};

/// Remove the common leading whitespace of all non-blank lines.
/// Whitespace-only lines become empty.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                &l[indent.min(l.len())..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace every match of `re` in `text`, handing the callback the chars
/// immediately before and after the match so callers can express
/// lookaround conditions. Returning `None` keeps the match unchanged.
pub fn replace_guarded<F>(re: &Regex, text: &str, mut rep: F) -> String
where
    F: FnMut(&Captures, Option<char>, Option<char>) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        out.push_str(&text[last..m.start()]);
        match rep(&caps, before, after) {
            Some(r) => out.push_str(&r),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

// -- Placeholder vault ----------------------------------------------------------

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// Holds spans hidden from substitution passes behind private-use-area
/// tokens (`U+E000 <n> U+E001`).
#[derive(Debug, Default)]
pub struct Vault {
    spans: Vec<String>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip any sentinel characters from untrusted input so a restored
    /// token can only come from [`Vault::hide`].
    pub fn sanitize(text: &str) -> String {
        if text.contains([OPEN, CLOSE]) {
            text.replace([OPEN, CLOSE], "")
        } else {
            text.to_string()
        }
    }

    pub fn hide(&mut self, span: impl Into<String>) -> String {
        let token = format!("{OPEN}{}{CLOSE}", self.spans.len());
        self.spans.push(span.into());
        token
    }

    /// Hide every match of `re`.
    pub fn hide_all(&mut self, re: &Regex, text: &str) -> String {
        re.replace_all(text, |caps: &Captures| self.hide(&caps[0]))
            .into_owned()
    }

    /// Put every hidden span back.
    pub fn restore(&self, text: &str) -> String {
        if self.spans.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len_utf8()..];
            let restored = after.find(CLOSE).and_then(|end| {
                let idx: usize = after[..end].parse().ok()?;
                let span = self.spans.get(idx)?;
                Some((span, end))
            });
            match restored {
                Some((span, end)) => {
                    out.push_str(span);
                    rest = &after[end + CLOSE.len_utf8()..];
                }
                None => {
                    out.push(OPEN);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
