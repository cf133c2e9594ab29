//! Call sites of a function, shown as an appendix under its docs.

use super::Build;
use crate::collection::SourceGroup;
use crate::render::html::example_card;
use crate::text::dedent;
use regex::Regex;
use std::fs;

const MAX_USAGES: usize = 3;
const WALK_LIMIT: usize = 80;
const CONTEXT: usize = 12;
const MAX_SPAN: usize = 30;
const HALF_SPAN: usize = 15;

/// One call site: relative path, 1-based first line, snippet lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub rel: String,
    pub line: usize,
    pub snippet: Vec<String>,
}

impl Build {
    /// The "Example usage in code" block for `name`, or an empty string
    /// when no call site is found.
    pub(super) fn render_usages(&self, name: &str) -> String {
        let usages = find_usages(&self.groups, name, MAX_USAGES);
        if usages.is_empty() {
            return String::new();
        }

        let mut parts = vec![
            String::new(),
            "#### Example usage in code".to_string(),
            String::new(),
            "<div class=\"hm-appendix\">".to_string(),
            String::new(),
        ];
        for usage in &usages {
            let label = format!("{}:{}", usage.rel, usage.line);
            parts.push(example_card(&label, "c", &usage.snippet.join("\n")));
            parts.push(String::new());
        }
        parts.push("</div>".to_string());
        parts.push(String::new());
        parts.join("\n")
    }
}

/// Up to `max` call sites of `name` across the discovered files of all
/// collections. Comments, preprocessor lines and the function's own
/// declaration or definition are skipped.
pub fn find_usages(groups: &[SourceGroup], name: &str, max: usize) -> Vec<Usage> {
    let escaped = regex::escape(name);
    let (Ok(call), Ok(definition)) = (
        Regex::new(&format!(r"\b{escaped}\s*\(")),
        Regex::new(&format!(
            r"^\s*(?:static\s+|extern\s+|inline\s+|__\w+\s+)*(?:(?:const|unsigned|signed|long|short|struct|enum|union)\s+)*\w[\w\s*]+\b{escaped}\s*\("
        )),
    ) else {
        return Vec::new();
    };

    let mut usages = Vec::new();
    for group in groups {
        for rel in &group.discovered {
            let Ok(bytes) = fs::read(group.root.join(rel)) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();

            for (i, line) in lines.iter().enumerate() {
                if !call.is_match(line) {
                    continue;
                }
                let stripped = line.trim();
                if stripped.starts_with(['*', '#'])
                    || stripped.starts_with("/*")
                    || stripped.starts_with("//")
                    || in_block_comment(&lines, i)
                    || definition.is_match(stripped)
                {
                    continue;
                }

                let (snippet, start) = extract_snippet(&lines, i);
                if snippet.is_empty() {
                    continue;
                }
                usages.push(Usage {
                    rel: rel.clone(),
                    line: start + 1,
                    snippet,
                });
                if usages.len() >= max {
                    return usages;
                }
            }
        }
    }
    usages
}

/// Whether a comment opened in the five lines before `idx` is still open.
fn in_block_comment(lines: &[&str], idx: usize) -> bool {
    let mut open = false;
    for line in &lines[idx.saturating_sub(5)..idx] {
        if line.contains("/*") {
            open = true;
        }
        if line.contains("*/") {
            open = false;
        }
    }
    open
}

fn brace_delta(line: &str) -> i32 {
    let opens = line.matches('{').count() as i32;
    let closes = line.matches('}').count() as i32;
    opens - closes
}

/// The enclosing block of the call at `call`, with the line before its
/// opening brace when that looks like a signature. Long blocks are cut to
/// the lines around the call. Returns the dedented lines and the index of
/// the first one.
pub fn extract_snippet(lines: &[&str], call: usize) -> (Vec<String>, usize) {
    let total = lines.len();

    let mut depth = 0;
    let mut start = None;
    for j in (call.saturating_sub(WALK_LIMIT - 1)..=call).rev() {
        depth -= brace_delta(lines[j]);
        if depth < 0 {
            let prev = j.checked_sub(1).map(|p| lines[p].trim());
            start = Some(match prev {
                Some(p)
                    if !p.is_empty()
                        && !p.starts_with("/*")
                        && !p.starts_with('*')
                        && !p.starts_with("//")
                        && !p.starts_with('#') =>
                {
                    j - 1
                }
                _ => j,
            });
            break;
        }
    }
    let mut start = start.unwrap_or(call.saturating_sub(CONTEXT));

    let mut depth = 0;
    let mut end = None;
    for (j, line) in lines
        .iter()
        .enumerate()
        .take((call + WALK_LIMIT).min(total))
        .skip(start)
    {
        depth += brace_delta(line);
        if j > call && depth <= 0 {
            end = Some(j);
            break;
        }
    }
    let mut end = end.unwrap_or((call + CONTEXT).min(total.saturating_sub(1)));

    if end - start > MAX_SPAN {
        start = start.max(call.saturating_sub(HALF_SPAN));
        end = end.min(call + HALF_SPAN);
    }

    let text = dedent(&lines[start..=end].join("\n"));
    let mut snippet: Vec<String> = text.split('\n').map(str::to_string).collect();
    while snippet.first().is_some_and(|l| l.trim().is_empty()) {
        snippet.remove(0);
        start += 1;
    }
    while snippet.last().is_some_and(|l| l.trim().is_empty()) {
        snippet.pop();
    }
    (snippet, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;
    use tempfile::TempDir;

    const DRIVER: &str = "\
/**
 * Uses engine_init(cfg) internally.
 */
int engine_init(struct cfg *cfg);

// engine_init(NULL) in a comment

static int probe(void)
{
\tint ret;

\tret = engine_init(&defaults);
\treturn ret;
}
";

    fn groups(tmp: &TempDir) -> Vec<SourceGroup> {
        fs::write(tmp.path().join("driver.c"), DRIVER).unwrap();
        let config = Config {
            source_root: tmp.path().display().to_string(),
            ..Config::default()
        };
        let mut groups = SourceGroup::from_config(&config, Path::new("/"));
        groups[0].discovered = vec!["driver.c".into()];
        groups
    }

    #[test]
    fn finds_call_site_with_enclosing_function() {
        let tmp = TempDir::new().unwrap();
        let usages = find_usages(&groups(&tmp), "engine_init", 3);
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].rel, "driver.c");
        assert_eq!(usages[0].line, 8);
        assert_eq!(
            usages[0].snippet,
            vec![
                "static int probe(void)",
                "{",
                "\tint ret;",
                "",
                "\tret = engine_init(&defaults);",
                "\treturn ret;",
                "}",
            ]
        );
    }

    #[test]
    fn unknown_function_has_no_usages() {
        let tmp = TempDir::new().unwrap();
        assert!(find_usages(&groups(&tmp), "engine_stop", 3).is_empty());
    }

    #[test]
    fn long_blocks_are_clamped() {
        let mut lines = vec!["void f(void)", "{"];
        lines.extend(std::iter::repeat("\tstep();").take(40));
        lines.push("\tcall_me();");
        lines.extend(std::iter::repeat("\tstep();").take(40));
        lines.push("}");
        let (snippet, start) = extract_snippet(&lines, 42);
        assert_eq!(start, 27);
        assert_eq!(snippet.len(), 31);
        assert_eq!(snippet[15], "call_me();");
    }

    #[test]
    fn braceless_context_falls_back_to_window() {
        let lines = ["a();", "b();", "call_me();", "c();"];
        let (snippet, start) = extract_snippet(&lines, 2);
        assert_eq!(start, 0);
        assert_eq!(snippet, vec!["a();", "b();", "call_me();", "c();"]);
    }
}
