//! Letter buckets for the symbol index and the A–Z jump bar.

use crate::render::html::PAGE_STYLE;
use std::collections::BTreeSet;

const LETTERS: std::ops::RangeInclusive<char> = 'A'..='Z';

/// Index letter of `name`: the first character after leading underscores,
/// upper-cased. Names that do not start with a letter have no bucket.
pub fn letter_bucket(name: &str) -> Option<char> {
    let first = name.trim_start_matches('_').chars().next()?;
    first
        .is_ascii_alphabetic()
        .then(|| first.to_ascii_uppercase())
}

/// Sort key matching [`letter_bucket`]: leading underscores ignored,
/// case-folded.
pub fn index_sort_key(name: &str) -> String {
    name.trim_start_matches('_').to_lowercase()
}

/// Render the sticky A–Z bar. Active letters link to `#X` on the index
/// page at `index_href` (empty when the bar is on the index itself);
/// the others are dimmed.
pub fn render_az_bar(active: &BTreeSet<char>, index_href: &str) -> String {
    let parts: Vec<String> = LETTERS
        .map(|ch| {
            if active.contains(&ch) {
                format!("<a href=\"{index_href}#{ch}\">{ch}</a>")
            } else {
                format!("<span class=\"x\">{ch}</span>")
            }
        })
        .collect();
    format!(
        "{}\n<div class=\"hm-idx\">\n{}\n</div>\n\n",
        PAGE_STYLE,
        parts.join("\n")
    )
}

/// All bucket letters, in order.
pub fn letters() -> impl Iterator<Item = char> {
    LETTERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscores_are_skipped() {
        assert_eq!(letter_bucket("__beta_internal"), Some('B'));
        assert_eq!(letter_bucket("alpha"), Some('A'));
        assert_eq!(letter_bucket("Zeta"), Some('Z'));
    }

    #[test]
    fn non_letters_have_no_bucket() {
        assert_eq!(letter_bucket("___"), None);
        assert_eq!(letter_bucket("9lives"), None);
        assert_eq!(letter_bucket(""), None);
    }

    #[test]
    fn sort_key_ignores_underscores_and_case() {
        let mut names = vec!["beta", "__Alpha", "_gamma"];
        names.sort_by_key(|n| index_sort_key(n));
        assert_eq!(names, vec!["__Alpha", "beta", "_gamma"]);
    }

    #[test]
    fn bar_links_active_letters() {
        let active: BTreeSet<char> = ['B', 'E'].into_iter().collect();
        let bar = render_az_bar(&active, "../");
        assert!(bar.contains("<a href=\"../#B\">B</a>"));
        assert!(bar.contains("<a href=\"../#E\">E</a>"));
        assert!(bar.contains("<span class=\"x\">A</span>"));
        assert_eq!(bar.matches("<span class=\"x\">").count(), 24);
        assert!(bar.starts_with("<style>"));
    }

    #[test]
    fn bar_on_index_uses_fragments() {
        let active: BTreeSet<char> = ['C'].into_iter().collect();
        assert!(render_az_bar(&active, "").contains("<a href=\"#C\">C</a>"));
    }
}
