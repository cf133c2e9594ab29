//! Markdown of the generated pages.

use super::Build;
use crate::collection::{field_label, SourceGroup};
use crate::model::{DocumentedEntity, EntityKind, FieldMap, SubtestMetadata, TestMetadata};
use crate::registry::{page_link, SymbolEntry, UrlStyle};
use crate::render::html::{escape_text, steps_html};
use crate::render::markdown::take_render_appendix;
use crate::render::{render_doc, render_docs};
use crate::toc::{index_sort_key, letter_bucket, letters, render_az_bar};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const VERSION_BOX_STYLE: &str = "padding:12px 16px;border-left:4px solid var(--md-typeset-a-color,#1a73e8);\
background:var(--md-admonition-bg-color,rgba(68,138,255,.1));border-radius:4px;margin-bottom:16px";

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Cut `text` to `max` chars, ending in `...` when shortened.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max - 3).collect();
    format!("{kept}...")
}

/// Names shown in the symbol index: no qualified forms, no files.
fn indexable(name: &str, kind: EntityKind) -> bool {
    !name.is_empty() && !name.contains('@') && !name.contains('/') && kind != EntityKind::File
}

impl Build {
    // -- A–Z bar --------------------------------------------------------------------------

    fn active_letters(&self, group: &SourceGroup) -> BTreeSet<char> {
        self.registry
            .in_collection(&group.nav_title)
            .filter(|(name, e)| indexable(name, e.kind))
            .filter_map(|(name, _)| letter_bucket(name))
            .collect()
    }

    fn az_bar(&self, group: &SourceGroup, current: &str) -> String {
        let index = group.index_page();
        let href = if current == index {
            String::new()
        } else {
            page_link(current, &index, self.registry.url_style())
        };
        render_az_bar(&self.active_letters(group), &href)
    }

    fn version_box(&self) -> Vec<String> {
        match &self.version {
            Some(v) => vec![
                format!("<div style=\"{VERSION_BOX_STYLE}\">"),
                format!("<strong>Version {v}</strong>"),
                "</div>".to_string(),
                String::new(),
            ],
            None => Vec::new(),
        }
    }

    // -- Source pages -----------------------------------------------------------------------

    pub(super) fn source_page_markdown(&mut self, index: usize, rel: &str, page: &str) -> String {
        let path = self.groups[index].root.join(rel);
        let args = self.groups[index].parser_args.clone();
        let entities = self.entities(&path, &args);
        let mut cfg = self.render_config(&path);
        cfg.heading_level = 2;

        let group = &self.groups[index];
        let basename = rel.rsplit('/').next().unwrap_or(rel);
        let header = format!("# {basename}\n\nSource file: `{rel}`\n\n");
        let bar = self.az_bar(group, page);
        if entities.is_empty() {
            return format!("{header}{bar}---\n\n_No documented symbols found in this file._");
        }

        let parts: Vec<String> = entities
            .iter()
            .map(|entity| {
                let rendered = render_doc(entity, &cfg);
                if entity.kind.is_callable() {
                    self.with_appendix(rendered, &entity.name)
                } else {
                    rendered
                }
            })
            .collect();
        format!("{header}{bar}---\n\n{}", parts.join("\n---\n\n"))
    }

    /// Collect the comment's how-to/notes and any code usages under one
    /// "Appendix" heading at the end of a function's section.
    fn with_appendix(&self, rendered: String, name: &str) -> String {
        let (mut rendered, comment_part) = take_render_appendix(&rendered);
        let usages = if self.config.appendix_code_usages {
            self.render_usages(name)
        } else {
            String::new()
        };
        if comment_part.is_none() && usages.is_empty() {
            return rendered;
        }

        let mut parts = vec![String::new(), "### Appendix".to_string(), String::new()];
        if let Some(text) = comment_part {
            parts.push(text);
            parts.push(String::new());
        }
        if !usages.is_empty() {
            parts.push(usages);
        }
        rendered.push_str(&parts.join("\n"));
        rendered
    }

    /// A file rendered on its own, without collection context.
    pub(super) fn file_markdown(
        &self,
        title: &str,
        entities: &[DocumentedEntity],
        path: &Path,
    ) -> String {
        let cfg = self.render_config(path);
        if entities.is_empty() {
            return format!("# {title}\n\n_No documented symbols found in this file._\n");
        }
        format!("# {title}\n\n{}\n", render_docs(entities, &cfg))
    }

    // -- Test pages -------------------------------------------------------------------------------

    pub(super) fn test_page_markdown(&mut self, index: usize, rel: &str, page: &str) -> String {
        let path = self.groups[index].root.join(rel);
        let args = self.groups[index].parser_args.clone();
        let entities = self.entities(&path, &args);
        let mut cfg = self.render_config(&path);
        cfg.heading_level = 3;

        let group = &self.groups[index];
        let bar = self.az_bar(group, page);
        let mut lines = Vec::new();

        let Some(meta) = group.test_metas.get(rel) else {
            lines.push(format!("# {}", rel.rsplit('/').next().unwrap_or(rel)));
            lines.push(String::new());
            lines.push(format!("Source file: `{rel}`"));
            lines.push(String::new());
            lines.push(bar);
            lines.push("---".to_string());
            lines.push(String::new());
            if !entities.is_empty() {
                lines.push("## Functions & Symbols".to_string());
                lines.push(String::new());
                lines.push(render_docs(&entities, &cfg));
            }
            return lines.join("\n");
        };

        lines.push(format!("<a id=\"test-{}\"></a>", meta.name));
        lines.push(String::new());
        lines.push(format!("# {}", meta.name));
        lines.push(String::new());
        let description = meta.fields.get("description").unwrap_or("");
        if !description.is_empty() {
            lines.push(description.to_string());
            lines.push(String::new());
        }

        let shown: Vec<String> = if group.test_fields.is_empty() {
            meta.fields
                .keys()
                .filter(|k| *k != "description")
                .map(str::to_string)
                .collect()
        } else {
            group.test_fields.clone()
        };
        if !shown.is_empty() {
            lines.push("| Field | Value |".to_string());
            lines.push("|-------|-------|".to_string());
            for key in &shown {
                match meta.fields.get_loose(key) {
                    Some(value) if !value.is_empty() && key != "description" => {
                        lines.push(format!("| {} | {} |", field_label(key), value));
                    }
                    _ => {}
                }
            }
            lines.push(String::new());
        }

        lines.push(format!("Source file: `{rel}`"));
        lines.push(String::new());
        lines.push(bar);
        lines.push("---".to_string());
        lines.push(String::new());

        if !meta.subtests.is_empty() {
            lines.extend(subtest_table(meta, group.extract_test_steps));
        }
        lines.join("\n")
    }

    // -- Collection index ------------------------------------------------------------------------

    pub(super) fn index_markdown(&mut self, index: usize) -> String {
        let page = self.groups[index].index_page();
        let counts: BTreeMap<String, usize> = if self.groups[index].is_test_catalog() {
            BTreeMap::new()
        } else {
            let group = self.groups[index].clone();
            group
                .discovered
                .iter()
                .map(|rel| {
                    let n = self.entities(&group.root.join(rel), &group.parser_args).len();
                    (rel.clone(), n)
                })
                .collect()
        };

        let group = &self.groups[index];
        let mut lines = vec![format!("# {}", group.nav_title), String::new()];
        lines.extend(self.version_box());

        if group.is_test_catalog() {
            lines.push(format!(
                "Test documentation generated from C/C++ sources. {} tests, {} subtests.",
                group.test_metas.len(),
                group.subtest_count()
            ));
        } else {
            let symbols = self
                .registry
                .in_collection(&group.nav_title)
                .filter(|(name, _)| !name.contains('@'))
                .count();
            lines.push(format!(
                "{} source files, {} documented symbols.",
                group.discovered.len(),
                symbols
            ));
        }
        lines.push(String::new());
        lines.push(self.az_bar(group, &page));

        lines.extend(self.file_tables(group, &counts));
        lines.extend(self.symbol_index(group));
        lines.join("\n")
    }

    fn file_tables(&self, group: &SourceGroup, counts: &BTreeMap<String, usize>) -> Vec<String> {
        let mut by_dir: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for rel in &group.discovered {
            let dir = rel.rsplit_once('/').map_or("", |(d, _)| d);
            by_dir.entry(dir).or_default().push(rel.as_str());
        }

        let mut lines = vec!["## Source Files".to_string(), String::new()];
        for (dir, files) in by_dir {
            if !dir.is_empty() {
                lines.push(format!("### {dir}/"));
                lines.push(String::new());
            }
            if group.is_test_catalog() {
                lines.push("| File | Test | Subtests | Description |".to_string());
                lines.push("|------|------|----------|-------------|".to_string());
            } else {
                lines.push("| File | Symbols |".to_string());
                lines.push("|------|---------|".to_string());
            }
            for rel in files {
                let name = rel.rsplit('/').next().unwrap_or(rel);
                let page = group.page_for(rel);
                let link = group.local_link(&page);
                if group.is_test_catalog() {
                    let meta = group.test_metas.get(rel);
                    let test = meta.map_or(name, |m| m.name.as_str());
                    let subs = meta.map_or(0, |m| m.subtests.len());
                    let desc = meta
                        .and_then(|m| m.fields.get("description"))
                        .unwrap_or("");
                    lines.push(format!(
                        "| [{name}]({link}) | {test} | {subs} | {} |",
                        truncate(desc, 50)
                    ));
                } else {
                    let n = counts.get(rel).copied().unwrap_or(0);
                    lines.push(format!(
                        "| [{name}]({link}) | {} |",
                        plural(n, "documented symbol")
                    ));
                }
            }
            lines.push(String::new());
        }
        lines
    }

    fn symbol_index(&self, group: &SourceGroup) -> Vec<String> {
        let mut by_letter: BTreeMap<char, Vec<(&str, &SymbolEntry)>> =
            BTreeMap::new();
        for (name, entry) in self.registry.in_collection(&group.nav_title) {
            if !indexable(name, entry.kind) {
                continue;
            }
            if let Some(letter) = letter_bucket(name) {
                by_letter.entry(letter).or_default().push((name, entry));
            }
        }

        let mut lines = vec![
            "---".to_string(),
            String::new(),
            "## Symbol Index".to_string(),
            String::new(),
        ];
        for letter in letters() {
            lines.push(format!("<a id=\"{letter}\"></a>"));
            lines.push(String::new());
            lines.push(format!("### {letter}"));
            lines.push(String::new());
            let Some(entries) = by_letter.get_mut(&letter) else {
                lines.push("*No symbols.*".to_string());
                lines.push(String::new());
                continue;
            };
            entries.sort_by_key(|(name, _)| index_sort_key(name));
            for (name, entry) in entries.iter() {
                let shown = if entry.kind.is_callable() {
                    format!("{name}()")
                } else {
                    name.to_string()
                };
                lines.push(format!(
                    "- [`{shown}`]({}#{}) — {}",
                    group.local_link(&entry.page),
                    entry.anchor,
                    entry.kind.label()
                ));
            }
            lines.push(String::new());
        }
        lines
    }

    // -- Group pages ---------------------------------------------------------------------------------

    pub(super) fn group_markdown(&self, index: usize, field: &str, page: &str) -> String {
        let group = &self.groups[index];
        let mut lines = vec![
            format!("# {} — By {}", group.nav_title, field_label(field)),
            String::new(),
            self.az_bar(group, page),
        ];
        if is_subtest_field(group, field) {
            lines.extend(subtest_groups(group, field));
        } else {
            lines.extend(test_groups(group, field));
        }
        lines.join("\n")
    }

    // -- Top index -----------------------------------------------------------------------------------

    pub(super) fn top_index_markdown(&self) -> String {
        let mut lines = vec![
            format!("# API Reference for {}", self.config.project_title()),
            String::new(),
        ];
        lines.extend(self.version_box());

        let live: Vec<&SourceGroup> = self
            .groups
            .iter()
            .filter(|g| !g.discovered.is_empty())
            .collect();
        lines.push(format!(
            "This reference covers {} documented symbols across {} source {}.",
            self.registry.len(),
            live.len(),
            if live.len() == 1 { "group" } else { "groups" }
        ));
        lines.push(String::new());
        lines.push("## Sources".to_string());
        lines.push(String::new());

        let top = self.top_index_page();
        for group in live {
            let link = page_link(&top, &group.index_page(), UrlStyle::Flat);
            let detail = if group.is_test_catalog() {
                format!(
                    " — {} tests, {} subtests",
                    group.test_metas.len(),
                    group.subtest_count()
                )
            } else {
                format!(
                    " — {} symbols",
                    self.registry.in_collection(&group.nav_title).count()
                )
            };
            lines.push(format!(
                "- **[{}]({link})** — {} files{detail}",
                group.nav_title,
                group.discovered.len()
            ));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

// -- Test catalog tables ---------------------------------------------------------------------

fn subtest_table(meta: &TestMetadata, show_steps: bool) -> Vec<String> {
    let mut lines = vec![
        format!("## Subtests ({})", meta.subtests.len()),
        String::new(),
        "<table class=\"hm-tc-table\">".to_string(),
        format!(
            "<thead><tr><th>TC (Subtest)</th><th>{}</th></tr></thead>",
            if show_steps { "Steps" } else { "Description" }
        ),
        "<tbody>".to_string(),
    ];
    for sub in sorted_subtests(&meta.subtests) {
        let description = sub.fields.get("description").unwrap_or("");
        let mut cell = format!(
            "<a id=\"subtest-{0}\"></a><strong>{0}</strong>",
            sub.name
        );
        if show_steps && !description.is_empty() {
            cell.push_str(&format!("<br><em>{}</em>", escape_text(description)));
        }
        for (key, value) in extra_fields(&sub.fields) {
            cell.push_str(&format!(
                "<br><small><strong>{}:</strong> {}</small>",
                field_label(key),
                escape_text(value)
            ));
        }
        if sub.is_dynamic() {
            cell.push_str(
                "<br><small><em>Dynamic subtest — names generated at runtime.</em></small>",
            );
        }

        let detail = match (show_steps, description.is_empty()) {
            (true, _) if !sub.steps.is_empty() => steps_html(&sub.steps),
            (true, false) => format!("<ol><li>{}</li></ol>", escape_text(description)),
            (true, true) => "<em>No steps extracted.</em>".to_string(),
            (false, false) => escape_text(description),
            (false, true) => "<em>No description.</em>".to_string(),
        };
        lines.push(format!("<tr><td>{cell}</td><td>{detail}</td></tr>"));
    }
    lines.push("</tbody></table>".to_string());
    lines.push(String::new());
    lines.push(String::new());
    lines
}

fn extra_fields(fields: &FieldMap) -> impl Iterator<Item = (&str, &str)> {
    fields
        .iter()
        .filter(|(k, _)| *k != "description" && *k != "dynamic")
}

fn sorted_subtests(subtests: &[SubtestMetadata]) -> Vec<&SubtestMetadata> {
    let mut sorted: Vec<&SubtestMetadata> = subtests.iter().collect();
    sorted.sort_by_key(|s| s.name.to_lowercase());
    sorted
}

/// True when more subtests than tests carry `field`.
fn is_subtest_field(group: &SourceGroup, field: &str) -> bool {
    let tests = group
        .test_metas
        .values()
        .filter(|t| t.fields.get_loose(field).is_some())
        .count();
    let subtests = group
        .test_metas
        .values()
        .flat_map(|t| &t.subtests)
        .filter(|s| s.fields.get_loose(field).is_some())
        .count();
    subtests > tests
}

fn subtest_row(link: &str, sub: &SubtestMetadata) -> String {
    let description = sub.fields.get("description").unwrap_or("");
    format!(
        "| [{0}]({link}#subtest-{0}) | {1} |",
        sub.name,
        truncate(description, 80)
    )
}

fn test_groups(group: &SourceGroup, field: &str) -> Vec<String> {
    let mut grouped: BTreeMap<&str, Vec<(&str, &TestMetadata)>> = BTreeMap::new();
    for (rel, meta) in &group.test_metas {
        let value = meta.fields.get_loose(field).unwrap_or("Uncategorized");
        grouped.entry(value).or_default().push((rel.as_str(), meta));
    }

    let mut lines = vec![
        format!(
            "{} tests, {} subtests.",
            group.test_metas.len(),
            group.subtest_count()
        ),
        String::new(),
        "---".to_string(),
        String::new(),
    ];
    for (value, mut entries) in grouped {
        let subs: usize = entries.iter().map(|(_, m)| m.subtests.len()).sum();
        lines.push(format!("## {value}"));
        lines.push(String::new());
        lines.push(format!("*{} tests, {subs} subtests*", entries.len()));
        lines.push(String::new());
        entries.sort_by_key(|(_, m)| m.name.to_lowercase());
        for (rel, meta) in entries {
            let page = group.page_for(rel);
            let link = group.local_link(&page);
            lines.push(format!("### [{0}]({link}#test-{0})", meta.name));
            lines.push(String::new());
            if let Some(desc) = meta.fields.get_loose("description").filter(|d| !d.is_empty()) {
                lines.push(format!("*{desc}*"));
                lines.push(String::new());
            }
            if meta.subtests.is_empty() {
                lines.push("*No subtests.*".to_string());
            } else {
                lines.push("| Subtest | Description |".to_string());
                lines.push("|---------|-------------|".to_string());
                for sub in sorted_subtests(&meta.subtests) {
                    lines.push(subtest_row(link, sub));
                }
            }
            lines.push(String::new());
        }
    }
    lines
}

fn subtest_groups(group: &SourceGroup, field: &str) -> Vec<String> {
    // value -> rel -> (test, subtests)
    let mut grouped: BTreeMap<&str, BTreeMap<&str, (&TestMetadata, Vec<&SubtestMetadata>)>> =
        BTreeMap::new();
    let mut total = 0;
    for (rel, meta) in &group.test_metas {
        for sub in &meta.subtests {
            let value = sub.fields.get_loose(field).unwrap_or("Uncategorized");
            grouped
                .entry(value)
                .or_default()
                .entry(rel.as_str())
                .or_insert_with(|| (meta, Vec::new()))
                .1
                .push(sub);
            total += 1;
        }
    }

    let mut lines = vec![
        format!("{} groups, {total} subtests.", grouped.len()),
        String::new(),
        "---".to_string(),
        String::new(),
    ];
    for (value, tests) in grouped {
        let count: usize = tests.values().map(|(_, subs)| subs.len()).sum();
        lines.push(format!("## {value}"));
        lines.push(String::new());
        lines.push(format!("*{count} subtests*"));
        lines.push(String::new());

        let mut tests: Vec<_> = tests.into_iter().collect();
        tests.sort_by_key(|(_, (meta, _))| meta.name.to_lowercase());
        for (rel, (meta, subs)) in tests {
            let page = group.page_for(rel);
            let link = group.local_link(&page);
            lines.push(format!("### [{0}]({link}#test-{0})", meta.name));
            lines.push(String::new());
            lines.push("| Subtest | Description |".to_string());
            lines.push("|---------|-------------|".to_string());
            let mut subs = subs;
            subs.sort_by_key(|s| s.name.to_lowercase());
            for sub in subs {
                lines.push(subtest_row(link, sub));
            }
            lines.push(String::new());
        }
    }
    lines
}
