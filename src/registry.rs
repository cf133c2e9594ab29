//! Symbol registry — maps entity names to the page and anchor that
//! document them, and computes links between generated pages.

use crate::model::{anchor_id, DocumentedEntity, EntityKind, TestMetadata};
use std::collections::{BTreeMap, HashSet};

/// How generated pages are addressed by the host site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlStyle {
    /// `dir/page.md` is served as `dir/page/`.
    #[default]
    Directory,
    /// `dir/page.md` is linked as-is.
    Flat,
}

/// One registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: EntityKind,
    pub page: String,
    /// Empty for file entries.
    pub anchor: String,
    /// Display title of the owning collection.
    pub collection: String,
}

/// Name → location index for one build.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, SymbolEntry>,
    /// Basenames claimed by more than one page. Never re-admitted.
    ambiguous: HashSet<String>,
    url_style: UrlStyle,
}

impl Registry {
    pub fn new(url_style: UrlStyle) -> Self {
        Self {
            url_style,
            ..Self::default()
        }
    }

    pub fn url_style(&self) -> UrlStyle {
        self.url_style
    }

    /// Drop every entry, including the ambiguity set.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ambiguous.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries owned by one collection, keyed by registered name.
    pub fn in_collection<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a SymbolEntry)> + 'a {
        self.iter().filter(move |(_, e)| e.collection == collection)
    }

    // -- Registration -------------------------------------------------------------

    /// Register entities documented on `page`. Bare names keep their first
    /// registration; qualified `container.member` names always take the
    /// latest.
    pub fn register(&mut self, entities: &[DocumentedEntity], page: &str, collection: &str) {
        for entity in entities {
            self.register_entity(entity, None, page, collection);
        }
    }

    fn register_entity(
        &mut self,
        entity: &DocumentedEntity,
        parent: Option<&str>,
        page: &str,
        collection: &str,
    ) {
        if entity.name.is_empty() {
            return;
        }
        let entry = SymbolEntry {
            name: entity.name.clone(),
            kind: entity.kind,
            page: page.to_string(),
            anchor: entity.anchor(),
            collection: collection.to_string(),
        };
        if let Some(parent) = parent {
            self.entries
                .insert(format!("{parent}.{}", entity.name), entry.clone());
        }
        self.entries.entry(entity.name.clone()).or_insert(entry);

        for member in &entity.members {
            self.register_entity(member, Some(&entity.name), page, collection);
        }
    }

    /// Register a source file page under `<slug>/<basename>` and, while
    /// unambiguous, its bare basename.
    pub fn register_file(&mut self, rel_path: &str, page: &str, slug: &str, collection: &str) {
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
        let entry = SymbolEntry {
            name: basename.to_string(),
            kind: EntityKind::File,
            page: page.to_string(),
            anchor: String::new(),
            collection: collection.to_string(),
        };
        self.entries.insert(format!("{slug}/{basename}"), entry.clone());

        if self.ambiguous.contains(basename) {
            return;
        }
        match self.entries.get(basename) {
            None => {
                self.entries.insert(basename.to_string(), entry);
            }
            Some(existing) if existing.kind == EntityKind::File && existing.page != page => {
                self.entries.remove(basename);
                self.ambiguous.insert(basename.to_string());
            }
            Some(_) => {}
        }
    }

    /// Register a test and its sub-tests. Sub-tests are also reachable as
    /// `test@subtest`, which always takes the latest registration.
    pub fn register_test(&mut self, meta: &TestMetadata, page: &str, collection: &str) {
        if meta.name.is_empty() {
            return;
        }
        self.entries
            .entry(meta.name.clone())
            .or_insert_with(|| SymbolEntry {
                name: meta.name.clone(),
                kind: EntityKind::Test,
                page: page.to_string(),
                anchor: anchor_id(EntityKind::Test, &meta.name),
                collection: collection.to_string(),
            });

        for sub in &meta.subtests {
            let entry = SymbolEntry {
                name: sub.name.clone(),
                kind: EntityKind::Subtest,
                page: page.to_string(),
                anchor: anchor_id(EntityKind::Subtest, &sub.name),
                collection: collection.to_string(),
            };
            self.entries
                .insert(format!("{}@{}", meta.name, sub.name), entry.clone());
            self.entries.entry(sub.name.clone()).or_insert(entry);
        }
    }

    // -- Resolution -------------------------------------------------------------------

    /// Link target for `name` as seen from `current_page`, or `None` when
    /// the name is unknown.
    pub fn resolve(&self, name: &str, current_page: &str) -> Option<String> {
        let name = name.trim();
        let name = name.strip_suffix("()").unwrap_or(name);
        let entry = self.entries.get(name)?;

        if entry.page == current_page {
            return Some(if entry.anchor.is_empty() {
                String::new()
            } else {
                format!("#{}", entry.anchor)
            });
        }

        let rel = page_link(current_page, &entry.page, self.url_style);
        if entry.anchor.is_empty() {
            Some(rel)
        } else {
            Some(format!("{rel}?h={name}#{}", entry.anchor))
        }
    }
}

// -- Relative addressing ----------------------------------------------------------------

/// Relative link from the page `from` to the page `to` (both page ids
/// such as `api/core/engine.h.md`).
pub fn page_link(from: &str, to: &str, style: UrlStyle) -> String {
    match style {
        UrlStyle::Directory => {
            let rel = relative_path(directory_form(from), directory_form(to));
            if rel == "." {
                "./".to_string()
            } else {
                format!("{rel}/")
            }
        }
        UrlStyle::Flat => relative_path(parent_dir(from), to),
    }
}

/// The directory a page is served from: `a/b.md` → `a/b`, `a/index.md` → `a`.
pub fn directory_form(page: &str) -> &str {
    let stem = page.strip_suffix(".md").unwrap_or(page);
    if stem == "index" {
        ""
    } else {
        stem.strip_suffix("/index").unwrap_or(stem)
    }
}

/// Directory part of a page id (`a/b.md` → `a`, `b.md` → ``).
pub fn parent_dir(page: &str) -> &str {
    page.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// `os.path.relpath`-style relative path from directory `from_dir` to
/// `target`.
pub fn relative_path(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubtestMetadata;

    fn func(name: &str) -> DocumentedEntity {
        DocumentedEntity::new(name, EntityKind::Function, "")
    }

    #[test]
    fn resolve_on_same_page_is_fragment() {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register(&[func("engine_init")], "api/engine.h.md", "API");
        assert_eq!(
            r.resolve("engine_init", "api/engine.h.md").as_deref(),
            Some("#func-engine_init")
        );
    }

    #[test]
    fn resolve_across_pages_directory_style() {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register(&[func("engine_init")], "api/core/engine.h.md", "API");
        assert_eq!(
            r.resolve("engine_init()", "api/drivers/uart.c.md").as_deref(),
            Some("../../core/engine.h/?h=engine_init#func-engine_init")
        );
    }

    #[test]
    fn resolve_across_pages_flat_style() {
        let mut r = Registry::new(UrlStyle::Flat);
        r.register(&[func("engine_init")], "api/core/engine.h.md", "API");
        assert_eq!(
            r.resolve("engine_init", "api/drivers/uart.c.md").as_deref(),
            Some("../core/engine.h.md?h=engine_init#func-engine_init")
        );
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let r = Registry::new(UrlStyle::Directory);
        assert_eq!(r.resolve("nope", "a.md"), None);
    }

    #[test]
    fn first_bare_registration_wins() {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register(&[func("dup")], "a.md", "A");
        r.register(&[func("dup")], "b.md", "B");
        assert_eq!(r.get("dup").unwrap().page, "a.md");
    }

    #[test]
    fn qualified_member_last_write_wins() {
        let mut s1 = DocumentedEntity::new("cfg", EntityKind::Struct, "");
        s1.members.push(DocumentedEntity::new("debug", EntityKind::Field, ""));
        let s2 = s1.clone();

        let mut r = Registry::new(UrlStyle::Directory);
        r.register(&[s1], "a.md", "A");
        r.register(&[s2], "b.md", "B");
        assert_eq!(r.get("cfg.debug").unwrap().page, "b.md");
        assert_eq!(r.get("debug").unwrap().page, "a.md");
        assert_eq!(r.get("debug").unwrap().anchor, "field-debug");
    }

    #[test]
    fn colliding_basenames_are_evicted_permanently() {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register_file("src/util.c", "api/lib/src/util.c.md", "lib", "Lib");
        r.register_file("util.c", "api/app/util.c.md", "app", "App");
        assert!(!r.contains("util.c"));
        assert_eq!(
            r.resolve("lib/util.c", "api/index.md").as_deref(),
            Some("lib/src/util.c/")
        );
        assert_eq!(
            r.resolve("app/util.c", "api/index.md").as_deref(),
            Some("app/util.c/")
        );

        r.register_file("other/util.c", "api/third/util.c.md", "third", "Third");
        assert!(!r.contains("util.c"));
    }

    #[test]
    fn same_file_registered_twice_stays() {
        let mut r = Registry::new(UrlStyle::Directory);
        r.register_file("a.c", "api/a.c.md", "api", "API");
        r.register_file("a.c", "api/a.c.md", "api", "API");
        assert!(r.contains("a.c"));
    }

    #[test]
    fn file_entry_has_no_fragment() {
        let mut r = Registry::new(UrlStyle::Flat);
        r.register_file("a.c", "api/a.c.md", "api", "API");
        assert_eq!(r.resolve("a.c", "api/b.c.md").as_deref(), Some("a.c.md"));
        assert_eq!(r.resolve("a.c", "api/a.c.md").as_deref(), Some(""));
    }

    #[test]
    fn tests_and_subtests_registered() {
        let meta = TestMetadata {
            name: "kms_addfb".into(),
            subtests: vec![SubtestMetadata::new("basic")],
            ..TestMetadata::default()
        };
        let mut r = Registry::new(UrlStyle::Directory);
        r.register_test(&meta, "tests/kms_addfb.c.md", "Tests");
        assert_eq!(r.get("kms_addfb").unwrap().anchor, "test-kms_addfb");
        assert_eq!(r.get("kms_addfb@basic").unwrap().anchor, "subtest-basic");
        assert_eq!(r.get("basic").unwrap().kind, EntityKind::Subtest);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_path("a/b", "a/c"), "../c");
        assert_eq!(relative_path("", "a/b"), "a/b");
        assert_eq!(relative_path("a", "a"), ".");
        assert_eq!(directory_form("api/index.md"), "api");
        assert_eq!(directory_form("index.md"), "");
        assert_eq!(page_link("api/a.c.md", "api/index.md", UrlStyle::Directory), "../");
    }
}
