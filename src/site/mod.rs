//! Build orchestrator.
//!
//! A [`Build`] owns everything one documentation build needs: the
//! collections, the parse cache and the symbol registry. [`Build::discover`]
//! walks every collection and fills the registry; afterwards each page id
//! from [`Build::page_ids`] can be rendered with [`Build::render_page`].
//! Hand-written pages go through [`Build::render_markdown`].

pub mod directive;
pub mod nav;
pub mod pages;
pub mod usages;

use crate::collection::{discover_sources, SourceGroup};
use crate::config::Config;
use crate::model::{DocumentedEntity, TestMetadata};
use crate::parser::ParseCache;
use crate::registry::{Registry, UrlStyle};
use crate::render::RenderConfig;
use crate::testmeta::parse_test_source;
use crate::xref::Resolver;
use nav::NavItem;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::{error, info, warn};

static RE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]?(?:version|VERSION|Version)['"]?\s*[:=]\s*['"]?(\d+\.\d+(?:\.\d+)?)['"]?"#)
        .unwrap()
});

const CPP_EXTENSIONS: &[&str] = &["cpp", "hpp", "cc", "hh", "cxx", "hxx"];

/// What a generated page id renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    /// One source file of collection `group`.
    Source { group: usize, rel: String },
    /// Collection index.
    Index { group: usize },
    /// Tests grouped by a metadata field.
    Group { group: usize, field: String },
    /// Overview of all collections.
    TopIndex,
}

pub struct Build {
    config: Config,
    base_dir: PathBuf,
    groups: Vec<SourceGroup>,
    cache: ParseCache,
    registry: Registry,
    pages: BTreeMap<String, PageTarget>,
    version: Option<String>,
}

impl Build {
    /// Set up a build for `config`. Relative paths in the config are taken
    /// from `base_dir`.
    pub fn new(config: Config, base_dir: &Path) -> Self {
        let groups = SourceGroup::from_config(&config, base_dir);
        let url_style = if config.use_directory_urls {
            UrlStyle::Directory
        } else {
            UrlStyle::Flat
        };
        let cache = ParseCache::new(config.parser, config.fallback_parser, config.convert_gtkdoc);
        Self {
            config,
            base_dir: base_dir.to_path_buf(),
            groups,
            cache,
            registry: Registry::new(url_style),
            pages: BTreeMap::new(),
            version: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn groups(&self) -> &[SourceGroup] {
        &self.groups
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Generated page ids, sorted.
    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    pub fn page_target(&self, page: &str) -> Option<&PageTarget> {
        self.pages.get(page)
    }

    /// Page id of the overview shown when several collections exist.
    pub fn top_index_page(&self) -> String {
        format!("{}/index.md", self.config.autodoc_output_dir)
    }

    // -- Discovery --------------------------------------------------------------------

    /// Reset all build state, read the version file, then discover and
    /// register every collection in order.
    pub fn discover(&mut self) {
        self.cache.clear();
        self.registry.clear();
        self.pages.clear();
        self.version = self.read_version();

        if !self.config.autodoc {
            return;
        }
        for index in 0..self.groups.len() {
            self.discover_group(index);
        }
        if self.groups.len() > 1 {
            self.pages.insert(self.top_index_page(), PageTarget::TopIndex);
        }
        if !self.registry.is_empty() {
            info!("symbol registry built, {} symbols indexed", self.registry.len());
        }
    }

    fn discover_group(&mut self, index: usize) {
        let group = &mut self.groups[index];
        group.discovered.clear();
        group.test_metas.clear();
        if !group.root.is_dir() {
            error!("source root missing: {}", group.root.display());
            return;
        }
        group.discovered = discover_sources(&group.root, &group.extensions, &group.exclude);
        info!(
            "[{}] {} files in {}",
            group.nav_title,
            group.discovered.len(),
            group.root.display()
        );

        let group = &self.groups[index];
        let mut metas = BTreeMap::new();
        for rel in &group.discovered {
            let page = group.page_for(rel);
            let path = group.root.join(rel);
            self.pages.insert(
                page.clone(),
                PageTarget::Source {
                    group: index,
                    rel: rel.clone(),
                },
            );

            let entities = self.cache.get(&path, &group.parser_args);
            self.registry.register(&entities, &page, &group.nav_title);
            self.registry
                .register_file(rel, &page, group.slug(), &group.nav_title);

            if group.is_test_catalog() {
                let meta = read_test_metadata(&path, group.extract_test_steps);
                self.registry.register_test(&meta, &page, &group.nav_title);
                metas.insert(rel.clone(), meta);
            }
        }

        if group.generate_index && !group.discovered.is_empty() {
            self.pages
                .insert(group.index_page(), PageTarget::Index { group: index });
        }
        if group.is_test_catalog() {
            for field in &group.test_group_by {
                self.pages.insert(
                    group.group_page(field),
                    PageTarget::Group {
                        group: index,
                        field: field.clone(),
                    },
                );
            }
        }
        self.groups[index].test_metas = metas;
    }

    fn read_version(&self) -> Option<String> {
        if self.config.version_file.is_empty() {
            return None;
        }
        let path = self.base_dir.join(&self.config.version_file);
        let version = read_version(&path);
        if let Some(v) = &version {
            info!("project version {} (from {})", v, path.display());
        }
        version
    }

    // -- Rendering ------------------------------------------------------------------------

    /// Render a generated page, references resolved. `None` for ids that
    /// are not generated pages.
    pub fn render_page(&mut self, page: &str) -> Option<String> {
        let target = self.pages.get(page)?.clone();
        let markdown = match target {
            PageTarget::TopIndex => self.top_index_markdown(),
            PageTarget::Index { group } => self.index_markdown(group),
            PageTarget::Group { group, field } => self.group_markdown(group, &field, page),
            PageTarget::Source { group, rel } if self.groups[group].is_test_catalog() => {
                self.test_page_markdown(group, &rel, page)
            }
            PageTarget::Source { group, rel } => self.source_page_markdown(group, &rel, page),
        };
        Some(self.resolve(&markdown, page))
    }

    /// Expand directives in a hand-written page served as `page` and
    /// resolve its references.
    pub fn render_markdown(&mut self, markdown: &str, page: &str) -> String {
        let expanded = self.expand_directives(markdown);
        self.resolve(&expanded, page)
    }

    /// Register the symbols of a file rendered outside any collection
    /// under `page`.
    pub fn add_file(&mut self, path: &Path, page: &str) {
        let entities = self.cache.get(path, &self.config.parser_args);
        self.registry.register(&entities, page, "");
    }

    /// Render one source file outside any collection. Files added with
    /// [`Build::add_file`] beforehand can be linked to.
    pub fn render_file(&mut self, path: &Path, page: &str) -> String {
        let entities = self.cache.get(path, &self.config.parser_args);
        let title = crate::parser::display_name(path);
        let markdown = self.file_markdown(&title, &entities, path);
        self.resolve(&markdown, page)
    }

    fn resolve(&self, markdown: &str, page: &str) -> String {
        Resolver::new(&self.registry, self.config.auto_xref).apply(markdown, page)
    }

    /// Navigation for the generated pages.
    pub fn nav(&self) -> Option<NavItem> {
        nav::site_nav(
            &self.groups,
            &self.config.autodoc_nav_title,
            &self.top_index_page(),
        )
    }

    // -- Shared helpers -----------------------------------------------------------------

    fn entities(&mut self, path: &Path, args: &[String]) -> Rc<Vec<DocumentedEntity>> {
        self.cache.get(path, args)
    }

    /// Render options for a file, with the fence language picked from its
    /// extension.
    fn render_config(&self, path: &Path) -> RenderConfig {
        let is_cpp = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CPP_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        self.render_config_for(if is_cpp { "cpp" } else { &self.config.language })
    }

    fn render_config_for(&self, language: &str) -> RenderConfig {
        RenderConfig {
            heading_level: self.config.heading_level,
            show_source_link: self.config.show_source_link,
            source_uri: self.config.source_uri.clone(),
            members: self.config.members,
            signature_style: self.config.signature_style,
            convert_rst: self.config.convert_rst,
            language: language.to_string(),
        }
    }
}

/// First `version = X.Y[.Z]`-style assignment in `path`.
pub fn read_version(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => text
            .lines()
            .find_map(|line| RE_VERSION.captures(line).map(|c| c[1].to_string())),
        Err(e) => {
            warn!("cannot read version file {}: {}", path.display(), e);
            None
        }
    }
}

fn read_test_metadata(path: &Path, with_steps: bool) -> TestMetadata {
    let name = crate::parser::display_name(path);
    match fs::read_to_string(path) {
        Ok(source) => parse_test_source(&source, &name, with_steps),
        Err(e) => {
            warn!("cannot read {}: {}", path.display(), e);
            parse_test_source("", &name, false)
        }
    }
}
