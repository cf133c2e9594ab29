//! Navigation tree in the mkdocs `nav:` shape.

use crate::collection::{field_label, SourceGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One nav entry: `{title: page}`, `{title: [children]}` or a bare page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavItem {
    Page(BTreeMap<String, String>),
    Section(BTreeMap<String, Vec<NavItem>>),
    PlainPath(String),
}

impl NavItem {
    pub fn page(title: impl Into<String>, target: impl Into<String>) -> Self {
        NavItem::Page(BTreeMap::from([(title.into(), target.into())]))
    }

    pub fn section(title: impl Into<String>, children: Vec<NavItem>) -> Self {
        NavItem::Section(BTreeMap::from([(title.into(), children)]))
    }
}

/// Overview, "By <Label>" pages, then the configured extra pages.
pub fn group_nav(group: &SourceGroup) -> Vec<NavItem> {
    let mut nav = Vec::new();
    if group.generate_index {
        nav.push(NavItem::page("Overview", group.index_page()));
    }
    if group.is_test_catalog() {
        for field in &group.test_group_by {
            nav.push(NavItem::page(
                format!("By {}", field_label(field)),
                group.group_page(field),
            ));
        }
    }
    nav.extend(group.pages.iter().cloned());
    nav
}

/// The whole generated section. A single collection is its own section;
/// several get a shared overview page first. Collections without files
/// are left out; `None` when nothing is left.
pub fn site_nav(groups: &[SourceGroup], title: &str, top_index: &str) -> Option<NavItem> {
    let live: Vec<&SourceGroup> = groups.iter().filter(|g| !g.discovered.is_empty()).collect();
    if groups.len() == 1 {
        return live.first().map(|g| NavItem::section(title, group_nav(g)));
    }

    let mut children = vec![NavItem::page("Overview", top_index)];
    children.extend(
        live.iter()
            .map(|g| NavItem::section(g.nav_title.clone(), group_nav(g))),
    );
    (children.len() > 1).then(|| NavItem::section(title, children))
}
