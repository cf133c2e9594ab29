//! cdoc — API reference and test catalog pages from C/C++ doc comments.
//!
//! The pipeline runs leaves first: [`comment`] strips comment decoration,
//! [`markup`] turns gtk-doc and reST-style markup into markdown, [`parser`]
//! extracts documented entities, [`registry`] and [`xref`] link names
//! across pages, [`testmeta`] reads test catalogs, and [`site`] composes
//! everything into pages. [`convert`] rewrites gtk-doc comments in place.

pub mod collection;
pub mod comment;
pub mod config;
pub mod convert;
pub mod error;
pub mod markup;
pub mod model;
pub mod parser;
pub mod registry;
pub mod render;
pub mod site;
pub mod testmeta;
pub mod text;
pub mod toc;
pub mod xref;

pub use config::Config;
pub use site::Build;
