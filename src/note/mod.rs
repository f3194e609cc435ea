//! Document Loader: turns a markdown file on disk into a [`Document`].

pub mod document;
pub mod frontmatter;

pub use document::{load, Document};
