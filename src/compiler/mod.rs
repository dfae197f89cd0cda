//! Page compilation for the preview server.
//!
//! # Module Structure
//!
//! - `markdown` - Front matter, HTML, and cell extraction
//! - `imports` - Module specifier resolution and rewriting
//! - `diff` - Incremental updates between two parses
//! - `page` - Full page rendering (head, sidebar, pager)
//! - `libraries` - Stylesheets implied by standard library names
//! - `styles` - Theme and stylesheet bundling
//! - `search` - Search index
//! - `loader` - Data loaders

pub mod diff;
pub mod imports;
pub mod libraries;
pub mod loader;
pub mod markdown;
pub mod page;
pub mod search;
pub mod styles;

pub use diff::{MarkdownDiff, diff_markdown};
pub use markdown::{ParseResult, parse_markdown};
pub use page::{page_stylesheets, render_preview};
