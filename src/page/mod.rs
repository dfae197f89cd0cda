//! Page navigation: traversal order and pager links.

mod pager;

pub use pager::{PageLink, find_link, walk_pages};
