//! Navigation tree: `[[pages]]` entries and automatic discovery.

use std::path::Path;

use anyhow::Result;
use jwalk::WalkDir;
use serde::{Deserialize, Serialize};

use crate::core::UrlPath;

/// A single navigable page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub name: String,
    pub path: UrlPath,
}

/// One entry of the page tree: a page, or a named group of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageEntry {
    Section {
        name: String,
        pages: Vec<PageEntry>,
        #[serde(default)]
        open: bool,
    },
    Page(Page),
}

impl Page {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: UrlPath::new(path),
        }
    }
}

/// Build a flat page list from the `.md` files under `root`.
///
/// Skips `index.md` and `404.md` at the root, and anything inside a
/// directory whose name starts with `.` or `_`.
pub fn discover_pages(root: &Path) -> Result<Vec<PageEntry>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(root).sort(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let hidden = relative.components().any(|c| {
            let s = c.as_os_str().to_string_lossy();
            s.starts_with('.') || s.starts_with('_')
        });
        if hidden || relative == Path::new("index.md") || relative == Path::new("404.md") {
            continue;
        }

        let url = format!(
            "/{}",
            relative
                .with_extension("")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        );
        let name = std::fs::read_to_string(&path)
            .ok()
            .and_then(|source| first_heading(&source))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        pages.push(PageEntry::Page(Page::new(name, url)));
    }
    Ok(pages)
}

/// Text of the first `# ` heading, if any.
pub fn first_heading(source: &str) -> Option<String> {
    source
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}
