//! JavaScript import resolution and module rewriting.
//!
//! | Specifier              | Resolved to                                  |
//! |------------------------|----------------------------------------------|
//! | `./x.js`, `../x.js`    | `/_import/<path>?sha=<content hash>`         |
//! | `/x.js`                | same, relative to the source root            |
//! | `npm:d3`, `d3`         | `https://cdn.jsdelivr.net/npm/d3/+esm`       |
//! | `observablehq:<name>`  | `/_observablehq/<name>`                      |
//! | `https://…`            | unchanged                                    |

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::FilePath;
use crate::utils::hash;

/// `import … from "x"`, `export … from "x"`, and `import "x"`.
static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\b(?:import|export)\s*(?:[\w$*\s{},]+?\s*from\s*)?)(["'])([^"'\n]+)(["'])"#)
        .expect("valid static import regex")
});

/// `import("x")` with a literal specifier.
static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\bimport\s*\(\s*)(["'])([^"'\n]+)(["'])(\s*\))"#)
        .expect("valid dynamic import regex")
});

const NPM_CDN: &str = "https://cdn.jsdelivr.net/npm/";

/// A resolved import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Root-relative module file.
    Local(FilePath),
    /// URL served by someone else.
    Remote(String),
}

/// Resolves specifiers against the source root.
#[derive(Debug, Clone, Copy)]
pub struct ImportResolver<'a> {
    root: &'a Path,
}

impl<'a> ImportResolver<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Resolve `specifier` as written in the module or page at `from`.
    pub fn resolve(&self, from: &FilePath, specifier: &str) -> Resolved {
        if is_local(specifier) {
            let path = if specifier.starts_with('/') {
                FilePath::new(specifier).normalize()
            } else {
                from.dirname().join(specifier)
            };
            return Resolved::Local(path);
        }
        Resolved::Remote(remote_url(specifier))
    }

    /// URL a browser should load for `specifier`.
    pub fn href(&self, from: &FilePath, specifier: &str) -> String {
        match self.resolve(from, specifier) {
            Resolved::Local(path) => match self.content_hash(&path) {
                Some(sha) => format!("/_import{path}?sha={sha}"),
                None => format!("/_import{path}"),
            },
            Resolved::Remote(url) => url,
        }
    }

    /// Short hash of a local module, `None` when unreadable.
    pub fn content_hash(&self, path: &FilePath) -> Option<String> {
        let file = path.resolve(self.root)?;
        let content = std::fs::read(file).ok()?;
        Some(hash::short(&content))
    }

    pub fn root(&self) -> &'a Path {
        self.root
    }
}

/// Specifiers that name a file under the source root.
pub fn is_local(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn remote_url(specifier: &str) -> String {
    if let Some(name) = specifier.strip_prefix("npm:") {
        return npm_url(name);
    }
    if let Some(name) = specifier.strip_prefix("observablehq:") {
        return format!("/_observablehq/{name}");
    }
    if specifier.contains("://") {
        return specifier.to_string();
    }
    npm_url(specifier)
}

/// CDN URL for an npm package (`d3`, `@observablehq/plot@0.6`).
pub fn npm_url(name: &str) -> String {
    if name.ends_with(".css") || name.ends_with(".js") && name.contains('/') {
        format!("{NPM_CDN}{name}")
    } else {
        format!("{NPM_CDN}{name}/+esm")
    }
}

/// Rewrite every import specifier in a served module.
pub fn rewrite_module(input: &str, path: &FilePath, resolver: &ImportResolver<'_>) -> String {
    let output = STATIC_IMPORT.replace_all(input, |caps: &Captures<'_>| {
        format!(
            "{}{}{}{}",
            &caps[1],
            &caps[2],
            resolver.href(path, &caps[3]),
            &caps[4]
        )
    });
    DYNAMIC_IMPORT
        .replace_all(&output, |caps: &Captures<'_>| {
            format!(
                "{}{}{}{}{}",
                &caps[1],
                &caps[2],
                resolver.href(path, &caps[3]),
                &caps[4],
                &caps[5]
            )
        })
        .into_owned()
}
