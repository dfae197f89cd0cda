//! Site URL and source file path types.
//!
//! - `UrlPath`: decoded, site-absolute URL path (`/docs/intro`)
//! - `FilePath`: root-relative source path (`/docs/intro.md`)
//!
//! The two never mix implicitly: crossing the boundary goes through
//! [`url_to_file`] / [`file_to_url`]. All helpers use POSIX semantics
//! regardless of platform; [`FilePath::resolve`] is the only place that
//! produces a native path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Decoded URL path (internal representation)
///
/// Invariants after [`UrlPath::normalize`]:
/// - no query string or fragment
/// - no `.` or `..` segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlPath(String);

/// Root-relative filesystem path, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilePath(String);

/// A request URL split into its decoded path and raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub path: UrlPath,
    /// Either empty or starting with `?`.
    pub search: String,
}

impl RequestTarget {
    /// Parse a raw request target (`/a%20b/c?x=1#frag`).
    pub fn parse(raw: &str) -> Self {
        use percent_encoding::percent_decode_str;

        static BASE: OnceLock<url::Url> = OnceLock::new();
        let base = BASE.get_or_init(|| url::Url::parse("http://localhost").expect("valid base url"));

        match base.join(raw) {
            Ok(parsed) => {
                let path = percent_decode_str(parsed.path())
                    .decode_utf8()
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| parsed.path().to_string());
                let search = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();
                Self {
                    path: UrlPath(path),
                    search,
                }
            }
            Err(_) => Self {
                path: UrlPath::new(strip_query_fragment(raw)),
                search: String::new(),
            },
        }
    }
}

impl UrlPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strip query/fragment and collapse `.`/`..` segments.
    pub fn normalize(&self) -> Self {
        Self(normalize(strip_query_fragment(&self.0)))
    }

    #[inline]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    #[inline]
    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    /// The part after `prefix`, as a new URL path (`/_file/a.csv` → `/a.csv`).
    pub fn strip_prefix(&self, prefix: &str) -> Option<Self> {
        self.0.strip_prefix(prefix).map(|rest| Self(rest.to_string()))
    }

    pub fn dirname(&self) -> Self {
        Self(dirname(&self.0).to_string())
    }

    pub fn basename(&self, ext: Option<&str>) -> &str {
        basename(&self.0, ext)
    }

    pub fn join(&self, segment: &str) -> Self {
        Self(join(&self.0, segment))
    }
}

impl FilePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalize(&self) -> Self {
        Self(normalize(&self.0))
    }

    pub fn dirname(&self) -> Self {
        Self(dirname(&self.0).to_string())
    }

    pub fn basename(&self, ext: Option<&str>) -> &str {
        basename(&self.0, ext)
    }

    pub fn extname(&self) -> &str {
        extname(&self.0)
    }

    pub fn join(&self, segment: &str) -> Self {
        Self(join(&self.0, segment))
    }

    /// Append a raw suffix (`/a/index` + `.md`).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    /// Resolve against the site root.
    ///
    /// Returns `None` when the path would escape the root.
    pub fn resolve(&self, root: &Path) -> Option<PathBuf> {
        let normalized = normalize(&self.0);
        if normalized == ".." || normalized.starts_with("../") {
            return None;
        }
        let relative = normalized.trim_start_matches('/');
        if relative.is_empty() || relative == "." {
            return Some(root.to_path_buf());
        }
        let mut resolved = root.to_path_buf();
        resolved.extend(relative.split('/').filter(|s| !s.is_empty()));
        if normalized.ends_with('/') {
            resolved.push("");
        }
        Some(resolved)
    }
}

impl fmt::Display for UrlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Boundary conversions
// ============================================================================

/// Map a site URL to the root-relative source path it names.
#[inline]
pub fn url_to_file(path: &UrlPath) -> FilePath {
    FilePath(path.0.clone())
}

/// Map a root-relative source path back to its site URL.
#[inline]
pub fn file_to_url(path: &FilePath) -> UrlPath {
    UrlPath(path.0.replace('\\', "/"))
}

/// Strip URL query string and hash fragment.
pub fn strip_query_fragment(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Relative URL from the page at `source` to `target`.
///
/// Targets with a scheme (`https:`, `npm:`) are returned unchanged.
pub fn relative_url(source: &str, target: &str) -> String {
    if has_scheme(target) {
        return target.to_string();
    }
    let source = join("/", source);
    let target = join("/", target);
    let mut from: Vec<&str> = source.split('/').filter(|s| !s.is_empty()).collect();
    // Only the directory part of the source matters.
    if !source.ends_with('/') {
        from.pop();
    }
    let mut to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let file = if target.ends_with('/') { "" } else { to.pop().unwrap_or("") };

    let shared = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let up = from.len() - shared;
    let prefix = if up > 0 { "../".repeat(up) } else { "./".to_string() };

    let mut rest: Vec<&str> = to[shared..].to_vec();
    rest.push(file);
    format!("{prefix}{}", rest.join("/"))
}

fn has_scheme(s: &str) -> bool {
    match s.find(':') {
        Some(i) if i > 0 => s[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

// ============================================================================
// POSIX path helpers
// ============================================================================

/// Collapse `.`/`..` and duplicate separators, keeping a trailing slash.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let mut out = parts.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        out.push('.');
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Parent directory (`/a/index` → `/a`, `/index` → `/`, `/a/` → `/`).
pub fn dirname(path: &str) -> &str {
    let trimmed = trim_trailing_slashes(path);
    match trimmed.rfind('/') {
        None => ".",
        Some(0) => "/",
        Some(i) => &trimmed[..i],
    }
}

/// Last segment, optionally without `ext` (`/a/b.html`, `.html` → `b`).
pub fn basename<'a>(path: &'a str, ext: Option<&str>) -> &'a str {
    let trimmed = trim_trailing_slashes(path);
    let name = match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    };
    match ext {
        Some(ext) if name != ext => name.strip_suffix(ext).unwrap_or(name),
        _ => name,
    }
}

/// Extension including the dot, or empty.
pub fn extname(path: &str) -> &str {
    let name = basename(path, None);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i..],
        _ => "",
    }
}

/// Join two path fragments and normalize the result.
pub fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        return normalize(segment);
    }
    normalize(&format!("{base}/{segment}"))
}

fn trim_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target_parse() {
        let target = RequestTarget::parse("/a%20b/c?x=1#frag");
        assert_eq!(target.path.as_str(), "/a b/c");
        assert_eq!(target.search, "?x=1");

        let target = RequestTarget::parse("/plain");
        assert_eq!(target.path.as_str(), "/plain");
        assert_eq!(target.search, "");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/../../x"), "/x");
        assert_eq!(normalize("a/../../x"), "../x");
        assert_eq!(normalize("/a//b/"), "/a/b/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), ".");
    }

    #[test]
    fn test_url_normalize_strips_query_and_fragment() {
        let url = UrlPath::new("/docs/../intro?x=1#top").normalize();
        assert_eq!(url.as_str(), "/intro");
    }

    #[test]
    fn test_dirname_basename_extname() {
        assert_eq!(dirname("/a/index"), "/a");
        assert_eq!(dirname("/index"), "/");
        assert_eq!(dirname("/a/"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(basename("/a/index.html", Some(".html")), "index");
        assert_eq!(basename("/a/", None), "a");
        assert_eq!(basename("/.html", Some(".html")), ".html");
        assert_eq!(extname("/a/b.test.md"), ".md");
        assert_eq!(extname("/a/.hidden"), "");
        assert_eq!(extname("/a/"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/a", "/"), "/a/");
        assert_eq!(join("/a/", "index"), "/a/index");
        assert_eq!(join("/", "index"), "/index");
        assert_eq!(join("/a/b", "../c.js"), "/a/c.js");
    }

    #[test]
    fn test_conversions_round_trip() {
        let url = UrlPath::new("/data/cars.csv");
        let file = url_to_file(&url);
        assert_eq!(file.as_str(), "/data/cars.csv");
        assert_eq!(file_to_url(&file), url);
    }

    #[test]
    fn test_file_path_resolve() {
        let root = Path::new("/site");
        assert_eq!(
            FilePath::new("/a/b.md").resolve(root),
            Some(PathBuf::from("/site/a/b.md"))
        );
        assert_eq!(FilePath::new("/").resolve(root), Some(PathBuf::from("/site")));
        assert_eq!(FilePath::new("../etc/passwd").resolve(root), None);
        // Absolute paths clamp at the root.
        assert_eq!(
            FilePath::new("/../etc/passwd").resolve(root),
            Some(PathBuf::from("/site/etc/passwd"))
        );
    }

    #[test]
    fn test_relative_url() {
        assert_eq!(relative_url("/index", "/_observablehq/theme-air.css"), "./_observablehq/theme-air.css");
        assert_eq!(relative_url("/a/b", "/_import/style.css"), "../_import/style.css");
        assert_eq!(relative_url("/a/b", "/a/c.css"), "./c.css");
        assert_eq!(relative_url("/a/", "/a/c.css"), "./c.css");
        assert_eq!(relative_url("/a/b", "https://cdn.example/x.css"), "https://cdn.example/x.css");
    }
}
