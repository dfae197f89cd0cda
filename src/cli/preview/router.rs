//! Request routing: URL → response.
//!
//! Resolution order, first match wins:
//!
//! 1. `/_observablehq/…`: client scripts, stdlib, search index, themes, public assets
//! 2. `/_import/…`: local JS modules (specifiers rewritten) and stylesheets (bundled)
//! 3. `/_file/…`: static files, falling back to data loaders
//! 4. anything else: a page, after the redirect policy

use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::Context;
use regex::Regex;

use super::error::ServeError;
use super::response::{Method, PreviewRequest, PreviewResponse, end, plain, redirect, static_file};
use crate::compiler::imports::{ImportResolver, rewrite_module};
use crate::compiler::loader::Loader;
use crate::compiler::render_preview;
use crate::compiler::search::search_index;
use crate::compiler::styles::{bundle_file, bundle_themes};
use crate::config::SiteConfig;
use crate::core::{FilePath, RequestTarget, UrlPath, url_to_file};
use crate::embed::client::{self, CLIENT_JS, ClientVars};
use crate::embed::public;
use crate::log;
use crate::utils::mime::types;

static THEME_CSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/_observablehq/theme-([\w-]+(?:,[\w-]+)*)?\.css$").expect("valid theme regex")
});

type Routed = Result<PreviewResponse, ServeError>;

/// Stateless request handler shared by the worker pool.
#[derive(Debug, Clone)]
pub struct Router {
    config: Arc<SiteConfig>,
    ws_port: u16,
}

impl Router {
    pub fn new(config: Arc<SiteConfig>, ws_port: u16) -> Self {
        Self { config, ws_port }
    }

    /// Resolve `request`. Never fails: errors become 404/500 responses.
    pub fn handle(&self, request: &PreviewRequest) -> PreviewResponse {
        self.route(request).unwrap_or_else(|e| self.error(request, e))
    }

    fn route(&self, request: &PreviewRequest) -> Routed {
        let target = RequestTarget::parse(&request.url);
        let pathname = target.path.as_str();

        if let Some(name) = pathname.strip_prefix("/_observablehq/") {
            return self.internal(request, pathname, name);
        }
        if pathname.starts_with("/_import/") {
            return self.import(request, &target.path);
        }
        if pathname.starts_with("/_file/")
            && let Some(path) = target.path.strip_prefix("/_file")
        {
            return self.file(request, &path);
        }
        self.page(request, &target)
    }

    /// Framework-internal assets.
    fn internal(&self, request: &PreviewRequest, pathname: &str, name: &str) -> Routed {
        if name == "runtime.js" {
            return Ok(end(request, client::RUNTIME_JS, types::JAVASCRIPT));
        }
        if name.starts_with("stdlib.js") {
            return Ok(end(request, client::STDLIB_JS, types::JAVASCRIPT));
        }
        if let Some(module) = name.strip_prefix("stdlib/") {
            let mime = if module.ends_with(".js") {
                types::JAVASCRIPT
            } else if module.ends_with(".css") {
                types::CSS
            } else {
                return Err(ServeError::NotFound(pathname.to_string()));
            };
            let content = client::stdlib(module).ok_or_else(|| ServeError::NotFound(pathname.to_string()))?;
            return Ok(end(request, content, mime));
        }
        match name {
            "client.js" => {
                let js = CLIENT_JS.render(&ClientVars { ws_port: self.ws_port });
                return Ok(end(request, js, types::JAVASCRIPT));
            }
            "search.js" => return Ok(end(request, client::SEARCH_JS, types::JAVASCRIPT)),
            "minisearch.json" => return Ok(end(request, search_index(&self.config)?, types::JSON)),
            _ => {}
        }
        if let Some(caps) = THEME_CSS.captures(pathname) {
            let themes: Vec<String> = caps
                .get(1)
                .map(|m| m.as_str().split(',').map(str::to_string).collect())
                .unwrap_or_default();
            return Ok(end(request, bundle_themes(&themes)?, types::CSS));
        }
        match public::asset(name) {
            Some((content, mime)) => Ok(end(request, content, mime)),
            None => Err(ServeError::NotFound(pathname.to_string())),
        }
    }

    /// `/_import/<path>`: bundled CSS or rewritten JS from the source root.
    fn import(&self, request: &PreviewRequest, pathname: &UrlPath) -> Routed {
        let root = self.config.root();
        let not_found = || ServeError::NotFound(pathname.to_string());
        let path = pathname
            .strip_prefix("/_import")
            .map(|p| url_to_file(&p))
            .ok_or_else(not_found)?;
        let file = path.resolve(root).ok_or_else(not_found)?;

        if pathname.ends_with(".css") {
            let css = bundle_file(&file).map_err(|e| ServeError::absent_or(e, pathname.as_str()))?;
            return Ok(end(request, css, types::CSS));
        }
        if pathname.ends_with(".js") {
            let input = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))
                .map_err(|e| ServeError::absent_or(e, pathname.as_str()))?;
            let output = rewrite_module(&input, &path, &ImportResolver::new(root));
            return Ok(end(request, output, types::JAVASCRIPT));
        }
        Err(not_found())
    }

    /// `/_file/<path>`: the file itself, or the output of its data loader.
    fn file(&self, request: &PreviewRequest, url: &UrlPath) -> Routed {
        let root = self.config.root();
        let not_found = || ServeError::NotFound(format!("/_file{url}"));
        let path = url_to_file(&url.normalize());
        let file = path.resolve(root).ok_or_else(not_found)?;

        if stat(&file)?.is_some_and(|m| m.is_file()) {
            return Ok(static_file(request, &file)?);
        }

        let loader = Loader::find(root, &path).ok_or_else(not_found)?;
        let output = loader
            .load(root, &self.config.cache_dir())
            .map_err(|e| ServeError::absent_or(e, format!("/_file{url}")))?;
        Ok(static_file(request, &output)?)
    }

    /// Pages, after tidying the URL.
    fn page(&self, request: &PreviewRequest, target: &RequestTarget) -> Routed {
        let root = self.config.root();
        let search = &target.search;
        let mut pathname = target.path.normalize();
        if pathname.starts_with("..") {
            return Err(ServeError::InvalidPath(pathname.to_string()));
        }
        let mut path = url_to_file(&pathname);
        let invalid = || ServeError::InvalidPath(target.path.to_string());

        // `/a/index` → `/a/`. Runs before the implicit `/index` below.
        if path.basename(Some(".html")) == "index" {
            let index = path.dirname().join("index.md").resolve(root).ok_or_else(invalid)?;
            let location = match stat(&index)? {
                Some(_) => pathname.dirname().join("/"),
                None => pathname.dirname(),
            };
            return Ok(redirect(format!("{location}{search}")));
        }

        let dir = path.resolve(root).ok_or_else(invalid)?;
        let is_index_dir = stat(&dir)?.is_some_and(|m| m.is_dir())
            && stat(&dir.join("index.md"))?.is_some_and(|m| m.is_file());
        if is_index_dir {
            if !pathname.ends_with("/") {
                return Ok(redirect(format!("{pathname}/{search}")));
            }
            pathname = pathname.join("index");
            path = path.join("index");
        }

        if path.extname() == ".html" {
            let location = pathname.dirname().join(pathname.basename(Some(".html")));
            return Ok(redirect(format!("{location}{search}")));
        }

        let page = render_preview(&self.config, &pathname, &path.with_suffix(".md"))
            .map_err(|e| ServeError::absent_or(e, "Not found"))?;
        Ok(end(request, page.html, types::HTML))
    }

    fn error(&self, request: &PreviewRequest, err: ServeError) -> PreviewResponse {
        let status = err.status();
        if status == 404 {
            crate::debug!("preview"; "{err}");
        } else {
            log!("error"; "{:#}", anyhow::Error::from(err));
        }

        if request.method == Method::Get && status == 404 {
            let custom = render_preview(&self.config, &UrlPath::new("/404"), &FilePath::new("/404.md"));
            if let Ok(page) = custom {
                return end(request, page.html, types::HTML).with_status(404);
            }
            return plain(404, "Not Found");
        }
        plain(status, if status == 404 { "Not Found" } else { "Internal Server Error" })
    }
}

/// Metadata, or `None` when the path does not exist.
fn stat(path: &Path) -> Result<Option<fs::Metadata>, ServeError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        // `/a.md/x` reports NotADirectory on unix.
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => Ok(None),
        Err(e) => Err(e.into()),
    }
}
