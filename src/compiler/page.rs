//! Full preview page rendering.
//!
//! ```text
//! parse_markdown ─► ParseResult ─┬─► stylesheets ─► <head>
//!                                ├─► cells ───────► <script>
//!                                ├─► html ────────► <main>
//! config.pages ─► sidebar, pager ┘
//! ```

use std::collections::BTreeSet;
use std::fmt::Write;

use anyhow::Result;

use super::libraries::{implicit_stylesheets, resolve_stylesheet};
use super::markdown::{ParseResult, parse_markdown};
use crate::config::style::merge_style;
use crate::config::{PageEntry, SiteConfig, Style};
use crate::core::{FilePath, UrlPath, relative_url, url_to_file};
use crate::embed::page::PageVars;
use crate::log;
use crate::page::{PageLink, find_link};
use crate::utils::html::{escape, escape_script};

/// A rendered page and the parse it came from.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub parse: ParseResult,
}

/// Render the page served at `url` from the source file `source`.
///
/// `url` is the page path without extension (`/a/index`, `/404`).
pub fn render_preview(config: &SiteConfig, url: &UrlPath, source: &FilePath) -> Result<RenderedPage> {
    let parse = parse_markdown(config.root(), source)?;
    let path = url.as_str();
    let base = relative_url(path, "/");

    let mut head = String::new();
    for href in page_stylesheets(config, path, &parse) {
        let _ = writeln!(
            head,
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\" crossorigin>",
            escape(&href)
        );
    }

    let title = match (parse.title.as_deref(), config.title()) {
        (Some(page), Some(site)) if page != site => format!("{page} | {site}"),
        (Some(page), _) => page.to_string(),
        (None, Some(site)) => site.to_string(),
        (None, None) => String::new(),
    };

    let html = PageVars {
        title: &escape(&title),
        base: &base,
        head: &head,
        script: &render_script(&base, &parse),
        sidebar: &render_sidebar(config, path),
        main: &parse.html,
        pager: &render_pager(config, url),
    }
    .render();

    Ok(RenderedPage { html, parse })
}

/// Stylesheet hrefs of a page, relative to `path`.
///
/// The page style (front matter merged with the site default) plus whatever
/// the cells' free identifiers imply.
pub fn page_stylesheets(config: &SiteConfig, path: &str, parse: &ParseResult) -> BTreeSet<String> {
    let mut specifiers: BTreeSet<String> = implicit_stylesheets(parse.inputs())
        .into_iter()
        .map(str::to_string)
        .collect();
    if let Some(style) = preview_stylesheet(config, path, parse) {
        specifiers.insert(style);
    }
    specifiers
        .iter()
        .map(|specifier| resolve_stylesheet(path, specifier))
        .collect()
}

fn preview_stylesheet(config: &SiteConfig, path: &str, parse: &ParseResult) -> Option<String> {
    let file = url_to_file(&UrlPath::new(path));
    let style = match merge_style(
        &file,
        parse.data.style.as_ref(),
        parse.data.theme.as_ref(),
        config.default_style(),
    ) {
        Ok(style) => style,
        Err(e) => {
            log!("error"; "{e}");
            return Some(relative_url(path, "/_observablehq/theme-.css"));
        }
    };
    match style? {
        Style::Path(file) => Some(relative_url(path, &format!("/_import{file}"))),
        Style::Theme(themes) => Some(relative_url(
            path,
            &format!("/_observablehq/theme-{}.css", themes.join(",")),
        )),
    }
}

fn render_script(base: &str, parse: &ParseResult) -> String {
    let mut script = format!("import {{define, open}} from \"{base}_observablehq/client.js\";\n");
    for cell in &parse.cells {
        let inputs = serde_json::to_string(&cell.inputs).unwrap_or_else(|_| "[]".into());
        let outputs = serde_json::to_string(&cell.outputs).unwrap_or_else(|_| "[]".into());
        let _ = writeln!(
            script,
            "\ndefine({{id: \"{}\", inputs: {inputs}, outputs: {outputs}, body: {}}});",
            cell.id,
            escape_script(&cell.body)
        );
    }
    let _ = write!(
        script,
        "\nopen({{hash: \"{}\", eval: (body) => (0, eval)(body)}});",
        parse.hash
    );
    script
}

fn render_sidebar(config: &SiteConfig, path: &str) -> String {
    let title = config.title().unwrap_or("Home");
    let mut html = String::from("<nav id=\"observablehq-sidebar\">\n<ol>\n");
    let _ = writeln!(
        html,
        "<li class=\"observablehq-link\"><a href=\"{}\">{}</a></li>",
        escape(&page_href(path, "/index")),
        escape(title)
    );
    html.push_str("</ol>\n");
    let _ = writeln!(
        html,
        "<div id=\"observablehq-search\"><input type=\"search\" placeholder=\"Search\"></div>\n\
         <ol id=\"observablehq-search-results\"></ol>\n\
         <script type=\"module\" src=\"{}_observablehq/search.js\"></script>",
        relative_url(path, "/")
    );
    html.push_str("<ol>\n");
    render_entries(&mut html, &config.pages, path);
    html.push_str("</ol>\n</nav>\n");
    html
}

fn render_entries(html: &mut String, entries: &[PageEntry], path: &str) {
    for entry in entries {
        match entry {
            PageEntry::Page(page) => {
                let active = if page.path.as_str() == path {
                    " observablehq-link-active"
                } else {
                    ""
                };
                let _ = writeln!(
                    html,
                    "<li class=\"observablehq-link{active}\"><a href=\"{}\">{}</a></li>",
                    escape(&page_href(path, page.path.as_str())),
                    escape(&page.name)
                );
            }
            PageEntry::Section { name, pages, open } => {
                let open = if *open { " open" } else { "" };
                let _ = writeln!(
                    html,
                    "<details{open}>\n<summary>{}</summary>\n<ol>",
                    escape(name)
                );
                render_entries(html, pages, path);
                html.push_str("</ol>\n</details>\n");
            }
        }
    }
}

fn render_pager(config: &SiteConfig, url: &UrlPath) -> String {
    let Some(link) = find_link(url, config) else {
        return String::new();
    };
    let path = url.as_str();
    let mut html = String::from("<nav>");
    if let PageLink::Middle { prev, .. } | PageLink::Last { prev } = &link {
        let _ = write!(
            html,
            "<a rel=\"prev\" href=\"{}\"><span>{}</span></a>",
            escape(&page_href(path, prev.path.as_str())),
            escape(&prev.name)
        );
    }
    if let Some(next) = link.next() {
        let _ = write!(
            html,
            "<a rel=\"next\" href=\"{}\"><span>{}</span></a>",
            escape(&page_href(path, next.path.as_str())),
            escape(&next.name)
        );
    }
    html.push_str("</nav>\n");
    html
}

/// Relative link to a page, with `/x/index` shown as `/x/`.
fn page_href(from: &str, target: &str) -> String {
    match target.strip_suffix("index") {
        Some(dir) if dir.ends_with('/') => relative_url(from, dir),
        _ => relative_url(from, target),
    }
}
