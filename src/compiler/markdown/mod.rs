//! Markdown pages: front matter, HTML, and executable cells.
//!
//! Fenced code blocks whose info string starts with `js` become cells; each
//! one renders as an empty placeholder `<div id="cell-…">` that the client
//! fills in. `js echo` additionally shows the source.
//!
//! ```text
//! +++
//! title = "Cars"
//! theme = "dark"
//! +++
//!
//! # Cars
//!
//! ```js
//! const cars = FileAttachment("cars.csv").csv({typed: true});
//! ```
//! ```

pub mod cells;

use std::path::Path;

use anyhow::{Context, Result};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;
use serde::Deserialize;

pub use cells::{Cell, FileRef, ImportRef};

use crate::compiler::imports::ImportResolver;
use crate::config::style::{PageStyle, ThemeSpec};
use crate::core::{FilePath, url_to_file};
use crate::utils::hash;

/// Page front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub style: Option<PageStyle>,
    pub theme: Option<ThemeSpec>,
}

/// Everything the preview needs to know about one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// Digest of the source and every local module it imports.
    pub hash: String,
    pub title: Option<String>,
    pub data: FrontMatter,
    pub cells: Vec<Cell>,
    /// Rendered body, without front matter. Empty for an empty page.
    pub html: String,
}

impl ParseResult {
    /// Union of every cell's free identifiers, sorted.
    pub fn inputs(&self) -> Vec<&str> {
        let mut inputs: Vec<&str> = self
            .cells
            .iter()
            .flat_map(|c| c.inputs.iter().map(String::as_str))
            .collect();
        inputs.sort_unstable();
        inputs.dedup();
        inputs
    }
}

/// Read and parse the page at `path` (root-relative, including `.md`).
///
/// A missing file surfaces as an `io::ErrorKind::NotFound` in the chain.
pub fn parse_markdown(root: &Path, path: &FilePath) -> Result<ParseResult> {
    let file = path
        .resolve(root)
        .with_context(|| format!("Invalid path: {path}"))?;
    let source =
        std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    parse_source(&source, root, path)
}

/// Parse page source already in memory.
pub fn parse_source(source: &str, root: &Path, path: &FilePath) -> Result<ParseResult> {
    let (data, body) = match extract_frontmatter(source)? {
        Some((data, body)) => (data, body),
        None => (FrontMatter::default(), source),
    };

    let resolver = ImportResolver::new(root);
    let mut cells: Vec<Cell> = Vec::new();
    let mut ids: FxHashMap<String, usize> = FxHashMap::default();
    let mut heading: Option<String> = None;
    let mut in_h1 = false;
    let mut cell_source: Option<(String, bool)> = None;
    let mut events: Vec<Event<'_>> = Vec::new();

    for event in Parser::new_ext(body, markdown_options()) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info))) if is_js(info) => {
                cell_source = Some((String::new(), info.split_whitespace().any(|w| w == "echo")));
                events.push(event);
            }
            Event::Text(ref text) if cell_source.is_some() => {
                if let Some((source, _)) = cell_source.as_mut() {
                    source.push_str(text);
                }
                events.push(event);
            }
            Event::End(TagEnd::CodeBlock) if cell_source.is_some() => {
                let Some((source, echo)) = cell_source.take() else {
                    continue;
                };
                if echo {
                    events.push(event);
                } else {
                    // Drop the code block we started buffering.
                    while let Some(e) = events.pop() {
                        if matches!(e, Event::Start(Tag::CodeBlock(_))) {
                            break;
                        }
                    }
                }
                let id = unique_id(&mut ids, hash::short(&source));
                events.push(Event::Html(
                    format!("<div id=\"cell-{id}\" class=\"observablehq observablehq--block\"></div>\n")
                        .into(),
                ));
                cells.push(cells::analyze(id, &source, path, &resolver));
            }
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if heading.is_none() => {
                in_h1 = true;
                heading = Some(String::new());
                events.push(event);
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                in_h1 = false;
                events.push(event);
            }
            Event::Text(ref text) | Event::Code(ref text) if in_h1 => {
                if let Some(heading) = heading.as_mut() {
                    heading.push_str(text);
                }
                events.push(event);
            }
            event => events.push(event),
        }
    }

    let mut html = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut html, events.into_iter());

    let mut hasher = hash::Hasher::new();
    hasher.update(source);
    for import in cells.iter().flat_map(|c| &c.imports) {
        if let Some(file) = url_to_file(&import.name).resolve(root)
            && let Ok(content) = std::fs::read(file)
        {
            hasher.update(&content);
        }
    }

    let title = data
        .title
        .clone()
        .or(heading.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()));

    Ok(ParseResult {
        hash: hasher.finish(),
        title,
        data,
        cells,
        html,
    })
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

fn is_js(info: &str) -> bool {
    info.split_whitespace().next() == Some("js")
}

/// Cell ids are content hashes; repeated cells get `-2`, `-3`, …
fn unique_id(seen: &mut FxHashMap<String, usize>, id: String) -> String {
    let count = seen.entry(id.clone()).or_insert(0);
    *count += 1;
    if *count == 1 { id } else { format!("{id}-{count}") }
}

/// Split off `+++` (TOML) or `---` (simple `key: value`) front matter.
pub fn extract_frontmatter(content: &str) -> Result<Option<(FrontMatter, &str)>> {
    let trimmed = content.trim_start();

    if let Some(rest) = trimmed.strip_prefix("+++")
        && let Some(end) = rest.find("\n+++")
    {
        let data: FrontMatter = toml::from_str(rest[..end].trim())
            .map_err(|e| anyhow::anyhow!("Invalid TOML front matter: {e}"))?;
        let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
        return Ok(Some((data, body)));
    }

    if let Some(rest) = trimmed.strip_prefix("---")
        && let Some(end) = rest.find("\n---")
    {
        let data = parse_yaml_like(&rest[..end]);
        let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
        return Ok(Some((data, body)));
    }

    Ok(None)
}

/// `title: …`, `style: false | path`, `theme: a, b` or `theme: [a, b]`.
fn parse_yaml_like(content: &str) -> FrontMatter {
    let mut data = FrontMatter::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        match key.trim() {
            "title" => data.title = Some(value.to_string()),
            "style" => {
                data.style = Some(match value {
                    "false" | "null" => PageStyle::Enabled(false),
                    "true" => PageStyle::Enabled(true),
                    path => PageStyle::Path(path.to_string()),
                });
            }
            "theme" => {
                let list = value.trim_start_matches('[').trim_end_matches(']');
                data.theme = Some(ThemeSpec::Many(
                    list.split(',')
                        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                        .filter(|t| !t.is_empty())
                        .collect(),
                ));
            }
            _ => {}
        }
    }
    data
}
