//! Search index served as `/_observablehq/minisearch.json`.

use anyhow::Result;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::Serialize;

use super::markdown::extract_frontmatter;
use crate::config::SiteConfig;
use crate::core::{FilePath, url_to_file};
use crate::page::walk_pages;

#[derive(Debug, Serialize)]
struct SearchIndex {
    documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
struct Document {
    /// Page URL (`/`, `/intro`)
    id: String,
    title: String,
    text: String,
}

/// JSON index of every page in the navigation that exists on disk.
pub fn search_index(config: &SiteConfig) -> Result<String> {
    let mut documents = Vec::new();

    for page in walk_pages(&config.pages, config.title()) {
        let path = page.path.normalize();
        let file: FilePath = url_to_file(&path).with_suffix(".md");
        let Some(file) = file.resolve(config.root()) else {
            continue;
        };
        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let id = match path.as_str().strip_suffix("/index") {
            Some(dir) => format!("{dir}/"),
            None => path.to_string(),
        };
        documents.push(Document {
            id,
            title: page.name,
            text: plain_text(&source)?,
        });
    }

    Ok(serde_json::to_string(&SearchIndex { documents })?)
}

/// Visible text of a page: no front matter, no code blocks.
fn plain_text(source: &str) -> Result<String> {
    let body = match extract_frontmatter(source)? {
        Some((_, body)) => body,
        None => source,
    };

    let mut text = String::new();
    let mut in_code = false;
    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Text(t) | Event::Code(t) if !in_code => {
                if !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
                text.push_str(t.trim());
            }
            _ => {}
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_index_documents() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.md"), "# Welcome\n\nStart here.").unwrap();
        fs::write(
            dir.path().join("cars.md"),
            "+++\ntitle = \"Cars\"\n+++\n# Cars\n\n```js\nsecret\n```\n\nFast *cars*.",
        )
        .unwrap();
        let config = test_config(
            dir.path(),
            "title = \"Site\"\n[[pages]]\nname = \"Cars\"\npath = \"/cars\"\n[[pages]]\nname = \"Gone\"\npath = \"/gone\"\n",
        );

        let json: serde_json::Value = serde_json::from_str(&search_index(&config).unwrap()).unwrap();
        let docs = json["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["id"], "/");
        assert_eq!(docs[0]["title"], "Site");
        assert_eq!(docs[1]["id"], "/cars");
        let text = docs[1]["text"].as_str().unwrap();
        assert!(text.contains("Fast"));
        assert!(text.contains("cars"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("title ="));
    }
}
