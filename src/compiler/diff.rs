//! Incremental page updates.
//!
//! A page revision is described by which cells went away, which cells are
//! new, and whether the static HTML around them changed. Cell ids are content
//! hashes, so an edited cell shows up as one removal plus one addition.

use serde::Serialize;

use super::markdown::{Cell, ParseResult};

/// Difference between two renders of the same page, as sent to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkdownDiff {
    /// Ids of cells to undefine.
    pub removed: Vec<String>,
    /// Cells to define, in document order.
    pub added: Vec<Cell>,
    /// Replacement for the page body; `None` when unchanged.
    pub html: Option<String>,
}

impl MarkdownDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.html.is_none()
    }
}

/// Compute the update that turns `prev` into `next` on the client.
pub fn diff_markdown(prev: &ParseResult, next: &ParseResult) -> MarkdownDiff {
    let removed = prev
        .cells
        .iter()
        .filter(|cell| !next.cells.contains(cell))
        .map(|cell| cell.id.clone())
        .collect();

    let added = next
        .cells
        .iter()
        .filter(|cell| !prev.cells.contains(cell))
        .cloned()
        .collect();

    let html = (prev.html != next.html).then(|| next.html.clone());

    MarkdownDiff {
        removed,
        added,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::markdown::parse_source;
    use crate::core::FilePath;
    use std::path::Path;

    fn parse(source: &str) -> ParseResult {
        parse_source(source, Path::new("/nonexistent"), &FilePath::new("/index.md")).unwrap()
    }

    #[test]
    fn test_identical_pages() {
        let page = parse("# A\n\n```js\n1\n```\n");
        assert!(diff_markdown(&page, &page).is_empty());
    }

    #[test]
    fn test_edited_cell() {
        let prev = parse("```js\n1\n```\n\n```js\n2\n```\n");
        let next = parse("```js\n1\n```\n\n```js\n3\n```\n");
        let diff = diff_markdown(&prev, &next);

        assert_eq!(diff.removed, vec![prev.cells[1].id.clone()]);
        assert_eq!(diff.added, vec![next.cells[1].clone()]);
        assert!(diff.html.is_some());
    }

    #[test]
    fn test_text_only_change() {
        let prev = parse("Hello\n\n```js\n1\n```\n");
        let next = parse("Goodbye\n\n```js\n1\n```\n");
        let diff = diff_markdown(&prev, &next);

        assert!(diff.removed.is_empty());
        assert!(diff.added.is_empty());
        assert!(diff.html.as_deref().is_some_and(|h| h.contains("Goodbye")));
    }

    #[test]
    fn test_serialized_shape() {
        let prev = parse("```js\n1\n```\n");
        let next = parse("");
        let json = serde_json::to_value(diff_markdown(&prev, &next)).unwrap();
        assert_eq!(json["removed"][0], prev.cells[0].id.as_str());
        assert_eq!(json["added"], serde_json::json!([]));
        assert_eq!(json["html"], "");
    }
}
