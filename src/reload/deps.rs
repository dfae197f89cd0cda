//! Files a page depends on besides its own source.

use std::collections::BTreeSet;

use crate::compiler::ParseResult;
use crate::core::{FilePath, url_to_file};

/// Every attached file and local module referenced by the page's cells.
///
/// Recompute after each reparse; the set changes with the page.
pub fn watch_paths(parse: &ParseResult) -> BTreeSet<FilePath> {
    parse
        .cells
        .iter()
        .flat_map(|cell| {
            let files = cell.files.iter().map(|f| &f.name);
            let imports = cell.imports.iter().map(|i| &i.name);
            files.chain(imports)
        })
        .map(url_to_file)
        .collect()
}
