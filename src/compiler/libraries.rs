//! Stylesheets implied by the standard library.
//!
//! Some built-in names need a stylesheet as soon as a cell references them,
//! e.g. `Inputs` pulls in `observablehq:stdlib/inputs.css`.

use std::collections::BTreeSet;

use super::imports::npm_url;
use crate::core::relative_url;

/// Free identifier → stylesheet specifier.
const IMPLICIT_STYLESHEETS: &[(&str, &str)] = &[
    ("Inputs", "observablehq:stdlib/inputs.css"),
    ("tex", "npm:katex/dist/katex.min.css"),
    ("maplibregl", "npm:maplibre-gl/dist/maplibre-gl.css"),
];

/// Stylesheet specifiers required by the given free identifiers.
pub fn implicit_stylesheets<'a>(inputs: impl IntoIterator<Item = &'a str>) -> BTreeSet<&'static str> {
    inputs
        .into_iter()
        .filter_map(|input| {
            IMPLICIT_STYLESHEETS
                .iter()
                .find(|(name, _)| *name == input)
                .map(|(_, href)| *href)
        })
        .collect()
}

/// Turn a stylesheet specifier into an href usable from the page at `path`.
///
/// - `observablehq:x` → relative link to `/_observablehq/x`
/// - `npm:x` → CDN URL
/// - anything else unchanged
pub fn resolve_stylesheet(path: &str, specifier: &str) -> String {
    if let Some(name) = specifier.strip_prefix("observablehq:") {
        return relative_url(path, &format!("/_observablehq/{name}"));
    }
    if let Some(name) = specifier.strip_prefix("npm:") {
        return npm_url(name);
    }
    specifier.to_string()
}
