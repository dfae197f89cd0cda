//! Stylesheet bundling with lightningcss.
//!
//! - `bundle_themes`: global rules plus the named built-in themes
//! - `bundle_file`: a user stylesheet with its `@import`s inlined

use std::path::Path;

use anyhow::{Result, anyhow};
use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use crate::config::style::{is_dark, is_theme};
use crate::embed::theme;

/// Bundle `theme-<names>.css`.
///
/// Dark themes are wrapped in a `prefers-color-scheme` query when a light
/// theme is present too, so the page follows the system setting.
pub fn bundle_themes(names: &[String]) -> Result<String> {
    let has_light = names.iter().any(|n| !is_dark(n));
    let mut source = String::from(theme::GLOBAL_CSS);

    for name in names {
        if !is_theme(name) {
            return Err(anyhow!("Unknown theme: {name}"));
        }
        let Some(css) = theme::css(name) else {
            continue;
        };
        source.push('\n');
        if has_light && is_dark(name) {
            source.push_str("@media (prefers-color-scheme: dark) {\n");
            source.push_str(css);
            source.push_str("}\n");
        } else {
            source.push_str(css);
        }
    }

    let stylesheet = StyleSheet::parse(&source, ParserOptions::default())
        .map_err(|e| anyhow!("Failed to parse theme CSS: {e}"))?;
    let output = stylesheet
        .to_css(PrinterOptions::default())
        .map_err(|e| anyhow!("Failed to print theme CSS: {e}"))?;
    Ok(output.code)
}

/// Bundle the stylesheet at `path`, inlining local `@import`s.
///
/// A missing file surfaces as `io::ErrorKind::NotFound`.
pub fn bundle_file(path: &Path) -> Result<String> {
    // Probe first so absence is reported as an io error, not a bundler error.
    std::fs::metadata(path)?;

    let fs = FileProvider::new();
    let mut bundler = Bundler::new(&fs, None, ParserOptions::default());
    let stylesheet = bundler
        .bundle(path)
        .map_err(|e| anyhow!("Failed to bundle {}: {e}", path.display()))?;
    let output = stylesheet
        .to_css(PrinterOptions::default())
        .map_err(|e| anyhow!("Failed to print {}: {e}", path.display()))?;
    Ok(output.code)
}
