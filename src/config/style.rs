//! Page styles: a custom stylesheet or a list of built-in themes.
//!
//! # Example
//!
//! ```toml
//! theme = ["air", "near-midnight"]   # site default
//! ```
//!
//! A page may override the default in its front matter with `style = "x.css"`,
//! `theme = "slate"`, or disable styling with `style = false`.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::FilePath;

/// Light themes, in the order they are emitted.
pub const LIGHT_THEMES: &[&str] = &["air", "cotton"];
/// Dark themes, applied under `prefers-color-scheme: dark` when paired.
pub const DARK_THEMES: &[&str] = &["near-midnight", "slate"];
/// Theme used when neither config nor page names one.
pub const DEFAULT_THEME: &[&str] = &["air", "near-midnight"];

/// Resolved style of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Style {
    /// Root-relative stylesheet, served through `/_import/`.
    Path(FilePath),
    /// Built-in themes, served as `/_observablehq/theme-<names>.css`.
    Theme(Vec<String>),
}

/// `theme = "dark"` or `theme = ["air", "slate"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeSpec {
    One(String),
    Many(Vec<String>),
}

/// Front matter `style`: a path, or `false` to disable styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageStyle {
    Enabled(bool),
    Path(String),
}

impl ThemeSpec {
    fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => name.split(',').map(str::trim).collect(),
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Expand aliases, validate names and drop duplicates.
pub fn normalize_theme(spec: &ThemeSpec) -> Result<Vec<String>, ConfigError> {
    let mut themes: Vec<String> = Vec::new();
    for name in spec.names() {
        let expanded: Vec<&str> = match name {
            "" => Vec::new(),
            "default" => DEFAULT_THEME.to_vec(),
            "light" => vec!["air"],
            "dark" => vec!["near-midnight"],
            other if is_theme(other) => vec![other],
            other => {
                return Err(ConfigError::Validation(format!("unknown theme: {other}")));
            }
        };
        for theme in expanded {
            if !themes.iter().any(|t| t == theme) {
                themes.push(theme.to_string());
            }
        }
    }
    Ok(themes)
}

pub fn is_theme(name: &str) -> bool {
    LIGHT_THEMES.contains(&name) || DARK_THEMES.contains(&name)
}

pub fn is_dark(name: &str) -> bool {
    DARK_THEMES.contains(&name)
}

/// Combine a page's front-matter style with the site default.
///
/// - neither given: the default
/// - `style = false`: no stylesheet
/// - `style = "x.css"`: relative to the page's directory
/// - `theme = ...`: those themes
pub fn merge_style(
    path: &FilePath,
    style: Option<&PageStyle>,
    theme: Option<&ThemeSpec>,
    default: Option<&Style>,
) -> Result<Option<Style>, ConfigError> {
    match (style, theme) {
        (None | Some(PageStyle::Enabled(true)), None) => Ok(default.cloned()),
        (Some(PageStyle::Enabled(false)), _) => Ok(None),
        (Some(PageStyle::Path(style)), _) => Ok(Some(Style::Path(resolve_style_path(path, style)))),
        (_, Some(theme)) => Ok(Some(Style::Theme(normalize_theme(theme)?))),
    }
}

fn resolve_style_path(page: &FilePath, style: &str) -> FilePath {
    if style.starts_with('/') {
        FilePath::new(style).normalize()
    } else {
        page.dirname().join(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> FilePath {
        FilePath::new("/docs/intro.md")
    }

    #[test]
    fn test_normalize_theme_aliases_and_dedupe() {
        let themes = normalize_theme(&ThemeSpec::One("default, air".into())).unwrap();
        assert_eq!(themes, vec!["air", "near-midnight"]);

        let themes =
            normalize_theme(&ThemeSpec::Many(vec!["dark".into(), "slate".into()])).unwrap();
        assert_eq!(themes, vec!["near-midnight", "slate"]);
    }

    #[test]
    fn test_normalize_theme_plain_names() {
        let themes = normalize_theme(&ThemeSpec::One("cotton, slate, cotton".into())).unwrap();
        assert_eq!(themes, vec!["cotton", "slate"]);

        let themes = normalize_theme(&ThemeSpec::One("light,".into())).unwrap();
        assert_eq!(themes, vec!["air"]);
    }

    #[test]
    fn test_normalize_theme_rejects_unknown() {
        let err = normalize_theme(&ThemeSpec::One("neon".into())).unwrap_err();
        assert!(err.to_string().contains("neon"));
    }

    #[test]
    fn test_merge_style_default() {
        let default = Style::Theme(vec!["air".into()]);
        assert_eq!(
            merge_style(&page(), None, None, Some(&default)).unwrap(),
            Some(default.clone())
        );
        assert_eq!(
            merge_style(&page(), Some(&PageStyle::Enabled(true)), None, Some(&default)).unwrap(),
            Some(default)
        );
    }

    #[test]
    fn test_merge_style_overrides() {
        let default = Style::Theme(vec!["air".into()]);

        assert_eq!(
            merge_style(&page(), Some(&PageStyle::Enabled(false)), None, Some(&default)).unwrap(),
            None
        );
        assert_eq!(
            merge_style(&page(), Some(&PageStyle::Path("custom.css".into())), None, None).unwrap(),
            Some(Style::Path(FilePath::new("/docs/custom.css")))
        );
        assert_eq!(
            merge_style(&page(), Some(&PageStyle::Path("/shared.css".into())), None, None)
                .unwrap(),
            Some(Style::Path(FilePath::new("/shared.css")))
        );
        assert_eq!(
            merge_style(&page(), None, Some(&ThemeSpec::One("slate".into())), Some(&default))
                .unwrap(),
            Some(Style::Theme(vec!["slate".into()]))
        );
    }
}
