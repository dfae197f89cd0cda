//! Site configuration management for `observablehq.config.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error    # ConfigError
//! ├── page     # [[pages]] tree and discovery
//! ├── style    # themes and custom stylesheets
//! └── mod.rs   # SiteConfig (this file)
//! ```
//!
//! # Fields
//!
//! | Field        | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `root`       | Source directory, relative to the config file   |
//! | `title`      | Site title (home page name in the pager)        |
//! | `pages`      | Navigation tree; discovered when omitted        |
//! | `theme`      | Default themes (string or list)                 |
//! | `style`      | Default custom stylesheet (excludes `theme`)    |
//! | `[preview]`  | Development server (hostname, port, open)       |

mod error;
pub mod page;
pub mod style;

pub use error::ConfigError;
pub use page::{Page, PageEntry};
pub use style::{Style, ThemeSpec};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::PreviewArgs;
use crate::core::FilePath;
use crate::log;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "observablehq.config.toml";

/// Default WebSocket port for the live-reload socket.
pub const DEFAULT_WS_PORT: u16 = 35729;

/// First port tried when none is configured.
pub const DEFAULT_PORT: u16 = 3000;

static GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    GENERATION.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `observablehq.config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Source root; relative values resolve against the config directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub pages: Vec<PageEntry>,

    #[serde(default)]
    pub theme: Option<ThemeSpec>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub preview: PreviewConfig,

    /// Resolved from `theme`/`style` during validation
    #[serde(skip)]
    default_style: Option<Style>,

    /// Distinguishes successive loads; keys derived caches
    #[serde(skip, default = "next_generation")]
    generation: u64,
}

/// `[preview]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub hostname: String,
    /// `None` searches for a free port starting at [`DEFAULT_PORT`]
    pub port: Option<u16>,
    pub open: bool,
    pub ws_port: u16,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: None,
            open: false,
            ws_port: DEFAULT_WS_PORT,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("docs")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: default_root(),
            title: None,
            pages: Vec::new(),
            theme: None,
            style: None,
            preview: PreviewConfig::default(),
            default_style: Some(Style::Theme(
                style::DEFAULT_THEME.iter().map(|s| s.to_string()).collect(),
            )),
            generation: next_generation(),
        }
    }
}

impl SiteConfig {
    /// Load configuration for the `preview` command.
    ///
    /// A missing config file yields defaults rooted at the working directory.
    pub fn load(args: &PreviewArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = if args.config.is_absolute() {
            args.config.clone()
        } else {
            cwd.join(&args.config)
        };

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", args.config.display());
            Self::default()
        };

        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.config_path = config_path;
        config.apply_preview_args(args);
        config.finalize(&base)?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Resolve the root, validate, and discover pages when none are listed.
    pub fn finalize(&mut self, base: &Path) -> Result<()> {
        if self.root.is_relative() {
            self.root = base.join(&self.root);
        }
        self.validate()?;

        if self.pages.is_empty() {
            self.pages = page::discover_pages(&self.root)
                .with_context(|| format!("Failed to scan {}", self.root.display()))?;
        }
        Ok(())
    }

    /// CLI flags override file values.
    fn apply_preview_args(&mut self, args: &PreviewArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.root, args.root.as_ref());
        Self::update_option(&mut self.preview.hostname, args.host.as_ref());
        if args.port.is_some() {
            self.preview.port = args.port;
        }
        if args.open {
            self.preview.open = true;
        }
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Check field combinations and resolve the default style.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.default_style = match (&self.style, &self.theme) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "`style` and `theme` are mutually exclusive".into(),
                ));
            }
            (Some(path), None) => Some(Style::Path(FilePath::new(format!("/{path}")).normalize())),
            (None, Some(theme)) => Some(Style::Theme(style::normalize_theme(theme)?)),
            (None, None) => Some(Style::Theme(
                style::DEFAULT_THEME.iter().map(|s| s.to_string()).collect(),
            )),
        };
        Ok(())
    }

    // ========================================================================
    // accessors
    // ========================================================================

    /// Get the source root directory
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Default style applied to pages without their own.
    pub fn default_style(&self) -> Option<&Style> {
        self.default_style.as_ref()
    }

    /// Display title of the site, if configured.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Directory for cached data loader output.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".observablehq").join("cache")
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Build a validated config rooted at `root`.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_config(root: &Path, extra: &str) -> SiteConfig {
    let (mut parsed, ignored) = SiteConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed.root = root.to_path_buf();
    parsed.finalize(root).unwrap();
    parsed
}

// ============================================================================
// tests
// ============================================================================
