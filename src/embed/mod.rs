//! Embedded static resources served under `/_observablehq/`.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `client` - Browser scripts (live-reload client, search, runtime shims)
//! - `theme` - Built-in theme stylesheets
//! - `page` - Preview page shell
//! - `public` - Static files (favicon)
//!
//! # Usage
//!
//! ```ignore
//! use embed::client::{CLIENT_JS, ClientVars};
//!
//! let js = CLIENT_JS.render(&ClientVars { ws_port: 35729 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod client {
    use super::{Template, TemplateVars};

    /// Variables for client.js.
    pub struct ClientVars {
        pub ws_port: u16,
    }

    impl TemplateVars for ClientVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__OBSERVABLE_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Live-reload client with WebSocket port injection.
    pub const CLIENT_JS: Template<ClientVars> = Template::new(include_str!("client/client.js"));

    pub const SEARCH_JS: &str = include_str!("client/search.js");

    /// Re-exports the Observable runtime from the CDN.
    pub const RUNTIME_JS: &str = include_str!("client/runtime.js");

    pub const STDLIB_JS: &str = include_str!("client/stdlib.js");

    /// Modules under `/_observablehq/stdlib/`, by file name.
    pub fn stdlib(name: &str) -> Option<&'static str> {
        match name {
            "inputs.js" => Some(include_str!("client/stdlib/inputs.js")),
            "inputs.css" => Some(include_str!("client/stdlib/inputs.css")),
            _ => None,
        }
    }
}

pub mod theme {
    /// Base rules shared by every theme.
    pub const GLOBAL_CSS: &str = include_str!("theme/global.css");

    /// Variables for a single built-in theme.
    pub fn css(name: &str) -> Option<&'static str> {
        match name {
            "air" => Some(include_str!("theme/air.css")),
            "cotton" => Some(include_str!("theme/cotton.css")),
            "near-midnight" => Some(include_str!("theme/near-midnight.css")),
            "slate" => Some(include_str!("theme/slate.css")),
            _ => None,
        }
    }
}

pub mod page {
    use super::TemplateVars;

    const PAGE_HTML: &str = include_str!("page.html");

    /// Variables for page.html.
    pub struct PageVars<'a> {
        pub title: &'a str,
        /// Relative prefix from the page to the site root (`./`, `../`)
        pub base: &'a str,
        pub head: &'a str,
        pub script: &'a str,
        pub sidebar: &'a str,
        pub main: &'a str,
        pub pager: &'a str,
    }

    impl TemplateVars for PageVars<'_> {
        fn apply(&self, content: &str) -> String {
            // Page content goes in last so placeholders inside it survive.
            content
                .replace("__VERSION__", env!("CARGO_PKG_VERSION"))
                .replace("__TITLE__", self.title)
                .replace("__BASE__", self.base)
                .replace("__HEAD__", self.head)
                .replace("__SCRIPT__", self.script)
                .replace("__SIDEBAR__", self.sidebar)
                .replace("__PAGER__", self.pager)
                .replace("__MAIN__", self.main)
        }
    }

    impl PageVars<'_> {
        pub fn render(&self) -> String {
            self.apply(PAGE_HTML)
        }
    }
}

pub mod public {
    use crate::utils::mime::types;

    /// Static file under `/_observablehq/`, with its MIME type.
    pub fn asset(name: &str) -> Option<(&'static [u8], &'static str)> {
        match name {
            "favicon.svg" => Some((include_bytes!("public/favicon.svg"), types::SVG)),
            _ => None,
        }
    }
}
