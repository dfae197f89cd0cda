//! MIME type detection utilities.
//!
//! Constants are bare types; [`content_type`] adds the charset for text.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html";
    pub const PLAIN: &str = "text/plain";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "text/javascript";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const MARKDOWN: &str = "text/markdown";
    pub const CSV: &str = "text/csv";
    pub const TSV: &str = "text/tab-separated-values";
    pub const YAML: &str = "text/yaml";

    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const ARROW: &str = "application/vnd.apache.arrow.file";
    pub const PARQUET: &str = "application/vnd.apache.parquet";
    pub const SQLITE: &str = "application/x-sqlite3";
    pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
    pub const ZIP: &str = "application/zip";
    pub const WASM: &str = "application/wasm";
    pub const PDF: &str = "application/pdf";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const MP4: &str = "video/mp4";
    pub const MP3: &str = "audio/mpeg";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
}

/// Guess MIME type from file extension.
pub fn from_path(path: impl AsRef<Path>) -> &'static str {
    from_extension(path.as_ref().extension().and_then(|e| e.to_str()))
}

/// Guess MIME type from file extension string (without the dot).
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext.map(str::to_ascii_lowercase).as_deref() {
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs") => types::JAVASCRIPT,
        Some("json") => types::JSON,
        Some("xml") => types::XML,
        Some("md") => types::MARKDOWN,
        Some("csv") => types::CSV,
        Some("tsv") => types::TSV,
        Some("yaml" | "yml") => types::YAML,
        Some("txt") => types::PLAIN,

        Some("arrow") => types::ARROW,
        Some("parquet") => types::PARQUET,
        Some("db" | "sqlite") => types::SQLITE,
        Some("xlsx") => types::XLSX,
        Some("zip") => types::ZIP,
        Some("wasm") => types::WASM,
        Some("pdf") => types::PDF,

        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("svg") => types::SVG,
        Some("ico") => types::ICO,

        Some("mp4") => types::MP4,
        Some("mp3") => types::MP3,

        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,

        _ => types::OCTET_STREAM,
    }
}

/// Check if the MIME type represents text content.
pub fn is_text(mime: &str) -> bool {
    mime.starts_with("text/") || mime == types::JSON || mime == types::XML || mime == types::SVG
}

/// Full `Content-Type` header value; text types get `charset=utf-8`.
pub fn content_type(mime: &str) -> String {
    if is_text(mime) {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path("index.html"), types::HTML);
        assert_eq!(from_path("style.css"), types::CSS);
        assert_eq!(from_path("app.js"), types::JAVASCRIPT);
        assert_eq!(from_path("data/cars.CSV"), types::CSV);
        assert_eq!(from_path("flights.parquet"), types::PARQUET);
        assert_eq!(from_path("logo.png"), types::PNG);
        assert_eq!(from_path("unknown.xyz"), types::OCTET_STREAM);
        assert_eq!(from_path("Makefile"), types::OCTET_STREAM);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(types::HTML), "text/html; charset=utf-8");
        assert_eq!(content_type(types::JSON), "application/json; charset=utf-8");
        assert_eq!(content_type(types::PNG), "image/png");
    }
}
