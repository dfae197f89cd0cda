//! HTTP responses, independent of the server library.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tiny_http::{Header, StatusCode};

use crate::utils::{hash, mime};

/// Request method, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other,
}

/// The parts of a request the router reads.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub method: Method,
    /// Raw request target (`/a/b?x=1`).
    pub url: String,
    pub if_none_match: Option<String>,
}

impl PreviewRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            if_none_match: None,
        }
    }

    fn is_head(&self) -> bool {
        self.method == Method::Head
    }

    fn matches(&self, etag: &str) -> bool {
        self.if_none_match.as_deref() == Some(etag)
    }
}

/// A complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl PreviewResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Convert for `tiny_http`. Headers with invalid bytes are dropped.
    pub fn into_tiny(self) -> tiny_http::Response<Cursor<Vec<u8>>> {
        let mut response = tiny_http::Response::from_data(self.body).with_status_code(StatusCode(self.status));
        for (key, value) in &self.headers {
            if let Ok(header) = Header::from_bytes(key.as_bytes(), value.as_bytes()) {
                response.add_header(header);
            }
        }
        response
    }
}

/// Serve in-memory content with a content-hash `ETag`.
///
/// Honours `If-None-Match` (304) and `HEAD` (headers only).
pub fn end(request: &PreviewRequest, content: impl Into<Vec<u8>>, mime_type: &str) -> PreviewResponse {
    let body = content.into();
    let etag = hash::etag(&body);
    let date = httpdate::fmt_http_date(SystemTime::now());
    let headers = vec![
        ("Content-Type", format!("{mime_type}; charset=utf-8")),
        ("Date", date.clone()),
        ("Last-Modified", date),
        ("ETag", etag.clone()),
    ];
    finish(request, headers, &etag, body)
}

/// Serve a file from disk with a weak `ETag` from its size and mtime.
pub fn static_file(request: &PreviewRequest, path: &Path) -> Result<PreviewResponse> {
    let meta = fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let etag = hash::weak_etag(meta.len(), modified);
    let headers = vec![
        ("Content-Type", mime::content_type(mime::from_path(path))),
        ("Last-Modified", httpdate::fmt_http_date(modified)),
        ("ETag", etag.clone()),
    ];
    if request.matches(&etag) || request.is_head() {
        return Ok(finish(request, headers, &etag, Vec::new()));
    }
    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(finish(request, headers, &etag, body))
}

fn finish(
    request: &PreviewRequest,
    headers: Vec<(&'static str, String)>,
    etag: &str,
    body: Vec<u8>,
) -> PreviewResponse {
    if request.matches(etag) {
        return PreviewResponse {
            status: 304,
            headers,
            body: Vec::new(),
        };
    }
    PreviewResponse {
        status: 200,
        headers,
        body: if request.is_head() { Vec::new() } else { body },
    }
}

/// 302 to `location`.
pub fn redirect(location: impl Into<String>) -> PreviewResponse {
    PreviewResponse {
        status: 302,
        headers: vec![("Location", location.into())],
        body: Vec::new(),
    }
}

/// Plain-text response with `status`.
pub fn plain(status: u16, message: &str) -> PreviewResponse {
    PreviewResponse {
        status,
        headers: vec![("Content-Type", mime::content_type(mime::types::PLAIN))],
        body: message.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_end_sets_cache_headers() {
        let response = end(&PreviewRequest::get("/x"), "body", mime::types::CSS);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"body");
        assert_eq!(response.header("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(response.header("ETag"), Some(hash::etag("body").as_str()));
        assert_eq!(response.header("Date"), response.header("Last-Modified"));
    }

    #[test]
    fn test_end_not_modified() {
        let mut request = PreviewRequest::get("/x");
        request.if_none_match = Some(hash::etag("body"));
        let response = end(&request, "body", mime::types::CSS);
        assert_eq!(response.status, 304);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_head_has_no_body() {
        let mut request = PreviewRequest::get("/x");
        request.method = Method::Head;
        let response = end(&request, "body", mime::types::HTML);
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert!(response.header("ETag").is_some());
    }

    #[test]
    fn test_static_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let response = static_file(&PreviewRequest::get("/_file/data.csv"), &path).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("text/csv; charset=utf-8"));
        let etag = response.header("ETag").unwrap().to_string();
        assert!(etag.starts_with("W/"));

        let mut request = PreviewRequest::get("/_file/data.csv");
        request.if_none_match = Some(etag);
        assert_eq!(static_file(&request, &path).unwrap().status, 304);
    }

    #[test]
    fn test_redirect() {
        let response = redirect("/a/?x=1");
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("/a/?x=1"));
    }
}
