//! Live-reload message protocol.
//!
//! JSON text frames over the preview socket.
//!
//! # Client → server
//!
//! - `hello`: the page the client shows and the hash it was rendered with
//!
//! # Server → client
//!
//! - `reload`: full page reload (client is stale)
//! - `update`: cell-level diff between two revisions
//! - `add-stylesheet` / `remove-stylesheet`: `<link>` changes
//! - `refresh`: re-run cells whose attached files changed

use serde::{Deserialize, Serialize};

use super::session::SessionError;
use crate::compiler::MarkdownDiff;
use crate::core::UrlPath;

/// Message sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Reload,

    Update {
        diff: MarkdownDiff,
        #[serde(rename = "previousHash")]
        previous_hash: String,
        #[serde(rename = "updatedHash")]
        updated_hash: String,
    },

    AddStylesheet {
        href: String,
    },

    RemoveStylesheet {
        href: String,
    },

    Refresh {
        #[serde(rename = "cellIds")]
        cell_ids: Vec<String>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

/// Message received from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Hello { path: UrlPath, hash: String },
}

/// Parse an inbound frame.
///
/// Text that is not JSON, or a malformed `hello`, is a protocol error.
/// Valid JSON of any other type yields `None`.
pub fn parse_client(text: &str) -> Result<Option<ClientMessage>, SessionError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SessionError::Protocol(format!("invalid frame: {e}")))?;

    match value.get("type").and_then(serde_json::Value::as_str) {
        Some("hello") => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| SessionError::Protocol(format!("invalid hello: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(ServerMessage::Reload.to_json(), r#"{"type":"reload"}"#);

        let msg = ServerMessage::AddStylesheet { href: "./a.css".into() };
        assert_eq!(msg.to_json(), r#"{"type":"add-stylesheet","href":"./a.css"}"#);

        let msg = ServerMessage::Refresh {
            cell_ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(msg.to_json(), r#"{"type":"refresh","cellIds":["a","b"]}"#);

        let msg = ServerMessage::Update {
            diff: MarkdownDiff::default(),
            previous_hash: "1".into(),
            updated_hash: "2".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "update");
        assert_eq!(value["previousHash"], "1");
        assert_eq!(value["updatedHash"], "2");
        assert_eq!(value["diff"], json!({"removed": [], "added": [], "html": null}));
    }

    #[test]
    fn test_parse_client() {
        assert_eq!(
            parse_client(r#"{"type":"hello","path":"/a","hash":"h"}"#).unwrap(),
            Some(ClientMessage::Hello {
                path: UrlPath::new("/a"),
                hash: "h".into()
            })
        );
        assert_eq!(parse_client(r#"{"type":"ping"}"#).unwrap(), None);
        assert_eq!(parse_client(r#"[1, 2]"#).unwrap(), None);
        assert!(parse_client("not json").is_err());
        assert!(parse_client(r#"{"type":"hello","path":3}"#).is_err());
    }
}
