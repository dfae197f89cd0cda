//! Content hashing using blake3.
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let h = hash::digest("some content"); // -> 64-char hex
//! let id = hash::short("some content"); // -> "a1b2c3d4"
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

/// Hex-encoded blake3 digest.
#[inline]
pub fn digest<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    hex::encode(blake3::hash(data.as_ref()).as_bytes())
}

/// First 8 hex chars of the digest.
#[inline]
pub fn short<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let mut full = digest(data);
    full.truncate(8);
    full
}

/// Strong `ETag` for a response body.
pub fn etag<T: AsRef<[u8]> + ?Sized>(body: &T) -> String {
    format!("\"{}\"", digest(body))
}

/// Weak `ETag` for a file on disk, from its size and modification time.
pub fn weak_etag(size: u64, modified: SystemTime) -> String {
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("W/\"{size:x}-{millis:x}\"")
}

/// Incremental hasher for content built from several parts.
#[derive(Default)]
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<T: AsRef<[u8]> + ?Sized>(&mut self, data: &T) -> &mut Self {
        self.0.update(data.as_ref());
        self
    }

    pub fn finish(&self) -> String {
        hex::encode(self.0.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_digest_stable() {
        assert_eq!(digest("abc"), digest("abc"));
        assert_ne!(digest("abc"), digest("abd"));
        assert_eq!(digest("abc").len(), 64);
        assert_eq!(short("abc"), &digest("abc")[..8]);
    }

    #[test]
    fn test_hasher_matches_digest() {
        let mut hasher = Hasher::new();
        hasher.update("ab").update("c");
        assert_eq!(hasher.finish(), digest("abc"));
    }

    #[test]
    fn test_etags() {
        assert_eq!(etag("x"), format!("\"{}\"", digest("x")));
        let modified = UNIX_EPOCH + Duration::from_millis(0x1f);
        assert_eq!(weak_etag(255, modified), "W/\"ff-1f\"");
    }
}
