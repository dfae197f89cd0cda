//! Core types - pure abstractions shared across the codebase.

pub mod path;
mod state;

pub use path::{FilePath, RequestTarget, UrlPath, file_to_url, relative_url, url_to_file};
pub use state::{is_shutdown, register_server, setup_shutdown_handler};

/// Whether `err` is, or was caused by, a missing file.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_is_not_found() {
        let missing: anyhow::Result<()> =
            Err(std::io::Error::from(std::io::ErrorKind::NotFound)).context("reading page");
        assert!(is_not_found(&missing.unwrap_err()));

        let denied = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!is_not_found(&denied));
        assert!(!is_not_found(&anyhow::anyhow!("Not found")));
    }
}
