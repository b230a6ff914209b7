//! Remote archive sources.
//!
//! An `ArchiveSource` knows two things: which archive names are published
//! and how to copy one archive onto local disk. The HTTP implementation
//! scrapes the agency's directory listing; tests substitute their own.

mod http_client;
mod listing;

pub use http_client::{HttpArchiveSource, USER_AGENT};
pub use listing::parse_archive_listing;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to an archive source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Refusing archive name '{0}': not a plain file name")]
    InvalidName(String),
}

/// Result of listing a remote source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Transport status code of the listing request.
    pub status: u16,
    /// Archive names in page order. Empty unless `status` is 200.
    pub names: Vec<String>,
}

impl Listing {
    /// Check if the listing request returned 200 OK.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A place archives can be listed and downloaded from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Retrieve the archive names currently published.
    async fn list_archives(&self) -> Result<Listing, SourceError>;

    /// Download one archive into `dest_dir` under its own name.
    ///
    /// Returns the transport status code. The file is only written for a
    /// 200 response; `dest_dir` is created if absent.
    async fn fetch_archive(&self, name: &str, dest_dir: &Path) -> Result<u16, SourceError>;
}

/// Reject names that would resolve outside the download directory.
pub(crate) fn validate_archive_name(name: &str) -> Result<(), SourceError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if plain {
        Ok(())
    } else {
        Err(SourceError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_archive_name() {
        assert!(validate_archive_name("RO.zip").is_ok());
        assert!(validate_archive_name("Rondonia 1991.zip").is_ok());
        assert!(validate_archive_name("../etc.zip").is_err());
        assert!(validate_archive_name("a/b.zip").is_err());
        assert!(validate_archive_name("..").is_err());
        assert!(validate_archive_name("").is_err());
    }

    #[test]
    fn test_listing_is_ok() {
        let listing = Listing {
            status: 200,
            names: vec![],
        };
        assert!(listing.is_ok());
        assert!(!Listing::default().is_ok());
    }
}
