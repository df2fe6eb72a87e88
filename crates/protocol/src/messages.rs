//! JSON response shapes for the listing endpoint.
//!
//! Field names follow the contract the original web client depends on
//! (`isFolder`, `modified` as ISO-8601). Timestamps serialize through
//! `chrono` in RFC 3339 form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a serialized directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not a path).
    pub name: String,
    /// Whether the entry is a directory.
    #[serde(rename = "isFolder")]
    pub is_folder: bool,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// Last modification time, ISO-8601.
    pub modified: DateTime<Utc>,
    /// Whether the serving process can read the entry.
    pub readable: bool,
    /// Whether the serving process can write the entry. Always reported,
    /// even though the service itself is read-only.
    pub writable: bool,
}

/// Successful listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingResponse {
    /// Always `true`; the failure shape is [`ErrorResponse`].
    pub success: bool,
    /// Display path of the listed directory (virtual, prefix included).
    pub path: String,
    /// Entries, in the contract sort order (directories first, then
    /// case-insensitive by name).
    pub files: Vec<FileEntry>,
    /// Number of entries.
    pub count: usize,
}

impl ListingResponse {
    /// Build a success response from a display path and entries.
    pub fn new(path: impl Into<String>, files: Vec<FileEntry>) -> Self {
        let count = files.len();
        Self {
            success: true,
            path: path.into(),
            files,
            count,
        }
    }
}

/// Failure response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Generic error message; never carries internal distinctions.
    pub error: String,
}

/// The complete set of externally visible failures.
///
/// This is deliberately much coarser than the daemon's internal error
/// enums: "path outside root", "path not found" and "path not readable"
/// all surface as [`PublicError::NotFound`], and every authentication
/// failure surfaces as [`PublicError::InvalidCredentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublicError {
    /// Login failed (wrong credentials, unknown user, or no backend
    /// reachable - indistinguishable by design).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A browse was attempted without an authenticated identity.
    #[error("authentication required")]
    Unauthenticated,

    /// The requested path cannot be served. Covers not-found,
    /// outside-root and not-readable.
    #[error("path not found")]
    NotFound,

    /// Enumeration failed after validation succeeded; retryable.
    #[error("internal error")]
    Internal,
}

impl PublicError {
    /// HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::Unauthenticated => 401,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }

    /// The serializable failure body.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry(name: &str, is_folder: bool) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            is_folder,
            size: if is_folder { 0 } else { 10 },
            modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            readable: true,
            writable: false,
        }
    }

    #[test]
    fn test_file_entry_json_field_names() {
        let entry = sample_entry("Zebra.txt", false);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["name"], "Zebra.txt");
        assert_eq!(json["isFolder"], false);
        assert_eq!(json["size"], 10);
        // ISO-8601 / RFC 3339 timestamp
        assert_eq!(json["modified"], "2024-01-01T00:00:00Z");
        assert_eq!(json["readable"], true);
        assert_eq!(json["writable"], false);
    }

    #[test]
    fn test_listing_response_counts_entries() {
        let resp = ListingResponse::new(
            "/Web",
            vec![sample_entry("apple", true), sample_entry("Zebra.txt", false)],
        );
        assert!(resp.success);
        assert_eq!(resp.count, 2);
        assert_eq!(resp.path, "/Web");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["files"][0]["name"], "apple");
    }

    #[test]
    fn test_listing_response_roundtrip() {
        let resp = ListingResponse::new("/Web/docs", vec![sample_entry("a", false)]);
        let json = serde_json::to_string(&resp).unwrap();
        let restored: ListingResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, resp);
    }

    #[test]
    fn test_public_error_statuses() {
        assert_eq!(PublicError::InvalidCredentials.status(), 401);
        assert_eq!(PublicError::Unauthenticated.status(), 401);
        assert_eq!(PublicError::NotFound.status(), 404);
        assert_eq!(PublicError::Internal.status(), 500);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = PublicError::NotFound.to_response();
        assert!(!resp.success);
        assert_eq!(resp.error, "path not found");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "path not found");
    }

    #[test]
    fn test_not_found_message_reveals_nothing() {
        // Outside-root and not-found must serialize identically; both map
        // to the same variant, so one assertion covers the contract.
        let resp = PublicError::NotFound.to_response();
        assert!(!resp.error.contains("root"));
        assert!(!resp.error.contains("outside"));
    }
}
