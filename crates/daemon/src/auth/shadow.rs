//! Credential-store backend over passwd/shadow-format files.
//!
//! Stored hashes are crypt(3)-style adaptive hashes: the hash string
//! encodes its own algorithm identifier and salt, so verification needs
//! no out-of-band algorithm tracking. Comparison happens inside
//! `pwhash` in constant time.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use protocol::{Credentials, RejectReason};

use super::users::UserDatabase;
use super::{BackendResult, IdentityBackend};

/// Syntactically valid SHA-512 setting used to burn a verification when
/// the user is absent, keeping unknown-user and wrong-password timings
/// close.
const DUMMY_HASH: &str =
    "$6$kDDEAedsQpvM3RdT$abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789./abcdefghijklmnopqrst";

/// Identity backend that verifies credentials against local
/// passwd/shadow-format files.
#[derive(Debug, Clone)]
pub struct ShadowBackend {
    users: UserDatabase,
    shadow_path: PathBuf,
}

impl ShadowBackend {
    /// Create a backend over the given account database and shadow file.
    pub fn new<P: AsRef<Path>>(users: UserDatabase, shadow_path: P) -> Self {
        Self {
            users,
            shadow_path: shadow_path.as_ref().to_path_buf(),
        }
    }

    /// Extract the stored hash for `username` from shadow file contents.
    fn stored_hash(contents: &str, username: &str) -> Option<String> {
        contents.lines().find_map(|line| {
            let mut fields = line.splitn(3, ':');
            let name = fields.next()?;
            let hash = fields.next()?;
            (name == username).then(|| hash.to_string())
        })
    }

    /// Whether a stored hash marks the account as disabled or locked.
    fn is_disabled(hash: &str) -> bool {
        hash.is_empty() || hash == "*" || hash.starts_with('!')
    }
}

#[async_trait]
impl IdentityBackend for ShadowBackend {
    fn name(&self) -> &str {
        "shadow"
    }

    async fn try_authenticate(&self, credentials: &Credentials) -> BackendResult {
        let record = match self.users.lookup(&credentials.username) {
            Ok(Some(record)) => Some(record),
            Ok(None) => None,
            Err(e) => {
                return BackendResult::Unavailable(format!(
                    "passwd file {} unreadable: {}",
                    self.users.path().display(),
                    e
                ));
            }
        };

        let shadow = match fs::read_to_string(&self.shadow_path) {
            Ok(contents) => contents,
            Err(e) => {
                return BackendResult::Unavailable(format!(
                    "shadow file {} unreadable: {}",
                    self.shadow_path.display(),
                    e
                ));
            }
        };

        let (record, hash) = match record
            .and_then(|r| Self::stored_hash(&shadow, &credentials.username).map(|h| (r, h)))
        {
            Some(pair) => pair,
            None => {
                // Unknown user: burn a verification so the timing matches
                // the wrong-password case, then reject.
                let _ = pwhash::unix::verify(&credentials.secret, DUMMY_HASH);
                tracing::debug!(username = %credentials.username, "shadow: no such user");
                return BackendResult::Rejected(RejectReason::InvalidCredentials);
            }
        };

        if Self::is_disabled(&hash) {
            tracing::debug!(username = %credentials.username, "shadow: account disabled");
            return BackendResult::Rejected(RejectReason::AccountDisabled);
        }

        if pwhash::unix::verify(&credentials.secret, &hash) {
            BackendResult::Authenticated(record.to_identity(false))
        } else {
            tracing::debug!(username = %credentials.username, "shadow: hash mismatch");
            BackendResult::Rejected(RejectReason::InvalidCredentials)
        }
    }
}
