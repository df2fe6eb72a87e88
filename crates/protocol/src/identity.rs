//! Identity types produced and consumed by the authentication service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A username/password pair supplied by a caller.
///
/// Credentials exist only for the duration of a single authentication
/// call and are never persisted. The `Debug` implementation redacts the
/// secret so credentials can appear in trace output safely.
#[derive(Clone)]
pub struct Credentials {
    /// The claimed username.
    pub username: String,
    /// The secret to verify. Redacted from `Debug` output.
    pub secret: String,
}

impl Credentials {
    /// Create credentials from a username and secret.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A verified system identity.
///
/// Produced by the authentication service on success and owned by the
/// caller (typically a session layer) for the lifetime of the
/// authenticated context. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Verified username.
    pub username: String,
    /// Numeric user ID.
    pub uid: u32,
    /// Primary group ID.
    pub gid: u32,
    /// Home directory path.
    pub home_directory: String,
    /// Login shell.
    pub shell: String,
    /// Whether the user holds admin privileges. Computed once at login;
    /// lookup failures default this to `false`.
    pub is_admin: bool,
}

/// Why an authentication attempt was rejected.
///
/// The distinction is kept for server-side logging only; every variant
/// renders externally as the same "invalid credentials" response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The username failed local format validation and no backend was
    /// consulted.
    InvalidUsernameFormat,
    /// Unknown user or password mismatch (deliberately not distinguished).
    InvalidCredentials,
    /// The account exists but carries a disabled/locked password hash.
    AccountDisabled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidUsernameFormat => "invalid username format",
            Self::InvalidCredentials => "invalid credentials",
            Self::AccountDisabled => "account disabled",
        };
        f.write_str(s)
    }
}

/// Result of one authentication call.
///
/// Never a bare boolean: callers can tell "wrong credentials" from
/// "no backend could be consulted", but both map to the identical
/// external response via [`AuthOutcome::public_error`].
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// A backend gave a definitive yes.
    Authenticated(Identity),
    /// A backend gave a definitive no.
    Rejected(RejectReason),
    /// Every configured backend failed to answer. `backend` and `cause`
    /// describe the last one tried, for logging.
    Unavailable {
        /// Name of the last backend tried.
        backend: String,
        /// Why it could not be consulted.
        cause: String,
    },
}

impl AuthOutcome {
    /// Whether this outcome carries a verified identity.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The verified identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(id) => Some(id),
            _ => None,
        }
    }

    /// The external mapping of a failed outcome.
    ///
    /// `Rejected` and `Unavailable` both collapse to
    /// [`PublicError::InvalidCredentials`] so callers cannot fingerprint
    /// backend state or enumerate usernames. Returns `None` for
    /// `Authenticated`.
    pub fn public_error(&self) -> Option<crate::messages::PublicError> {
        match self {
            Self::Authenticated(_) => None,
            Self::Rejected(_) | Self::Unavailable { .. } => {
                Some(crate::messages::PublicError::InvalidCredentials)
            }
        }
    }
}
