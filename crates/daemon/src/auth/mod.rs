//! Authentication against the host's system accounts.
//!
//! A single [`AuthenticationService`] orchestrates an ordered list of
//! [`IdentityBackend`] strategies. Each backend answers definitively
//! (authenticated or rejected) or declares itself unavailable, in which
//! case the next backend in the chain is consulted. The service owns
//! username validation, the per-backend call timeout, and the admin
//! stamp on successful identities.
//!
//! The service holds no mutable state and is safe to share across
//! concurrent requests; attempt-rate bookkeeping belongs to the session
//! layer, not here.

pub mod admin;
#[cfg(feature = "pam")]
pub mod pam;
pub mod remote;
pub mod shadow;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use protocol::{AuthOutcome, Credentials, Identity, RejectReason};

use crate::config::AuthConfig;
use admin::{GroupMembership, SystemGroups, ADMIN_GROUPS};
use users::UserDatabase;

/// What one backend concluded about a credential pair.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResult {
    /// Definitive yes, with the materialized identity (admin flag unset;
    /// the service stamps it).
    Authenticated(Identity),
    /// Definitive no.
    Rejected(RejectReason),
    /// The backend could not be consulted; the chain moves on.
    Unavailable(String),
}

/// One authentication strategy.
///
/// Implementations must be stateless with respect to requests: a call
/// may be dropped at any await point when the caller goes away, and no
/// cleanup may depend on it completing.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Stable name used in configuration and logs.
    fn name(&self) -> &str;

    /// Verify one credential pair.
    async fn try_authenticate(&self, credentials: &Credentials) -> BackendResult;
}

/// Orchestrates identity backends in priority order.
pub struct AuthenticationService {
    backends: Vec<Box<dyn IdentityBackend>>,
    call_timeout: Duration,
    groups: Box<dyn GroupMembership>,
    users: UserDatabase,
}

/// Whether a username matches `^[A-Za-z0-9_-]+$`.
///
/// Anything else is refused before any backend sees it, so hostile input
/// can never reach backend-specific lookup syntax.
pub fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl AuthenticationService {
    /// Create a service over an explicit backend chain.
    pub fn new(
        backends: Vec<Box<dyn IdentityBackend>>,
        call_timeout: Duration,
        groups: Box<dyn GroupMembership>,
        users: UserDatabase,
    ) -> Self {
        Self {
            backends,
            call_timeout,
            groups,
            users,
        }
    }

    /// Build the service from configuration, constructing the configured
    /// backends in their listed order.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let users = UserDatabase::new(
            &config.passwd_file,
            config.uid_min,
            config.uid_max,
            config.extra_users.clone(),
        );

        let mut backends: Vec<Box<dyn IdentityBackend>> = Vec::new();
        for name in &config.backends {
            match name.as_str() {
                "shadow" => backends.push(Box::new(shadow::ShadowBackend::new(
                    users.clone(),
                    &config.shadow_file,
                ))),
                "remote-api" => backends.push(Box::new(remote::RemoteApiBackend::new(
                    config.remote_endpoint.clone(),
                    config.backend_timeout(),
                    users.clone(),
                )?)),
                #[cfg(feature = "pam")]
                "pam" => backends.push(Box::new(pam::PamBackend::new(
                    config.pam_service.clone(),
                    users.clone(),
                ))),
                #[cfg(not(feature = "pam"))]
                "pam" => {
                    tracing::warn!("pam backend configured but the pam feature is not built in");
                }
                other => anyhow::bail!("unknown identity backend: {}", other),
            }
        }

        Ok(Self::new(
            backends,
            config.backend_timeout(),
            Box::new(SystemGroups),
            users,
        ))
    }

    /// Authenticate a credential pair against the backend chain.
    ///
    /// The first backend returning a definitive answer wins; unavailable
    /// backends are skipped without being retried. If every backend is
    /// unavailable the outcome says so, carrying the last backend's
    /// cause for logging. Each backend call is bounded by the configured
    /// timeout.
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthOutcome {
        if !valid_username(&credentials.username) {
            tracing::debug!("rejected malformed username");
            return AuthOutcome::Rejected(RejectReason::InvalidUsernameFormat);
        }

        let mut last_unavailable = (
            "none".to_string(),
            "no identity backends configured".to_string(),
        );

        for backend in &self.backends {
            let result = match tokio::time::timeout(
                self.call_timeout,
                backend.try_authenticate(credentials),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => BackendResult::Unavailable(format!(
                    "timed out after {:?}",
                    self.call_timeout
                )),
            };

            match result {
                BackendResult::Authenticated(mut identity) => {
                    identity.is_admin = self.is_admin(&identity.username);
                    tracing::info!(
                        username = %identity.username,
                        backend = backend.name(),
                        is_admin = identity.is_admin,
                        "authentication succeeded"
                    );
                    return AuthOutcome::Authenticated(identity);
                }
                BackendResult::Rejected(reason) => {
                    tracing::info!(
                        username = %credentials.username,
                        backend = backend.name(),
                        %reason,
                        "authentication rejected"
                    );
                    return AuthOutcome::Rejected(reason);
                }
                BackendResult::Unavailable(cause) => {
                    tracing::warn!(
                        backend = backend.name(),
                        %cause,
                        "identity backend unavailable, trying next"
                    );
                    last_unavailable = (backend.name().to_string(), cause);
                }
            }
        }

        let (backend, cause) = last_unavailable;
        tracing::error!(%backend, %cause, "all identity backends unavailable");
        AuthOutcome::Unavailable { backend, cause }
    }

    /// Whether `username` holds admin privileges.
    ///
    /// Independent of authentication: consults admin group membership,
    /// then falls back to UID 0. Every lookup failure fails closed.
    pub fn is_admin(&self, username: &str) -> bool {
        if !valid_username(username) {
            return false;
        }

        for group in ADMIN_GROUPS {
            match self.groups.is_member(username, group) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%username, group, error = %e, "group lookup failed");
                }
            }
        }

        matches!(self.users.lookup(username), Ok(Some(record)) if record.uid == 0)
    }

    /// Candidate usernames for display (login page hints).
    ///
    /// Never an authentication input: presence here proves nothing about
    /// credentials.
    pub fn known_users(&self) -> std::io::Result<Vec<String>> {
        self.users.known_users()
    }
}
