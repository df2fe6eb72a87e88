//! Direct PAM backend (feature `pam`).
//!
//! Delegates the credential check to libpam under a configurable service
//! name. Like the remote backend, the identity itself is materialized
//! from the account database after PAM accepts.

use async_trait::async_trait;
use protocol::{Credentials, RejectReason};

use super::users::UserDatabase;
use super::{BackendResult, IdentityBackend};

/// Identity backend that authenticates through PAM.
pub struct PamBackend {
    service: String,
    users: UserDatabase,
}

impl PamBackend {
    /// Create a backend for the given PAM service name.
    pub fn new(service: impl Into<String>, users: UserDatabase) -> Self {
        Self {
            service: service.into(),
            users,
        }
    }

    fn check(&self, username: &str, secret: &str) -> Result<bool, String> {
        let mut authenticator = pam::Authenticator::with_password(&self.service)
            .map_err(|e| format!("PAM init failed: {}", e))?;
        authenticator
            .get_handler()
            .set_credentials(username, secret);
        Ok(authenticator.authenticate().is_ok())
    }
}

#[async_trait]
impl IdentityBackend for PamBackend {
    fn name(&self) -> &str {
        "pam"
    }

    async fn try_authenticate(&self, credentials: &Credentials) -> BackendResult {
        // libpam is a blocking C library; keep it off the async executor.
        let service = self.service.clone();
        let users = self.users.clone();
        let username = credentials.username.clone();
        let secret = credentials.secret.clone();

        let passed = match tokio::task::spawn_blocking(move || {
            PamBackend { service, users }.check(&username, &secret)
        })
        .await
        {
            Ok(Ok(passed)) => passed,
            Ok(Err(cause)) => return BackendResult::Unavailable(cause),
            Err(e) => return BackendResult::Unavailable(format!("PAM task failed: {}", e)),
        };

        if !passed {
            return BackendResult::Rejected(RejectReason::InvalidCredentials);
        }

        match self.users.lookup(&credentials.username) {
            Ok(Some(record)) => BackendResult::Authenticated(record.to_identity(false)),
            Ok(None) => BackendResult::Rejected(RejectReason::InvalidCredentials),
            Err(e) => BackendResult::Unavailable(format!("passwd lookup failed: {}", e)),
        }
    }
}
