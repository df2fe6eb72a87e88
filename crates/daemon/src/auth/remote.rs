//! Remote identity API backend.
//!
//! Posts form-encoded credentials to the NAS firmware's login CGI and
//! parses the XML verdict it replies with, then materializes the
//! resulting identity from the account database. Network failures are
//! availability problems, never rejections.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use async_trait::async_trait;
use protocol::{Credentials, RejectReason};

use super::users::UserDatabase;
use super::{BackendResult, IdentityBackend};

/// Form fields of the login request. The secret travels base64-encoded
/// and `serviceKey` is fixed, matching the firmware endpoint's contract.
fn auth_params(credentials: &Credentials) -> [(&'static str, String); 3] {
    [
        ("user", credentials.username.clone()),
        ("pwd", BASE64.encode(&credentials.secret)),
        ("serviceKey", "1".to_string()),
    ]
}

/// Extract the `<authPassed>` verdict from an XML reply body.
///
/// The endpoint signals success with `<authPassed>1</authPassed>`;
/// anything other than a literal `1` or `0` in the element is treated
/// as unparseable (`None`), not as a rejection.
fn parse_auth_passed(body: &str) -> Option<bool> {
    const OPEN: &str = "<authPassed>";
    const CLOSE: &str = "</authPassed>";

    let start = body.find(OPEN)? + OPEN.len();
    let end = body[start..].find(CLOSE)? + start;
    match body[start..end].trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Identity backend that defers the credential check to a remote
/// authority over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteApiBackend {
    endpoint: String,
    client: reqwest::Client,
    users: UserDatabase,
}

impl RemoteApiBackend {
    /// Create a backend for the given endpoint.
    ///
    /// The request timeout is set on the client here; the service wraps
    /// calls in its own bounded timeout as well, so a hung endpoint can
    /// never stall the backend chain.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: std::time::Duration,
        users: UserDatabase,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            users,
        })
    }
}

#[async_trait]
impl IdentityBackend for RemoteApiBackend {
    fn name(&self) -> &str {
        "remote-api"
    }

    async fn try_authenticate(&self, credentials: &Credentials) -> BackendResult {
        let response = match self
            .client
            .post(&self.endpoint)
            .form(&auth_params(credentials))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return BackendResult::Unavailable(format!("request failed: {}", e)),
        };

        if !response.status().is_success() {
            return BackendResult::Unavailable(format!(
                "endpoint returned HTTP {}",
                response.status()
            ));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return BackendResult::Unavailable(format!("unreadable reply: {}", e)),
        };

        let passed = match parse_auth_passed(&body) {
            Some(passed) => passed,
            None => return BackendResult::Unavailable("malformed reply".to_string()),
        };

        if !passed {
            return BackendResult::Rejected(RejectReason::InvalidCredentials);
        }

        // The authority said yes; the identity itself still comes from
        // the local account database.
        match self.users.lookup(&credentials.username) {
            Ok(Some(record)) => BackendResult::Authenticated(record.to_identity(false)),
            Ok(None) => {
                tracing::warn!(
                    username = %credentials.username,
                    "remote authority accepted a user absent from the account database"
                );
                BackendResult::Rejected(RejectReason::InvalidCredentials)
            }
            Err(e) => BackendResult::Unavailable(format!("passwd lookup failed: {}", e)),
        }
    }
}
