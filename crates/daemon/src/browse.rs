//! Browse orchestration.
//!
//! Composes path resolution and directory enumeration into the single
//! operation the external surface exposes: an authenticated identity
//! asks for a path and receives a listing or a deliberately coarse
//! error.

use protocol::{Identity, PublicError};
use thiserror::Error;

use crate::config::BrowseConfig;
use crate::fs::{DirectoryLister, ListError, Listing, PathError, PathResolver};

/// Errors from a browse request.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    List(#[from] ListError),
}

impl BrowseError {
    /// The externally visible error class.
    ///
    /// Everything path-shaped collapses to "not found" so a caller
    /// cannot distinguish an existing-but-forbidden directory from a
    /// missing one, and cannot probe outside the root.
    pub fn public(&self) -> PublicError {
        match self {
            BrowseError::Path(_) => PublicError::NotFound,
            BrowseError::List(_) => PublicError::Internal,
        }
    }
}

/// Serves directory listings for authenticated identities.
#[derive(Debug, Clone)]
pub struct BrowseService {
    resolver: PathResolver,
    lister: DirectoryLister,
}

impl BrowseService {
    /// Build the service from browse configuration; fails if the root
    /// is unusable.
    pub fn new(config: &BrowseConfig) -> anyhow::Result<Self> {
        Ok(Self {
            resolver: PathResolver::new(
                config.root_dir.as_ref(),
                config.display_prefix.clone(),
                config.max_request_len,
            )?,
            lister: DirectoryLister::new(),
        })
    }

    /// List the directory at `requested` on behalf of `identity`.
    pub fn browse(&self, identity: &Identity, requested: &str) -> Result<Listing, BrowseError> {
        let resolved = self.resolver.resolve(requested)?;
        let listing = self.lister.list(&resolved, identity)?;
        tracing::info!(
            user = identity.username,
            path = listing.path,
            entries = listing.entries.len(),
            "directory listed"
        );
        Ok(listing)
    }
}
