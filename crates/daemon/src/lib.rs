//! ShareView Daemon
//!
//! Authenticated, root-confined directory browsing for a NAS share.
//! Credentials are checked against a configurable chain of identity
//! backends; listings never leave the configured root.

pub mod auth;
pub mod browse;
pub mod config;
pub mod fs;

pub use auth::AuthenticationService;
pub use browse::{BrowseError, BrowseService};
pub use config::Config;
pub use fs::{DirectoryLister, PathResolver};
