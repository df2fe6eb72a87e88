//! Admin privilege determination.
//!
//! Group membership is resolved through an injected [`GroupMembership`]
//! capability backed by the platform's group database; no external
//! `groups`-style command is spawned. Lookup failures always fail
//! closed: a user whose groups cannot be determined is not an admin.

use std::io;

use nix::unistd::{Group, User};

/// Group names whose members are treated as administrators.
pub const ADMIN_GROUPS: &[&str] = &["admin", "administrators", "wheel"];

/// Capability for resolving group membership.
pub trait GroupMembership: Send + Sync {
    /// Whether `username` belongs to `group`, either as a listed member
    /// or through their primary GID.
    fn is_member(&self, username: &str, group: &str) -> io::Result<bool>;
}

/// [`GroupMembership`] implementation over the platform group database.
#[derive(Debug, Default)]
pub struct SystemGroups;

impl GroupMembership for SystemGroups {
    fn is_member(&self, username: &str, group: &str) -> io::Result<bool> {
        let group = match Group::from_name(group).map_err(io::Error::from)? {
            Some(group) => group,
            None => return Ok(false),
        };

        if group.mem.iter().any(|m| m == username) {
            return Ok(true);
        }

        // Primary group membership is not listed in the member field.
        let user = User::from_name(username).map_err(io::Error::from)?;
        Ok(user.map(|u| u.gid == group.gid).unwrap_or(false))
    }
}
