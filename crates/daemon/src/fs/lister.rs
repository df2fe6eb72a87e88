//! Directory enumeration.
//!
//! Produces the entry list for a resolved directory: dot-entries are
//! skipped, unreadable entries degrade to omission rather than failing
//! the whole listing, and the result is ordered directories-first with
//! case-insensitive names.
//!
//! Enumeration goes through a directory handle opened with
//! `O_DIRECTORY | O_NOFOLLOW` and identity-checked via fstat, so a
//! swap of the verified directory after resolution surfaces as a
//! transient error instead of a listing of the impostor.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

use chrono::{DateTime, Utc};
use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::unistd::{access, AccessFlags, Uid, User};
use protocol::{FileEntry, Identity, ListingResponse};
use thiserror::Error;

use super::resolver::ResolvedPath;

/// Errors from directory enumeration.
#[derive(Debug, Error)]
pub enum ListError {
    /// The directory could not be opened for reading.
    #[error("cannot read directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The directory was replaced between resolution and enumeration.
    #[error("directory changed during listing: {0}")]
    Raced(String),
}

/// What a directory entry is, after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One visible entry of a listed directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes; always 0 for directories.
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Permission bits of the mode, including setuid/setgid/sticky.
    pub permission_bits: u32,
    pub owner: String,
    /// Whether the serving process can read the entry.
    pub readable: bool,
    /// Whether the serving process can write the entry.
    pub writable: bool,
}

impl DirectoryEntry {
    fn to_file_entry(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            is_folder: self.kind == EntryKind::Directory,
            size: self.size,
            modified: self.modified,
            readable: self.readable,
            writable: self.writable,
        }
    }
}

/// A complete listing of one directory.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Display path of the listed directory.
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
    pub requested_by: Identity,
    pub generated_at: DateTime<Utc>,
}

impl Listing {
    /// Convert to the wire response shape.
    pub fn to_response(&self) -> ListingResponse {
        ListingResponse::new(
            self.path.clone(),
            self.entries.iter().map(|e| e.to_file_entry()).collect(),
        )
    }
}

/// Enumerates resolved directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLister;

impl DirectoryLister {
    pub fn new() -> Self {
        Self
    }

    /// List the entries of a resolved directory on behalf of `identity`.
    ///
    /// Returns the same entry set in the same order for an unchanged
    /// directory, however often it is called.
    pub fn list(&self, path: &ResolvedPath, identity: &Identity) -> Result<Listing, ListError> {
        // Open before verifying: the identity check runs on the handle
        // that is subsequently enumerated, so nothing can change hands
        // in between. O_NOFOLLOW makes a symlink swapped into the final
        // component fail outright.
        let handle = match File::options()
            .read(true)
            .custom_flags((OFlag::O_DIRECTORY | OFlag::O_NOFOLLOW).bits())
            .open(path.canonical())
        {
            Ok(handle) => handle,
            // ErrorKind::FilesystemLoop is unstable; ELOOP is its raw form.
            Err(e)
                if e.kind() == std::io::ErrorKind::NotADirectory
                    || e.raw_os_error() == Some(nix::libc::ELOOP) =>
            {
                tracing::warn!(path = path.display(), "directory replaced after resolution");
                return Err(ListError::Raced(path.display().to_string()));
            }
            Err(e) => return Err(self.io_error(path, e)),
        };

        let metadata = handle.metadata().map_err(|e| self.io_error(path, e))?;
        if metadata.dev() != path.dev || metadata.ino() != path.ino {
            tracing::warn!(path = path.display(), "directory replaced after resolution");
            return Err(ListError::Raced(path.display().to_string()));
        }

        let mut dir =
            Dir::from(handle).map_err(|e| self.io_error(path, std::io::Error::from(e)))?;

        let mut entries = Vec::new();
        for dirent in dir.iter() {
            let dirent = match dirent {
                Ok(dirent) => dirent,
                Err(e) => {
                    tracing::debug!(path = path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let name = match dirent.file_name().to_str() {
                Ok(name) => name.to_string(),
                Err(_) => {
                    tracing::debug!(raw = ?dirent.file_name(), "skipping entry with non-UTF-8 name");
                    continue;
                }
            };
            if name.starts_with('.') {
                continue;
            }

            match self.stat_entry(&path.canonical().join(&name), name) {
                Some(entry) => entries.push(entry),
                None => continue,
            }
        }

        entries.sort_by(compare_entries);

        Ok(Listing {
            path: path.display().to_string(),
            entries,
            requested_by: identity.clone(),
            generated_at: Utc::now(),
        })
    }

    /// Build the entry for one name, following symlinks to classify the
    /// target. Entries that cannot be stat'ed, or that are neither files
    /// nor directories, are omitted.
    fn stat_entry(&self, full_path: &Path, name: String) -> Option<DirectoryEntry> {
        let metadata = match fs::metadata(full_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(name, error = %e, "skipping unstatable entry");
                return None;
            }
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            // Sockets, FIFOs and device nodes are not browsable.
            return None;
        };

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Some(DirectoryEntry {
            name,
            kind,
            size: match kind {
                EntryKind::Directory => 0,
                EntryKind::File => metadata.len(),
            },
            modified,
            permission_bits: metadata.permissions().mode() & 0o7777,
            owner: owner_name(metadata.uid()),
            readable: access(full_path, AccessFlags::R_OK).is_ok(),
            writable: access(full_path, AccessFlags::W_OK).is_ok(),
        })
    }

    fn io_error(&self, path: &ResolvedPath, source: std::io::Error) -> ListError {
        ListError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Directories before files, then case-insensitive by name, with the
/// raw name as tiebreak so ordering stays total.
fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    let rank = |e: &DirectoryEntry| match e.kind {
        EntryKind::Directory => 0,
        EntryKind::File => 1,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => "unknown".to_string(),
    }
}
