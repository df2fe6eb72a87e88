//! Root-confined path resolution and directory listing.

pub mod lister;
pub mod resolver;

pub use lister::{DirectoryEntry, DirectoryLister, EntryKind, ListError, Listing};
pub use resolver::{PathError, PathResolver, ResolvedPath};
