//! Path resolution with root containment.
//!
//! A caller-supplied relative path becomes a canonical filesystem
//! location that provably stays inside the configured root. Containment
//! is checked on the *canonicalized* result, after every symlink has
//! been resolved; a string-prefix check before symlink resolution would
//! let an in-tree symlink escape the root.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use nix::unistd::{access, AccessFlags};
use thiserror::Error;

/// Errors from path resolution.
///
/// `OutsideRoot`, `NotFound` and `NotReadable` are distinguished here
/// for logging, but all collapse to the same external "not found"
/// response so callers cannot probe the tree outside the root.
#[derive(Debug, Error)]
pub enum PathError {
    /// The request escapes the configured root (lexically or through a
    /// symlink).
    #[error("path resolves outside the root: {0}")]
    OutsideRoot(String),

    /// The path does not exist or is not a directory.
    #[error("path not found: {0}")]
    NotFound(String),

    /// The path exists but the serving process cannot read it.
    #[error("path not readable: {0}")]
    NotReadable(String),

    /// The request itself is malformed (NUL byte, over-long).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A canonical, root-contained directory location.
///
/// Constructed only by [`PathResolver::resolve`]; the private fields
/// keep hand-built instances out of the listing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    canonical: PathBuf,
    relative_display: String,
    // Directory identity at resolve time, so the lister can detect a
    // swap between the containment check and enumeration.
    pub(crate) dev: u64,
    pub(crate) ino: u64,
}

impl ResolvedPath {
    /// The canonical absolute path. Always equal to the root or a strict
    /// descendant of it.
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// The virtual display path, display prefix included (e.g.
    /// `/Web/docs`).
    pub fn display(&self) -> &str {
        &self.relative_display
    }
}

/// Resolves caller-supplied paths against a canonical root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    display_prefix: String,
    max_request_len: usize,
}

impl PathResolver {
    /// Create a resolver for `root`, canonicalizing it once.
    ///
    /// Fails if the root does not exist or is not a directory; a service
    /// with an unusable root should not start.
    pub fn new(
        root: &Path,
        display_prefix: impl Into<String>,
        max_request_len: usize,
    ) -> anyhow::Result<Self> {
        let root = fs::canonicalize(root)
            .map_err(|e| anyhow::anyhow!("cannot canonicalize root {}: {}", root.display(), e))?;
        if !root.is_dir() {
            anyhow::bail!("root is not a directory: {}", root.display());
        }
        Ok(Self {
            root,
            display_prefix: display_prefix.into(),
            max_request_len,
        })
    }

    /// The canonical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to a canonical, root-contained
    /// directory.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedPath, PathError> {
        if requested.contains('\0') {
            return Err(PathError::InvalidRequest("NUL byte in path".to_string()));
        }
        if requested.len() > self.max_request_len {
            return Err(PathError::InvalidRequest(format!(
                "path length {} exceeds limit {}",
                requested.len(),
                self.max_request_len
            )));
        }

        let remainder = self.strip_display_prefix(requested);
        let joined = self.lexical_join(remainder)?;

        let canonical = fs::canonicalize(&joined).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PathError::NotFound(requested.to_string()),
            std::io::ErrorKind::PermissionDenied => PathError::NotReadable(requested.to_string()),
            _ => PathError::NotReadable(format!("{}: {}", requested, e)),
        })?;

        // Containment on the canonicalized result: catches symlinks
        // inside the tree that point outside it.
        if canonical != self.root && !canonical.starts_with(&self.root) {
            tracing::warn!(
                requested,
                resolved = %canonical.display(),
                "path escaped root via symlink"
            );
            return Err(PathError::OutsideRoot(requested.to_string()));
        }

        let metadata = fs::symlink_metadata(&canonical)
            .map_err(|_| PathError::NotFound(requested.to_string()))?;
        if !metadata.is_dir() {
            return Err(PathError::NotFound(requested.to_string()));
        }
        // Enumerating a directory needs both read and search permission.
        access(&canonical, AccessFlags::R_OK | AccessFlags::X_OK)
            .map_err(|_| PathError::NotReadable(requested.to_string()))?;

        Ok(ResolvedPath {
            relative_display: self.display_for(&canonical),
            dev: metadata.dev(),
            ino: metadata.ino(),
            canonical,
        })
    }

    /// Strip the display prefix when it appears as a whole leading
    /// component. `/Website` must survive a `/Web` prefix intact.
    fn strip_display_prefix<'a>(&self, requested: &'a str) -> &'a str {
        if self.display_prefix.is_empty() {
            return requested;
        }
        match requested.strip_prefix(self.display_prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => requested,
        }
    }

    /// Join `requested` onto the root lexically, normalizing `.` and
    /// `..` without touching the filesystem. A `..` that would climb
    /// above the root is rejected outright, independent of whether the
    /// escape target exists.
    fn lexical_join(&self, requested: &str) -> Result<PathBuf, PathError> {
        let mut joined = self.root.clone();
        let mut depth = 0usize;

        for component in Path::new(requested).components() {
            match component {
                Component::CurDir => {}
                // An absolute request is interpreted relative to the root.
                Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(PathError::OutsideRoot(requested.to_string()));
                    }
                    depth -= 1;
                    joined.pop();
                }
                Component::Normal(part) => {
                    depth += 1;
                    joined.push(part);
                }
            }
        }

        Ok(joined)
    }

    /// Virtual display path for a canonical location under the root.
    fn display_for(&self, canonical: &Path) -> String {
        let prefix = if self.display_prefix.is_empty() {
            ""
        } else {
            self.display_prefix.as_str()
        };
        match canonical.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => {
                if prefix.is_empty() {
                    "/".to_string()
                } else {
                    prefix.to_string()
                }
            }
            Ok(rel) => format!("{}/{}", prefix, rel.display()),
            Err(_) => prefix.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("docs/reports")).unwrap();
        fs::create_dir_all(temp.path().join("Website")).unwrap();
        fs::write(temp.path().join("docs/file.txt"), "hello").unwrap();
        let resolver = PathResolver::new(temp.path(), "/Web", 4096).unwrap();
        (temp, resolver)
    }

    #[test]
    fn test_empty_and_dot_resolve_to_root() {
        let (temp, resolver) = setup();
        let root = fs::canonicalize(temp.path()).unwrap();

        let resolved = resolver.resolve("").unwrap();
        assert_eq!(resolved.canonical(), root);
        assert_eq!(resolved.display(), "/Web");

        let resolved = resolver.resolve(".").unwrap();
        assert_eq!(resolved.canonical(), root);
    }

    #[test]
    fn test_resolve_subdirectory() {
        let (temp, resolver) = setup();
        let resolved = resolver.resolve("docs/reports").unwrap();

        assert_eq!(
            resolved.canonical(),
            fs::canonicalize(temp.path().join("docs/reports")).unwrap()
        );
        assert_eq!(resolved.display(), "/Web/docs/reports");
    }

    #[test]
    fn test_display_prefix_stripped_as_component() {
        let (_temp, resolver) = setup();

        // "/Web/docs" means "docs" under the root...
        let resolved = resolver.resolve("/Web/docs").unwrap();
        assert_eq!(resolved.display(), "/Web/docs");

        // ...but "/Website" is a real directory name, not the prefix.
        let resolved = resolver.resolve("/Website").unwrap();
        assert_eq!(resolved.display(), "/Web/Website");
    }

    #[test]
    fn test_parent_traversal_rejected_without_filesystem_access() {
        let (_temp, resolver) = setup();

        // Escape targets need not exist for the rejection to fire.
        assert!(matches!(
            resolver.resolve("../../etc/passwd"),
            Err(PathError::OutsideRoot(_))
        ));
        assert!(matches!(
            resolver.resolve("docs/../../b"),
            Err(PathError::OutsideRoot(_))
        ));
        assert!(matches!(
            resolver.resolve(".."),
            Err(PathError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_internal_dotdot_that_stays_inside_is_fine() {
        let (temp, resolver) = setup();
        let resolved = resolver.resolve("docs/reports/../reports").unwrap();
        assert_eq!(
            resolved.canonical(),
            fs::canonicalize(temp.path().join("docs/reports")).unwrap()
        );
    }

    #[test]
    fn test_symlink_escaping_root_rejected() {
        let (temp, resolver) = setup();
        let outside = TempDir::new().unwrap();
        fs::create_dir_all(outside.path().join("secrets")).unwrap();
        symlink(
            outside.path().join("secrets"),
            temp.path().join("link-to-outside"),
        )
        .unwrap();

        assert!(matches!(
            resolver.resolve("link-to-outside"),
            Err(PathError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_symlink_inside_root_allowed() {
        let (temp, resolver) = setup();
        symlink(temp.path().join("docs"), temp.path().join("docs-alias")).unwrap();

        let resolved = resolver.resolve("docs-alias").unwrap();
        // Canonical form is the target, still under the root.
        assert_eq!(
            resolved.canonical(),
            fs::canonicalize(temp.path().join("docs")).unwrap()
        );
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let (_temp, resolver) = setup();
        assert!(matches!(
            resolver.resolve("no-such-dir"),
            Err(PathError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_is_not_found() {
        let (_temp, resolver) = setup();
        // Only directories are listable; files resolve as not-found.
        assert!(matches!(
            resolver.resolve("docs/file.txt"),
            Err(PathError::NotFound(_))
        ));
    }

    #[test]
    fn test_nul_byte_rejected() {
        let (_temp, resolver) = setup();
        assert!(matches!(
            resolver.resolve("docs\0evil"),
            Err(PathError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_overlong_request_rejected() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp.path(), "/Web", 16).unwrap();
        assert!(matches!(
            resolver.resolve("a-rather-long-path-name"),
            Err(PathError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_new_rejects_missing_root() {
        assert!(PathResolver::new(Path::new("/nonexistent/root"), "/Web", 4096).is_err());
    }

    #[test]
    fn test_empty_display_prefix() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        let resolver = PathResolver::new(temp.path(), "", 4096).unwrap();

        assert_eq!(resolver.resolve("").unwrap().display(), "/");
        assert_eq!(resolver.resolve("docs").unwrap().display(), "/docs");
    }
}
