//! passwd-format account database access.
//!
//! Records are read fresh on every call; the database file is treated as
//! an externally-synchronized resource (the OS replaces it atomically).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use protocol::Identity;

/// One parsed passwd record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdRecord {
    /// Account name.
    pub name: String,
    /// Numeric user ID.
    pub uid: u32,
    /// Primary group ID.
    pub gid: u32,
    /// GECOS field (display name).
    pub gecos: String,
    /// Home directory.
    pub home: String,
    /// Login shell.
    pub shell: String,
}

impl PasswdRecord {
    /// Parse a single `name:passwd:uid:gid:gecos:home:shell` line.
    /// Returns `None` for malformed lines (they are skipped, not fatal).
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.splitn(7, ':');
        let name = fields.next()?.to_string();
        let _password = fields.next()?;
        let uid = fields.next()?.parse().ok()?;
        let gid = fields.next()?.parse().ok()?;
        let gecos = fields.next()?.to_string();
        let home = fields.next()?.to_string();
        let shell = fields.next()?.to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            uid,
            gid,
            gecos,
            home,
            shell,
        })
    }

    /// Materialize an [`Identity`] from this record. The admin flag is
    /// stamped separately by the authentication service.
    pub fn to_identity(&self, is_admin: bool) -> Identity {
        Identity {
            username: self.name.clone(),
            uid: self.uid,
            gid: self.gid,
            home_directory: self.home.clone(),
            shell: self.shell.clone(),
            is_admin,
        }
    }
}

/// Read-only view of a passwd-format file plus the interactive-account
/// policy (UID range and explicit allow-list).
#[derive(Debug, Clone)]
pub struct UserDatabase {
    path: PathBuf,
    uid_min: u32,
    uid_max: u32,
    extra_users: Vec<String>,
}

impl UserDatabase {
    /// Create a database view over the given passwd file.
    pub fn new<P: AsRef<Path>>(
        path: P,
        uid_min: u32,
        uid_max: u32,
        extra_users: Vec<String>,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            uid_min,
            uid_max,
            extra_users,
        }
    }

    /// Path of the underlying passwd file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a record by exact username match.
    ///
    /// `Ok(None)` means the user does not exist; `Err` means the file
    /// could not be consulted at all (callers treat that as a backend
    /// availability problem, not a rejection).
    pub fn lookup(&self, username: &str) -> io::Result<Option<PasswdRecord>> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .filter_map(PasswdRecord::parse)
            .find(|r| r.name == username))
    }

    /// Enumerate candidate interactive usernames: UID within the
    /// configured range, or present on the allow-list.
    ///
    /// For display purposes only. Presence in this list is not proof of
    /// valid credentials and must never feed an authentication decision.
    pub fn known_users(&self) -> io::Result<Vec<String>> {
        let contents = fs::read_to_string(&self.path)?;
        let mut users: Vec<String> = contents
            .lines()
            .filter_map(PasswdRecord::parse)
            .filter(|r| {
                (r.uid >= self.uid_min && r.uid < self.uid_max)
                    || self.extra_users.iter().any(|u| u == &r.name)
            })
            .map(|r| r.name)
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/sh
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
admin:x:500:500:NAS Admin:/home/admin:/bin/sh
alice:x:1000:1000:Alice:/home/alice:/bin/bash
bob:x:1001:1001::/home/bob:/bin/zsh
nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin
malformed-line
";

    fn passwd_file() -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(PASSWD.as_bytes()).unwrap();
        f
    }

    fn db(f: &NamedTempFile) -> UserDatabase {
        UserDatabase::new(
            f.path(),
            1000,
            65534,
            vec!["admin".to_string(), "guest".to_string()],
        )
    }

    #[test]
    fn test_lookup_existing_user() {
        let f = passwd_file();
        let record = db(&f).lookup("alice").unwrap().unwrap();

        assert_eq!(record.name, "alice");
        assert_eq!(record.uid, 1000);
        assert_eq!(record.gid, 1000);
        assert_eq!(record.home, "/home/alice");
        assert_eq!(record.shell, "/bin/bash");
    }

    #[test]
    fn test_lookup_absent_user() {
        let f = passwd_file();
        assert!(db(&f).lookup("mallory").unwrap().is_none());
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let f = passwd_file();
        // "ali" must not match "alice"
        assert!(db(&f).lookup("ali").unwrap().is_none());
    }

    #[test]
    fn test_lookup_unreadable_file_is_error() {
        let database = UserDatabase::new("/nonexistent/passwd", 1000, 65534, vec![]);
        assert!(database.lookup("alice").is_err());
    }

    #[test]
    fn test_known_users_uid_range_and_allow_list() {
        let f = passwd_file();
        let users = db(&f).known_users().unwrap();

        // alice and bob by UID range, admin by allow-list; root, daemon
        // and nobody (65534, exclusive ceiling) excluded.
        assert_eq!(users, vec!["admin", "alice", "bob"]);
    }

    #[test]
    fn test_known_users_allow_list_requires_account() {
        // "guest" is on the allow-list but has no passwd record.
        let f = passwd_file();
        let users = db(&f).known_users().unwrap();
        assert!(!users.contains(&"guest".to_string()));
    }

    #[test]
    fn test_to_identity() {
        let f = passwd_file();
        let record = db(&f).lookup("root").unwrap().unwrap();
        let identity = record.to_identity(true);

        assert_eq!(identity.username, "root");
        assert_eq!(identity.uid, 0);
        assert_eq!(identity.home_directory, "/root");
        assert!(identity.is_admin);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let f = passwd_file();
        // Parsing must not choke on the trailing garbage line.
        assert!(db(&f).lookup("malformed-line").unwrap().is_none());
    }

    #[test]
    fn test_empty_gecos() {
        let f = passwd_file();
        let record = db(&f).lookup("bob").unwrap().unwrap();
        assert_eq!(record.gecos, "");
    }
}
