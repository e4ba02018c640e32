//! Fixtures shared by the unit tests of this crate.

use tempfile::TempDir;

use crate::config::StoreConfig;
use crate::directory::UserDirectory;
use crate::record::UserRecord;

/// Syntactically plausible hash; real Argon2 runs are slow in debug builds.
pub const FAKE_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g";

/// A fresh users root in a temp dir with the given user cap.
pub fn users(max_users: usize) -> (TempDir, UserDirectory) {
    let tmp = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        root: tmp.path().to_path_buf(),
        max_users,
        ..StoreConfig::default()
    };
    let directory = UserDirectory::new(config);
    directory.ensure_root().unwrap();
    (tmp, directory)
}

/// A ready, unwritten record.
pub fn record(directory: &UserDirectory, name: &str, groups: &[&str]) -> UserRecord {
    let mut user = UserRecord::new(directory);
    user.set(name, groups.iter().map(|g| g.to_string()).collect(), FAKE_HASH)
        .unwrap();
    user
}

/// A ready record that has been written to disk.
pub fn written(directory: &UserDirectory, name: &str, groups: &[&str]) -> UserRecord {
    let user = record(directory, name, groups);
    assert!(user.write().unwrap().is_written());
    user
}
