use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use ustore_fs::{LockedFile, StoreError};
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{AccountError, AccountResult, ErrorClass};
use crate::names::validate_user_name;
use crate::record::{UserRecord, DATA_FILE};

/// Handle on the users root of one installation.
///
/// Cheap to clone; every [`UserRecord`] carries one so it knows where it
/// lives and how many users the store may hold.
#[derive(Clone, Debug)]
pub struct UserDirectory {
    config: Arc<StoreConfig>,
}

impl UserDirectory {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The directory holding one subdirectory per user.
    pub fn users_root(&self) -> PathBuf {
        self.config.users_root()
    }

    /// Create the users root if it does not exist yet.
    pub fn ensure_root(&self) -> AccountResult<()> {
        let root = self.users_root();
        fs::create_dir_all(&root).map_err(|e| StoreError::from_io(&root, e))?;
        Ok(())
    }

    /// Directory for `name`. Pure path computation.
    pub fn user_dir(&self, name: &str) -> PathBuf {
        self.users_root().join(name)
    }

    /// A not-ready placeholder record bound to this directory.
    pub fn new_user(&self) -> UserRecord {
        UserRecord::new(self)
    }

    /// Load the record for `name`.
    pub fn load_user(&self, name: &str) -> AccountResult<UserRecord> {
        UserRecord::open(self, name)
    }

    /// Whether a user named `name` exists.
    ///
    /// Only argument-class load failures (invalid name, no directory, a
    /// record with invalid fields) count as "does not exist". A directory
    /// whose record is unreadable or corrupt still exists.
    pub fn user_exists(&self, name: &str) -> bool {
        match UserRecord::open(self, name) {
            Ok(_) => true,
            Err(e) => e.class() != ErrorClass::Argument,
        }
    }

    /// Names of all existing users, sorted.
    ///
    /// Entries that [`user_exists`](Self::user_exists) rejects (stray files,
    /// hidden entries, half-created directories with invalid records) are
    /// skipped silently. Fails only if the users root cannot be listed.
    pub fn list_user_names(&self) -> AccountResult<Vec<String>> {
        let root = self.users_root();
        if !root.is_dir() {
            return Err(StoreError::NotFound(root).into());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(|p| p.to_path_buf()).unwrap_or_else(|| root.clone());
                StoreError::from_io(&path, e.into())
            })?;
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 entry");
                continue;
            };
            if self.user_exists(name) {
                names.push(name.to_string());
            } else {
                debug!(entry = name, "skipping entry without a valid user record");
            }
        }
        Ok(names)
    }

    /// Every existing user, fully loaded.
    ///
    /// Unlike [`list_user_names`](Self::list_user_names), a record that
    /// fails to load is an error here.
    pub fn list_users(&self) -> AccountResult<Vec<UserRecord>> {
        self.list_user_names()?
            .iter()
            .map(|name| UserRecord::open(self, name))
            .collect()
    }

    /// Number of existing users, i.e. `list_users().len()`.
    pub fn count_users(&self) -> AccountResult<usize> {
        Ok(self.list_users()?.len())
    }

    /// Load, mutate and persist the record of `name` while holding an
    /// exclusive lock on its record file for the whole cycle.
    ///
    /// The closure must not rename the record. Nothing is written if the
    /// closure fails.
    ///
    /// The record is persisted when the closure returns, so inside it
    /// `write`, `remove` and `load` fail with
    /// [`AccountError::HeldUnderLock`]. Any other handle that locks the same
    /// record file from inside the closure (e.g. [`Self::load_user`] or
    /// [`Self::list_users`]) waits for this update and never returns.
    pub fn update_user<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut UserRecord) -> AccountResult<R>,
    ) -> AccountResult<R> {
        validate_user_name(name)?;
        let dir = self.user_dir(name);
        if !dir.is_dir() {
            return Err(AccountError::NoSuchUser(name.to_string()));
        }
        let path = dir.join(DATA_FILE);
        let mut guard = LockedFile::exclusive(&path, false)?;

        let mut record = UserRecord::new(self);
        record.apply_file(name, &path, &guard.read_all()?)?;
        record.set_held(true);
        let out = f(&mut record)?;
        record.set_held(false);
        if record.name()? != name {
            return Err(AccountError::InvalidArgument(format!(
                "cannot rename {name:?} inside a locked update"
            )));
        }
        guard.replace(&record.to_json()?)?;
        debug!(user = name, "updated user under lock");
        Ok(out)
    }
}
