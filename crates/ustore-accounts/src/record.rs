use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ustore_fs::{read_locked, remove_dir_recursive, write_locked, StoreError};

use crate::directory::UserDirectory;
use crate::error::{AccountError, AccountResult};
use crate::names::validate_user_name;

/// Name of the record file inside each user directory.
pub const DATA_FILE: &str = "data.json";

/// On-disk shape of `data.json`.
#[derive(Deserialize)]
struct RecordFile {
    user: String,
    #[serde(default)]
    groups: Option<Vec<String>>,
    hash: String,
}

#[derive(Serialize)]
struct RecordFileRef<'a> {
    user: &'a str,
    groups: &'a [String],
    hash: &'a str,
}

/// Result of [`UserRecord::write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The user directory did not exist and was created.
    Created,
    /// An existing record was overwritten.
    Updated,
    /// Creating the user would exceed `max_users`. Nothing was written.
    CapacityExceeded,
}

impl WriteOutcome {
    pub fn is_written(self) -> bool {
        !matches!(self, Self::CapacityExceeded)
    }

    /// HTTP status a presentation layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Created => 201,
            Self::Updated => 200,
            Self::CapacityExceeded => 429,
        }
    }
}

/// The identity projection handed to a session layer. Never carries the
/// password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: String,
    pub groups: Vec<String>,
}

/// One user's identity: name, group memberships and password hash.
///
/// A record built with [`UserRecord::new`] is a placeholder and not ready.
/// It becomes ready through [`UserRecord::set`] or [`UserRecord::load`].
/// Every other operation fails with [`AccountError::NotReady`] until then.
///
/// The in-memory state is a copy. It goes stale if another process rewrites
/// the record; reload before trusting it after a long idle period.
///
/// A record lent to [`UserDirectory::update_user`] is held: `load`, `write`
/// and `remove` fail with [`AccountError::HeldUnderLock`] until the update
/// returns.
#[derive(Clone)]
pub struct UserRecord {
    directory: UserDirectory,
    name: String,
    groups: Vec<String>,
    hash: String,
    ready: bool,
    held: bool,
}

impl UserRecord {
    /// A not-ready placeholder bound to `directory`.
    pub fn new(directory: &UserDirectory) -> Self {
        Self {
            directory: directory.clone(),
            name: String::new(),
            groups: Vec::new(),
            hash: String::new(),
            ready: false,
            held: false,
        }
    }

    /// Load the record for `name` from disk.
    pub fn open(directory: &UserDirectory, name: &str) -> AccountResult<Self> {
        let mut record = Self::new(directory);
        record.load(name)?;
        Ok(record)
    }

    /// Replace this record's state with the one stored for `name`.
    ///
    /// Fails with an argument error when `name` is invalid or has no
    /// directory, and with an internal error when the record file is
    /// unreadable or does not decode.
    pub fn load(&mut self, name: &str) -> AccountResult<()> {
        validate_user_name(name)?;
        let dir = self.directory.user_dir(name);
        let path = dir.join(DATA_FILE);
        self.ensure_free(&path)?;
        if !dir.is_dir() {
            return Err(AccountError::NoSuchUser(name.to_string()));
        }
        let bytes = read_locked(&path)?;
        self.apply_file(name, &path, &bytes)
    }

    /// Decode `bytes` (the contents of `path`) into this record.
    pub(crate) fn apply_file(&mut self, name: &str, path: &Path, bytes: &[u8]) -> AccountResult<()> {
        let file: RecordFile =
            serde_json::from_slice(bytes).map_err(|e| AccountError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !file.user.is_empty() && file.user != name {
            return Err(AccountError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("record belongs to {:?}", file.user),
            });
        }
        self.set(&file.user, file.groups.unwrap_or_default(), file.hash)
    }

    /// Set all fields at once and mark the record ready.
    ///
    /// Nothing changes if any argument is rejected.
    pub fn set(
        &mut self,
        name: &str,
        groups: Vec<String>,
        hash: impl Into<String>,
    ) -> AccountResult<()> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(AccountError::InvalidArgument(
                "invalid password hash for user record".into(),
            ));
        }
        validate_user_name(name)?;
        self.name = name.to_string();
        self.set_groups(groups);
        self.hash = hash;
        self.ready = true;
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> AccountResult<()> {
        validate_user_name(name)?;
        self.name = name.to_string();
        Ok(())
    }

    /// Replace the group set. Duplicates are dropped, first occurrence wins.
    pub fn set_groups(&mut self, mut groups: Vec<String>) {
        let mut seen = HashSet::new();
        groups.retain(|g| seen.insert(g.clone()));
        self.groups = groups;
    }

    /// Persist the record to `<users root>/<name>/data.json`.
    ///
    /// Writing a record whose directory does not exist yet creates the user,
    /// which is refused with [`WriteOutcome::CapacityExceeded`] when the
    /// store already holds `max_users` users. Only that path creates the
    /// directory; a directory removed after the existence check is
    /// [`AccountError::MissingDirectory`].
    pub fn write(&self) -> AccountResult<WriteOutcome> {
        self.ensure_ready()?;
        let dir = self.data_dir()?;
        let path = dir.join(DATA_FILE);
        self.ensure_free(&path)?;
        let json = self.to_json()?;

        let outcome = if dir.is_dir() {
            WriteOutcome::Updated
        } else {
            let existing = self.directory.count_users()?;
            let max = self.directory.config().max_users;
            if existing + 1 > max {
                warn!(user = %self.name, existing, max, "user limit reached");
                return Ok(WriteOutcome::CapacityExceeded);
            }
            fs::create_dir_all(&dir).map_err(|e| StoreError::from_io(&dir, e))?;
            WriteOutcome::Created
        };

        write_locked(&path, &json, true).map_err(|e| missing_directory(&dir, e))?;
        match outcome {
            WriteOutcome::Created => info!(user = %self.name, "created user"),
            _ => debug!(user = %self.name, "updated user"),
        }
        Ok(outcome)
    }

    /// Delete the user's directory and everything in it, ledger included.
    ///
    /// Irreversible.
    pub fn remove(&self) -> AccountResult<()> {
        self.ensure_ready()?;
        let dir = self.data_dir()?;
        self.ensure_free(&dir.join(DATA_FILE))?;
        remove_dir_recursive(&dir).map_err(|e| missing_directory(&dir, e))?;
        info!(user = %self.name, "removed user");
        Ok(())
    }

    /// This user's directory. Does not touch the filesystem.
    ///
    /// Use [`UserDirectory::user_dir`] to compute the path for a name
    /// without a ready record.
    pub fn data_dir(&self) -> AccountResult<PathBuf> {
        self.ensure_ready()?;
        Ok(self.directory.user_dir(&self.name))
    }

    pub fn name(&self) -> AccountResult<&str> {
        self.ensure_ready()?;
        Ok(&self.name)
    }

    pub fn groups(&self) -> AccountResult<&[String]> {
        self.ensure_ready()?;
        Ok(&self.groups)
    }

    pub fn is_in_group(&self, group: &str) -> AccountResult<bool> {
        self.ensure_ready()?;
        Ok(self.groups.iter().any(|g| g == group))
    }

    /// Add `group` unless it is already present.
    pub fn add_group(&mut self, group: &str) -> AccountResult<()> {
        self.ensure_ready()?;
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
        Ok(())
    }

    /// Remove `group` if present.
    pub fn remove_group(&mut self, group: &str) -> AccountResult<()> {
        self.ensure_ready()?;
        self.groups.retain(|g| g != group);
        Ok(())
    }

    /// Check `plain` against the stored hash.
    pub fn verify_password(&self, plain: &str) -> AccountResult<bool> {
        self.ensure_ready()?;
        Ok(ustore_crypto::verify_password(plain, &self.hash))
    }

    /// Replace the stored hash with a freshly salted hash of `plain`.
    pub fn set_password(&mut self, plain: &str) -> AccountResult<()> {
        self.ensure_ready()?;
        self.hash = ustore_crypto::hash_password(plain)?;
        Ok(())
    }

    pub fn session_data(&self) -> AccountResult<SessionData> {
        self.ensure_ready()?;
        Ok(SessionData {
            user: self.name.clone(),
            groups: self.groups.clone(),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The users root this record belongs to.
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub(crate) fn to_json(&self) -> AccountResult<Vec<u8>> {
        serde_json::to_vec(&RecordFileRef {
            user: &self.name,
            groups: &self.groups,
            hash: &self.hash,
        })
        .map_err(|e| AccountError::Serialization(e.to_string()))
    }

    /// Mark the record as lent to a locked update, or release it.
    pub(crate) fn set_held(&mut self, held: bool) {
        self.held = held;
    }

    fn ensure_free(&self, path: &Path) -> AccountResult<()> {
        if self.held {
            Err(AccountError::HeldUnderLock(path.to_path_buf()))
        } else {
            Ok(())
        }
    }

    fn ensure_ready(&self) -> AccountResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(AccountError::NotReady("user record"))
        }
    }
}

/// A store `NotFound` inside a user directory means the directory is gone.
pub(crate) fn missing_directory(dir: &Path, err: StoreError) -> AccountError {
    match err {
        StoreError::NotFound(_) => AccountError::MissingDirectory(dir.to_path_buf()),
        other => AccountError::Store(other),
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("hash", &"<redacted>")
            .field("ready", &self.ready)
            .finish()
    }
}
