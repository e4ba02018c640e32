//! User name validation.
//!
//! A user name doubles as the name of the user's directory, so it must be a
//! single, plain path component:
//! - Must be non-empty
//! - Must not contain `/`, `\` or NUL
//! - Must not be `.` or `..`
//! - Must not start with `.` (hidden entries are never users)

use crate::error::{AccountError, AccountResult};

/// Characters that are forbidden anywhere in a user name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

/// Validate a user name, returning `Ok(())` if it is usable as a directory
/// name below the users root.
///
/// # Examples
///
/// ```
/// use ustore_accounts::validate_user_name;
///
/// assert!(validate_user_name("alice").is_ok());
/// assert!(validate_user_name("").is_err());
/// assert!(validate_user_name("../etc").is_err());
/// ```
pub fn validate_user_name(name: &str) -> AccountResult<()> {
    if name.is_empty() {
        return Err(AccountError::InvalidArgument("invalid username: empty".into()));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(AccountError::InvalidArgument(format!(
                "invalid username {name:?}: contains forbidden character {ch:?}"
            )));
        }
    }

    if name.starts_with('.') {
        return Err(AccountError::InvalidArgument(format!(
            "invalid username {name:?}: must not start with '.'"
        )));
    }

    Ok(())
}
