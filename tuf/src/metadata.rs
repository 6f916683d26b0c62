//! Trust checks applied to metadata after it has been parsed.
//!
//! These functions work on facts a metadata parser hands over (signature
//! counts, version numbers, expiry instants) and decide which repository
//! failure, if any, the facts amount to. The verification instant is always
//! supplied by the caller.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::RepositoryError;

/// A metadata role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Root of trust, lists the keys for every top-level role.
    Root,
    /// Points at the current snapshot.
    Timestamp,
    /// Lists the versions of all targets metadata.
    Snapshot,
    /// Lists trusted target files.
    Targets,
    /// A delegated targets role.
    Delegated(String),
}

impl Role {
    /// Returns the role name as it appears in metadata filenames.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Root => "root",
            Self::Timestamp => "timestamp",
            Self::Snapshot => "snapshot",
            Self::Targets => "targets",
            Self::Delegated(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a newly fetched version relates to the version already trusted.
///
/// The rule differs per role, so the caller picks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRule {
    /// The new version must be exactly one more than the trusted one (root rotation).
    Successor(u64),
    /// The new version must not be lower than the trusted one (rollback protection).
    AtLeast(u64),
    /// The new version must equal the version pinned by the referencing metadata.
    Exact(u64),
}

/// Fails with [`RepositoryError::UnsignedMetadata`] when fewer than
/// `threshold` valid signatures were counted.
pub fn check_threshold(
    role: &Role,
    valid_signatures: usize,
    threshold: usize,
) -> Result<(), RepositoryError> {
    if valid_signatures < threshold {
        warn!(role = %role, valid_signatures, threshold, "signature threshold not met");
        return Err(RepositoryError::unsigned_metadata(format!(
            "{role} was signed by {valid_signatures}/{threshold} keys"
        )));
    }
    Ok(())
}

/// Fails with [`RepositoryError::BadVersionNumber`] when `new_version`
/// violates `rule`.
pub fn check_version(role: &Role, new_version: u64, rule: VersionRule) -> Result<(), RepositoryError> {
    let message = match rule {
        VersionRule::Successor(trusted) if Some(new_version) != trusted.checked_add(1) => {
            format!(
                "Expected {role} version {} instead got version {new_version}",
                trusted.saturating_add(1)
            )
        }
        VersionRule::AtLeast(trusted) if new_version < trusted => {
            format!("New {role} version {new_version} must be >= {trusted}")
        }
        VersionRule::Exact(expected) if new_version != expected => {
            format!("Expected {role} version {expected}, got {new_version}")
        }
        _ => return Ok(()),
    };
    warn!(role = %role, new_version, rule = ?rule, "version check failed");
    Err(RepositoryError::bad_version_number(message))
}

/// Fails with [`RepositoryError::ExpiredMetadata`] when `expires` is at or
/// before `now`.
pub fn check_expiry(
    role: &Role,
    expires: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    if expires <= now {
        let expires = expires.to_rfc3339_opts(SecondsFormat::Secs, true);
        warn!(role = %role, expires = %expires, "metadata expired");
        return Err(RepositoryError::expired_metadata(format!(
            "{role} metadata expired at {expires}"
        )));
    }
    Ok(())
}

/// Looks up a metadata file listed by timestamp or snapshot metadata.
///
/// A missing entry means the repository is in an invalid state.
pub fn require_meta<'a, T>(
    meta: &'a HashMap<String, T>,
    listed_by: &Role,
    name: &str,
) -> Result<&'a T, RepositoryError> {
    meta.get(name).ok_or_else(|| {
        warn!(listed_by = %listed_by, name, "referenced metadata missing");
        RepositoryError::invalid(format!("{listed_by} does not contain {name}"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{Error, ErrorKind};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::Root.to_string(), "root");
        assert_eq!(Role::Delegated("bins".to_owned()).as_str(), "bins");
    }

    #[test]
    fn threshold_met() {
        assert!(check_threshold(&Role::Root, 2, 2).is_ok());
        assert!(check_threshold(&Role::Root, 3, 2).is_ok());
    }

    #[test]
    fn threshold_one_of_two_is_unsigned() {
        let err = check_threshold(&Role::Root, 1, 2).unwrap_err();
        assert!(matches!(err, RepositoryError::UnsignedMetadata(_)));
        assert!(!matches!(err, RepositoryError::BadVersionNumber(_)));
        assert_eq!(err.message(), "root was signed by 1/2 keys");

        let err: Error = err.into();
        assert!(err.is_repository());
    }

    #[test]
    fn successor_rule() {
        assert!(check_version(&Role::Root, 4, VersionRule::Successor(3)).is_ok());
        let err = check_version(&Role::Root, 5, VersionRule::Successor(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadVersionNumber);
        assert_eq!(err.message(), "Expected root version 4 instead got version 5");
    }

    #[test]
    fn successor_rule_at_max() {
        let err = check_version(&Role::Root, 0, VersionRule::Successor(u64::MAX)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadVersionNumber);
    }

    #[test]
    fn at_least_rule() {
        assert!(check_version(&Role::Timestamp, 7, VersionRule::AtLeast(7)).is_ok());
        assert!(check_version(&Role::Timestamp, 8, VersionRule::AtLeast(7)).is_ok());
        let err = check_version(&Role::Timestamp, 6, VersionRule::AtLeast(7)).unwrap_err();
        assert!(matches!(err, RepositoryError::BadVersionNumber(_)));
    }

    #[test]
    fn exact_rule() {
        assert!(check_version(&Role::Targets, 12, VersionRule::Exact(12)).is_ok());
        let err = check_version(&Role::Targets, 13, VersionRule::Exact(12)).unwrap_err();
        assert_eq!(err.message(), "Expected targets version 12, got 13");
    }

    #[test]
    fn expiry_boundary_is_expired() {
        let err = check_expiry(&Role::Timestamp, t0(), t0()).unwrap_err();
        assert!(matches!(err, RepositoryError::ExpiredMetadata(_)));
        assert_eq!(
            err.message(),
            "timestamp metadata expired at 2030-01-01T00:00:00Z"
        );
    }

    #[test]
    fn expiry_in_future_ok() {
        assert!(check_expiry(&Role::Snapshot, t0(), t0() - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn expiry_in_past_expired() {
        let err = check_expiry(&Role::Snapshot, t0(), t0() + Duration::days(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpiredMetadata);
    }

    #[test]
    fn require_meta_present_and_missing() {
        let mut meta = HashMap::new();
        meta.insert("snapshot.json".to_owned(), 3u64);

        assert_eq!(*require_meta(&meta, &Role::Timestamp, "snapshot.json").unwrap(), 3);

        let err = require_meta(&meta, &Role::Snapshot, "targets.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Repository);
        assert_eq!(err.message(), "snapshot does not contain targets.json");
    }
}
