//! Length and hash checks for metadata files and targets.

use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, warn};

use crate::Error;

/// Hash algorithm named in metadata `hashes` maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Parses the algorithm name used in metadata (e.g. `"sha256"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the algorithm name used in metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Computes the lowercase hex digest of `data`.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

/// Checks that `data` is exactly `expected` bytes long.
pub fn verify_length(data: &[u8], expected: u64) -> Result<(), Error> {
    let observed = data.len() as u64;
    if observed != expected {
        warn!(observed, expected, "length mismatch");
        return Err(Error::length_or_hash_mismatch(format!(
            "Observed length {observed} does not match expected length {expected}"
        )));
    }
    Ok(())
}

/// Checks every listed digest against `data`.
///
/// Digests are compared case-insensitively. The first mismatch is reported.
pub fn verify_hashes(data: &[u8], expected: &[(HashAlgorithm, &str)]) -> Result<(), Error> {
    for (algorithm, expected) in expected {
        let observed = algorithm.digest_hex(data);
        if !observed.eq_ignore_ascii_case(expected) {
            warn!(algorithm = algorithm.name(), expected, observed = %observed, "hash mismatch");
            return Err(Error::length_or_hash_mismatch(format!(
                "Observed {} hash {observed} does not match expected hash {expected}",
                algorithm.name()
            )));
        }
    }
    debug!(count = expected.len(), "hashes verified");
    Ok(())
}

/// Checks length first, then hashes.
pub fn verify_length_and_hashes(
    data: &[u8],
    expected_length: u64,
    expected_hashes: &[(HashAlgorithm, &str)],
) -> Result<(), Error> {
    verify_length(data, expected_length)?;
    verify_hashes(data, expected_hashes)
}
