use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{Error, TargetInfo};

const METADATA_FILE: &str = "metadata.json";
const DATA_FILE: &str = "target";

/// Metadata stored alongside a cached target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Target name as listed in targets metadata (e.g. `"bins/tool.tar.gz"`).
    pub name: String,
    /// Length in bytes.
    pub length: u64,
    /// SHA-256 hex digest of the stored file.
    pub sha256: String,
    /// When the target was verified and stored.
    pub stored_at: DateTime<Utc>,
}

/// A verified target stored on disk.
#[derive(Debug, Clone)]
pub struct CachedTarget {
    /// Path to the stored file.
    pub path: PathBuf,
    /// Associated metadata.
    pub metadata: CacheMetadata,
}

impl CachedTarget {
    /// Reads the stored bytes.
    pub fn read(&self) -> Result<Vec<u8>, Error> {
        Ok(std::fs::read(&self.path)?)
    }

    /// Recomputes length and SHA-256 of the stored file and compares them
    /// against the metadata, streaming the file in 8 KiB chunks.
    ///
    /// Tampering is reported as [`tuf::Error::LengthOrHashMismatch`].
    pub fn verify_integrity(&self) -> Result<(), Error> {
        let file = std::fs::File::open(&self.path)?;
        let mut reader = std::io::BufReader::with_capacity(8192, file);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        let mut length = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            length += n as u64;
            hasher.update(&buf[..n]);
        }

        if length != self.metadata.length {
            return Err(tuf::Error::length_or_hash_mismatch(format!(
                "Cached {} has length {length}, expected {}",
                self.metadata.name, self.metadata.length
            ))
            .into());
        }

        let actual = hex::encode(hasher.finalize());
        if actual != self.metadata.sha256 {
            return Err(tuf::Error::length_or_hash_mismatch(format!(
                "Cached {} has sha256 {actual}, expected {}",
                self.metadata.name, self.metadata.sha256
            ))
            .into());
        }
        Ok(())
    }
}

/// Maps a target name to a single path component.
///
/// Names that cannot be stored safely are reported as an invalid repository.
pub(crate) fn entry_name(target_name: &str) -> Result<String, Error> {
    if target_name.is_empty() || target_name == "." || target_name == ".." {
        return Err(tuf::RepositoryError::invalid(format!(
            "target name {target_name:?} cannot be stored"
        ))
        .into());
    }
    Ok(target_name.replace('%', "%25").replace('/', "%2F"))
}

/// Loads a cached entry, checking it against the current target info.
///
/// An entry whose file fails integrity verification against its own
/// metadata is corrupted. An entry whose bytes do not match the length and
/// every digest listed in `expected` is outdated. Either way it is removed
/// and `None` is returned so a fresh download is triggered.
pub(crate) fn load_cached(
    entry_dir: &Path,
    expected: &TargetInfo,
) -> Result<Option<CachedTarget>, Error> {
    let Some(cached) = load_entry(entry_dir)? else {
        return Ok(None);
    };

    match cached.verify_integrity() {
        Ok(()) => {}
        Err(Error::Tuf(err)) => {
            warn!(
                path = %cached.path.display(),
                error = %err,
                "cached target integrity check failed, removing corrupted entry"
            );
            let _ = std::fs::remove_dir_all(entry_dir);
            return Ok(None);
        }
        Err(err) => return Err(err),
    }

    let data = cached.read()?;
    if let Err(err) = tuf::verify_length_and_hashes(&data, expected.length, &expected.hash_refs())
    {
        debug!(name = %expected.name, error = %err, "cached target outdated, removing");
        let _ = std::fs::remove_dir_all(entry_dir);
        return Ok(None);
    }

    Ok(Some(cached))
}

/// Loads a cached entry without verifying integrity.
fn load_entry(entry_dir: &Path) -> Result<Option<CachedTarget>, Error> {
    let metadata_path = entry_dir.join(METADATA_FILE);
    if !metadata_path.exists() {
        return Ok(None);
    }

    let metadata: CacheMetadata = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?;
    let path = entry_dir.join(DATA_FILE);

    if !path.exists() {
        return Ok(None);
    }

    Ok(Some(CachedTarget { path, metadata }))
}

/// Stores verified target bytes into the entry directory.
pub(crate) fn store(entry_dir: &Path, name: &str, data: &[u8]) -> Result<CachedTarget, Error> {
    std::fs::create_dir_all(entry_dir)?;
    let path = entry_dir.join(DATA_FILE);
    std::fs::write(&path, data)?;

    let metadata = CacheMetadata {
        name: name.to_owned(),
        length: data.len() as u64,
        sha256: hex::encode(Sha256::digest(data)),
        stored_at: Utc::now(),
    };

    std::fs::write(
        entry_dir.join(METADATA_FILE),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    Ok(CachedTarget { path, metadata })
}

/// Lists all cached targets under the cache root.
pub(crate) fn list_all(cache_dir: &Path) -> Result<Vec<CachedTarget>, Error> {
    let mut entries = Vec::new();

    if !cache_dir.exists() {
        return Ok(entries);
    }

    for entry in std::fs::read_dir(cache_dir)? {
        let entry_dir = entry?.path();
        if !entry_dir.is_dir() {
            continue;
        }
        if let Some(cached) = load_entry(&entry_dir)? {
            entries.push(cached);
        }
    }

    entries.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(entries)
}

/// Removes an entry. Returns whether anything was removed.
pub(crate) fn remove(entry_dir: &Path) -> Result<bool, Error> {
    if !entry_dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(entry_dir)?;
    Ok(true)
}
