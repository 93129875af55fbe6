//! Volatile frame storage.
//!
//! Frames only ever exist inside the volatile root, a directory on a
//! RAM-backed filesystem. Every component that accepts a
//! [`VolatileFrameHandle`] checks it against the root with
//! [`VolatileRoot::contains`] before touching the file.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The designated RAM-backed directory frames are confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileRoot {
    path: PathBuf,
}

impl VolatileRoot {
    /// Create a volatile root at the given directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file directly inside the root.
    #[must_use]
    pub fn slot(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Check whether `candidate` names a file strictly inside the root.
    ///
    /// The check is lexical: relative paths and paths containing `..` are
    /// rejected outright.
    #[must_use]
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.is_absolute()
            && !candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
            && candidate.starts_with(&self.path)
            && candidate != self.path
    }

    /// Create the root directory and optionally verify it is RAM-backed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or if
    /// `require_ram_backed` is set and the directory is not on tmpfs/ramfs.
    pub fn prepare(&self, require_ram_backed: bool) -> Result<()> {
        std::fs::create_dir_all(&self.path).map_err(|source| Error::DirectoryCreate {
            path: self.path.clone(),
            source,
        })?;

        if require_ram_backed {
            if !self.is_ram_backed()? {
                return Err(Error::VolatileRootNotRamBacked {
                    path: self.path.clone(),
                });
            }
            debug!(root = %self.path.display(), "Volatile root is RAM-backed");
        }

        info!(root = %self.path.display(), "Volatile root ready");
        Ok(())
    }

    /// Check whether the root directory lives on a RAM-backed filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table can't be consulted.
    #[cfg(target_os = "linux")]
    pub fn is_ram_backed(&self) -> Result<bool> {
        Ok(chitti_linux::is_ram_backed(&self.path)?)
    }

    /// Check whether the root directory lives on a RAM-backed filesystem.
    ///
    /// # Errors
    ///
    /// Always fails: this platform has no mount-table probe.
    #[cfg(not(target_os = "linux"))]
    pub fn is_ram_backed(&self) -> Result<bool> {
        Err(Error::platform(
            "RAM-backed volume detection is only supported on Linux",
        ))
    }
}

/// A reference to one frame held in volatile storage.
///
/// Created by the frame source, read once by the description service and
/// destroyed by the retention auditor. The bytes themselves are never held
/// by the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileFrameHandle {
    /// Location of the frame file.
    pub path: PathBuf,
    /// Size of the encoded frame.
    pub size_bytes: u64,
    /// When the frame was captured.
    pub captured_at: DateTime<Utc>,
    /// BLAKE3 digest of the encoded frame, for log correlation.
    pub digest: String,
}

impl VolatileFrameHandle {
    /// Describe a frame that was just written to `path`.
    #[must_use]
    pub fn new(path: PathBuf, frame: &[u8]) -> Self {
        Self {
            path,
            size_bytes: frame.len() as u64,
            captured_at: Utc::now(),
            digest: Self::compute_digest(frame),
        }
    }

    /// Compute the BLAKE3 digest of encoded frame bytes.
    #[must_use]
    pub fn compute_digest(frame: &[u8]) -> String {
        blake3::hash(frame).to_hex().to_string()
    }

    /// Short digest prefix for log lines.
    #[must_use]
    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}
