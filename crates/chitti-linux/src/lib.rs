//! Linux-specific implementation for chitti
//!
//! This crate provides the filesystem probes chitti needs on Linux: byte usage
//! of the persistent volume (via `statvfs(3)`) and whether a directory lives on
//! a RAM-backed filesystem (via the kernel mount table).

#![cfg(target_os = "linux")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Kernel mount table for the calling process.
const MOUNTS_PATH: &str = "/proc/self/mounts";

/// Filesystem types whose contents never survive power loss.
const RAM_BACKED_FS_TYPES: &[&str] = &["tmpfs", "ramfs"];

/// Byte-level usage of a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeUsage {
    /// Total size of the volume.
    pub total_bytes: u64,
    /// Bytes in use (total minus free blocks).
    pub used_bytes: u64,
    /// Bytes available to unprivileged users.
    pub available_bytes: u64,
}

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mounted device or pseudo-filesystem name.
    pub source: String,
    /// Where the filesystem is mounted.
    pub mount_point: PathBuf,
    /// Filesystem type (e.g. `ext4`, `tmpfs`).
    pub fs_type: String,
}

impl MountEntry {
    /// Whether this filesystem is held entirely in RAM.
    #[must_use]
    pub fn is_ram_backed(&self) -> bool {
        RAM_BACKED_FS_TYPES.contains(&self.fs_type.as_str())
    }
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

/// Measure the usage of the volume containing `path`.
///
/// `used_bytes` follows the `df` convention: `(f_blocks - f_bfree) * f_frsize`.
///
/// # Errors
///
/// Returns an error if `path` contains a NUL byte or `statvfs` fails (for
/// example because the path does not exist).
#[allow(unsafe_code, clippy::useless_conversion)]
pub fn volume_usage(path: &Path) -> io::Result<VolumeUsage> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains an interior NUL byte",
        )
    })?;

    let mut stat = MaybeUninit::<libc::statvfs>::zeroed();
    // SAFETY: `c_path` is NUL-terminated and outlives the call; `stat` points
    // to writable memory large enough for a `statvfs` struct.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: statvfs returned 0, so the kernel filled the struct.
    let stat = unsafe { stat.assume_init() };

    let fragment = u64::from(stat.f_frsize);
    let blocks = u64::from(stat.f_blocks);
    let free = u64::from(stat.f_bfree);
    let available = u64::from(stat.f_bavail);

    Ok(VolumeUsage {
        total_bytes: blocks.saturating_mul(fragment),
        used_bytes: blocks.saturating_sub(free).saturating_mul(fragment),
        available_bytes: available.saturating_mul(fragment),
    })
}

/// Parse the contents of `/proc/self/mounts`.
///
/// Malformed lines are skipped.
#[must_use]
pub fn parse_mounts(table: &str) -> Vec<MountEntry> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: unescape_mount_field(source),
                mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Find the mount that contains `path` (longest matching mount point wins).
#[must_use]
pub fn find_mount<'a>(entries: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    entries
        .iter()
        .filter(|entry| path.starts_with(&entry.mount_point))
        .max_by_key(|entry| entry.mount_point.components().count())
}

/// Look up the mount containing `path` in the live mount table.
///
/// # Errors
///
/// Returns an error if `path` cannot be canonicalized or the mount table
/// cannot be read.
pub fn mount_for(path: &Path) -> io::Result<Option<MountEntry>> {
    let resolved = std::fs::canonicalize(path)?;
    let table = std::fs::read_to_string(MOUNTS_PATH)?;
    let entries = parse_mounts(&table);
    Ok(find_mount(&entries, &resolved).cloned())
}

/// Check whether `path` lives on a RAM-backed filesystem.
///
/// # Errors
///
/// Returns an error if the mount table lookup fails.
pub fn is_ram_backed(path: &Path) -> io::Result<bool> {
    Ok(mount_for(path)?.is_some_and(|entry| entry.is_ram_backed()))
}

/// Decode the octal escapes (`\040` etc.) the kernel uses in mount fields.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = decoded {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
