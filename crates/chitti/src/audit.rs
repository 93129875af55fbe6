//! Zero-retention enforcement and audit.
//!
//! The [`RetentionAuditor`] owns the non-persistence guarantee. Each cycle it
//! measures persistent-storage usage, deletes the volatile frame, measures
//! again and certifies whether persistent usage grew.
//!
//! The per-cycle state machine is `Idle -> Started -> Purged -> Completed`.
//! The baseline lives only inside the `Started`/`Purged` states, so it cannot
//! leak into the next cycle.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::AuditError;
use crate::frame::{VolatileFrameHandle, VolatileRoot};
use crate::record::{bytes_to_gb, format_gb};

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Reports bytes used on the persistent volume.
pub trait UsageProbe: Send + Sync {
    /// Bytes currently in use.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume can't be measured.
    fn used_bytes(&self) -> io::Result<u64>;

    /// What is being measured, for logging.
    fn describe(&self) -> String;
}

/// Usage probe for the filesystem holding a mount point.
#[derive(Debug, Clone)]
pub struct VolumeUsageProbe {
    mount_point: PathBuf,
}

impl VolumeUsageProbe {
    /// Probe the volume holding `mount_point`.
    #[must_use]
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }
}

impl UsageProbe for VolumeUsageProbe {
    #[cfg(target_os = "linux")]
    fn used_bytes(&self) -> io::Result<u64> {
        chitti_linux::volume_usage(&self.mount_point).map(|usage| usage.used_bytes)
    }

    #[cfg(not(target_os = "linux"))]
    fn used_bytes(&self) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "volume usage probing is only supported on Linux",
        ))
    }

    fn describe(&self) -> String {
        self.mount_point.display().to_string()
    }
}

/// What a purge did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PurgeOutcome {
    /// The frame file was deleted.
    Removed,
    /// The frame file was already gone.
    AlreadyAbsent,
    /// There was no frame to purge.
    NothingToPurge,
    /// Deletion failed; the frame may still exist.
    Failed(String),
}

impl PurgeOutcome {
    /// Whether the frame is known to be gone.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Audit verdict for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Persistent usage when the audit started.
    pub baseline_used_bytes: u64,
    /// Persistent usage when the audit completed.
    pub final_used_bytes: u64,
    /// `final - baseline`; negative when usage shrank.
    pub delta_bytes: i64,
    /// Whether every purge in the audit window succeeded.
    pub purge_succeeded: bool,
    /// Whether persistent usage did not grow.
    pub retention_verified: bool,
}

impl AuditRecord {
    /// Build a record from two measurements.
    ///
    /// Verification depends on the byte delta alone; a failed purge is
    /// reported through `purge_succeeded` but doesn't change the verdict.
    #[must_use]
    pub fn new(baseline_used_bytes: u64, final_used_bytes: u64, purge_succeeded: bool) -> Self {
        let delta_bytes = signed_delta(baseline_used_bytes, final_used_bytes);
        Self {
            baseline_used_bytes,
            final_used_bytes,
            delta_bytes,
            purge_succeeded,
            retention_verified: delta_bytes <= 0,
        }
    }

    /// Retention verified and the frame confirmed gone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.retention_verified && self.purge_succeeded
    }

    /// Baseline usage in GB.
    #[must_use]
    pub fn baseline_gb(&self) -> f64 {
        bytes_to_gb(i64::try_from(self.baseline_used_bytes).unwrap_or(i64::MAX))
    }

    /// Final usage in GB.
    #[must_use]
    pub fn final_gb(&self) -> f64 {
        bytes_to_gb(i64::try_from(self.final_used_bytes).unwrap_or(i64::MAX))
    }

    /// Usage delta in GB.
    #[must_use]
    pub fn delta_gb(&self) -> f64 {
        bytes_to_gb(self.delta_bytes)
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "baseline {:.3} GB, final {:.3} GB, delta {} ({} bytes): {}",
            self.baseline_gb(),
            self.final_gb(),
            format_gb(self.delta_bytes),
            self.delta_bytes,
            if self.retention_verified {
                "zero retention verified"
            } else {
                "RETENTION VIOLATION"
            }
        )
    }
}

fn signed_delta(baseline: u64, final_used: u64) -> i64 {
    if final_used >= baseline {
        i64::try_from(final_used - baseline).unwrap_or(i64::MAX)
    } else {
        i64::try_from(baseline - final_used).map_or(i64::MIN, |d| -d)
    }
}

/// Where the auditor is in its per-cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    /// No audit open.
    Idle,
    /// Baseline recorded.
    Started,
    /// At least one purge attempted since the baseline.
    Purged,
    /// Audit completed; a new one must be started.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuditState {
    Idle,
    Started { baseline: u64 },
    Purged { baseline: u64, purge_succeeded: bool },
    Completed,
}

/// Enforces and certifies zero retention, one cycle at a time.
pub struct RetentionAuditor {
    probe: Box<dyn UsageProbe>,
    root: VolatileRoot,
    state: AuditState,
}

impl fmt::Debug for RetentionAuditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionAuditor")
            .field("probe", &self.probe.describe())
            .field("root", &self.root)
            .field("state", &self.state)
            .finish()
    }
}

impl RetentionAuditor {
    /// Create an auditor that only purges inside `root`.
    #[must_use]
    pub fn new(probe: Box<dyn UsageProbe>, root: VolatileRoot) -> Self {
        info!(volume = %probe.describe(), root = %root.path().display(), "Retention auditor initialized");
        Self {
            probe,
            root,
            state: AuditState::Idle,
        }
    }

    /// Current phase of the state machine.
    #[must_use]
    pub fn phase(&self) -> AuditPhase {
        match self.state {
            AuditState::Idle => AuditPhase::Idle,
            AuditState::Started { .. } => AuditPhase::Started,
            AuditState::Purged { .. } => AuditPhase::Purged,
            AuditState::Completed => AuditPhase::Completed,
        }
    }

    /// Whether an audit is open (started but not completed).
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            AuditState::Started { .. } | AuditState::Purged { .. }
        )
    }

    fn measure(&self) -> Result<u64> {
        let used = self.probe.used_bytes().map_err(|e| {
            error!(volume = %self.probe.describe(), error = %e, "Storage usage probe failed");
            AuditError::Probe(e)
        })?;
        debug!(used_bytes = used, "Storage usage measured");
        Ok(used)
    }

    /// Begin an audit by recording the persistent-usage baseline.
    ///
    /// Always records a fresh baseline; an audit left open by an earlier
    /// cycle is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Probe`] if usage can't be measured. The auditor
    /// is left idle.
    pub fn start_audit(&mut self) -> Result<u64> {
        if self.is_open() {
            warn!("Discarding an audit that was never completed");
        }
        self.state = AuditState::Idle;

        let baseline = self.measure()?;
        self.state = AuditState::Started { baseline };

        info!(
            baseline_used_bytes = baseline,
            baseline_gb = bytes_to_gb(i64::try_from(baseline).unwrap_or(i64::MAX)),
            "Audit started"
        );
        Ok(baseline)
    }

    /// Delete the frame referenced by `handle`, if any.
    ///
    /// A missing file counts as success. Other deletion failures are
    /// returned as [`PurgeOutcome::Failed`], not raised. Within an open audit
    /// the outcome is recorded for [`complete_audit`](Self::complete_audit).
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::PurgeRejected`] if the handle is outside the
    /// volatile root. Nothing is deleted.
    pub fn purge(&mut self, handle: Option<&VolatileFrameHandle>) -> Result<PurgeOutcome> {
        let outcome = match handle {
            Some(handle) => self.purge_path(&handle.path)?,
            None => {
                debug!("No frame to purge");
                PurgeOutcome::NothingToPurge
            }
        };

        self.note_purge(outcome.is_success());
        Ok(outcome)
    }

    fn note_purge(&mut self, succeeded: bool) {
        self.state = match self.state {
            AuditState::Started { baseline } => AuditState::Purged {
                baseline,
                purge_succeeded: succeeded,
            },
            AuditState::Purged {
                baseline,
                purge_succeeded,
            } => AuditState::Purged {
                baseline,
                purge_succeeded: purge_succeeded && succeeded,
            },
            other => other,
        };
    }

    fn purge_path(&self, path: &Path) -> Result<PurgeOutcome> {
        if !self.root.contains(path) {
            error!(
                path = %path.display(),
                root = %self.root.path().display(),
                "Purge rejected: path is outside the volatile root"
            );
            return Err(AuditError::PurgeRejected {
                path: path.to_path_buf(),
            });
        }

        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Frame purged");
                Ok(PurgeOutcome::Removed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Frame already absent");
                Ok(PurgeOutcome::AlreadyAbsent)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Frame purge failed");
                Ok(PurgeOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Finish the open audit and certify the cycle.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AuditNotStarted`] if no audit is open and
    /// [`AuditError::Probe`] if usage can't be measured.
    pub fn complete_audit(&mut self) -> Result<AuditRecord> {
        let (baseline, purge_succeeded) = match self.state {
            AuditState::Started { baseline } => (baseline, true),
            AuditState::Purged {
                baseline,
                purge_succeeded,
            } => (baseline, purge_succeeded),
            AuditState::Idle | AuditState::Completed => {
                error!("complete_audit called without start_audit");
                return Err(AuditError::AuditNotStarted);
            }
        };

        let final_used = self.measure()?;
        self.state = AuditState::Completed;

        let record = AuditRecord::new(baseline, final_used, purge_succeeded);
        if record.retention_verified {
            info!(
                baseline_used_bytes = record.baseline_used_bytes,
                final_used_bytes = record.final_used_bytes,
                delta_bytes = record.delta_bytes,
                purge_succeeded,
                "Zero retention verified"
            );
        } else {
            warn!(
                baseline_used_bytes = record.baseline_used_bytes,
                final_used_bytes = record.final_used_bytes,
                delta_bytes = record.delta_bytes,
                purge_succeeded,
                "Zero retention violation"
            );
        }
        Ok(record)
    }

    /// Purge and certify in one call.
    ///
    /// Continues the open audit if there is one, otherwise starts a new one
    /// first, so the baseline can be taken at the very start of a cycle.
    ///
    /// # Errors
    ///
    /// Propagates [`purge`](Self::purge) and
    /// [`complete_audit`](Self::complete_audit) errors.
    pub fn enforce_cycle(&mut self, handle: Option<&VolatileFrameHandle>) -> Result<AuditRecord> {
        if !self.is_open() {
            self.start_audit()?;
        }
        self.purge(handle)?;
        self.complete_audit()
    }

    /// Audit a purge of the frame slot itself, for leftovers from an
    /// interrupted run.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::PurgeRejected`] if `slot` is outside the
    /// volatile root, and propagates probe failures.
    pub fn enforce_slot(&mut self, slot: &Path) -> Result<AuditRecord> {
        self.start_audit()?;
        let outcome = match self.purge_path(slot) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = AuditState::Idle;
                return Err(e);
            }
        };
        debug!(?outcome, slot = %slot.display(), "Frame slot checked");
        self.note_purge(outcome.is_success());
        self.complete_audit()
    }

    /// Best-effort deletion of `path` after a cycle defect.
    ///
    /// Closes any open audit. Failures are logged and swallowed.
    pub fn emergency_purge(&mut self, path: &Path) {
        warn!(path = %path.display(), "Emergency purge");
        match self.purge_path(path) {
            Ok(PurgeOutcome::Failed(reason)) => {
                error!(path = %path.display(), %reason, "Emergency purge failed");
            }
            Ok(outcome) => debug!(?outcome, "Emergency purge finished"),
            Err(e) => error!(error = %e, "Emergency purge refused"),
        }
        self.state = AuditState::Idle;
    }
}
