//! Error types for chitti.
//!
//! This module defines the crate-level error type plus the closed error sets
//! each perception component reports. The orchestrator matches on these kinds
//! to decide whether a failure is folded into the cycle record or aborts the
//! cycle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for chitti operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Volatile Storage Errors ===
    /// The volatile root is not on a RAM-backed filesystem.
    #[error("volatile root {path} is not on a RAM-backed filesystem")]
    VolatileRootNotRamBacked {
        /// The configured volatile root.
        path: PathBuf,
    },

    // === Component Errors ===
    /// The capture device or frame source failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The description service failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The retention auditor detected a state-machine or safety violation.
    #[error(transparent)]
    Audit(#[from] AuditError),

    // === Platform Errors ===
    /// Platform-specific operation failed.
    #[error("platform error: {0}")]
    Platform(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for chitti operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new platform error.
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}

/// Failures reported by the frame source.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture device could not be opened.
    #[error("capture device {device} unavailable: {message}")]
    DeviceUnavailable {
        /// Device node or identifier.
        device: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A frame could not be read or could not be written to volatile storage.
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    /// `capture()` was called before `open()` succeeded.
    #[error("capture device is not open")]
    DeviceNotOpen,
}

impl CaptureError {
    /// Create a device-unavailable error.
    #[must_use]
    pub fn device_unavailable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a capture-failed error.
    #[must_use]
    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::CaptureFailed(message.into())
    }
}

/// Failures reported by the description service.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The frame handle points outside the volatile root. Raised before any
    /// network traffic.
    #[error("invalid frame handle {path}: {reason}")]
    InvalidHandle {
        /// Location the handle pointed at.
        path: PathBuf,
        /// Why the handle was rejected.
        reason: String,
    },

    /// The frame inside the volatile root could not be read.
    #[error("frame {path} unreadable: {reason}")]
    FrameUnreadable {
        /// Location of the frame.
        path: PathBuf,
        /// Underlying I/O failure.
        reason: String,
    },

    /// No response arrived within the configured timeout.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    /// The remote service answered with a non-success status or an
    /// unusable body.
    #[error("inference service returned {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response detail.
        message: String,
    },

    /// The request never completed at the network level.
    #[error("inference transport failed: {0}")]
    Transport(String),
}

impl InferenceError {
    /// Whether this failure is a safety violation that must abort the cycle
    /// rather than be folded into the cycle record.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InvalidHandle { .. })
    }

    /// Short machine-readable label for the failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidHandle { .. } => "invalid_handle",
            Self::FrameUnreadable { .. } => "frame_unreadable",
            Self::Timeout(_) => "timeout",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport(_) => "transport_error",
        }
    }
}

/// Violations detected by the retention auditor.
#[derive(Error, Debug)]
pub enum AuditError {
    /// `complete_audit()` was called without a preceding `start_audit()`.
    #[error("audit not started: call start_audit() before complete_audit()")]
    AuditNotStarted,

    /// A purge was requested for a path outside the volatile root.
    #[error("purge rejected: {path} is outside the volatile root")]
    PurgeRejected {
        /// The offending path.
        path: PathBuf,
    },

    /// The persistent-storage usage probe failed.
    #[error("storage usage probe failed: {0}")]
    Probe(#[source] std::io::Error),
}
