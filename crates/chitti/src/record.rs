//! Per-cycle evidence records.
//!
//! A [`CycleRecord`] is the only artifact a perception cycle leaves behind.
//! It carries the description text and timings but never frame bytes.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::audit::AuditRecord;
use crate::inference::DescriptionResult;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Serialize a duration as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Convert a byte count to gigabytes (1024^3 bytes).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_gb(bytes: i64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Format a byte count as gigabytes with three decimals.
#[must_use]
pub fn format_gb(bytes: i64) -> String {
    format!("{:.3} GB", bytes_to_gb(bytes))
}

/// A step of the perception cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStep {
    /// Reading a frame into volatile storage.
    Capture,
    /// Describing the frame.
    Inference,
    /// Speaking the description.
    Speech,
    /// Deleting the frame.
    Purge,
    /// Measuring persistent storage.
    Audit,
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Capture => "capture",
            Self::Inference => "inference",
            Self::Speech => "speech",
            Self::Purge => "purge",
            Self::Audit => "audit",
        };
        f.write_str(name)
    }
}

/// A non-fatal failure folded into a cycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    /// Step that failed.
    pub step: CycleStep,
    /// What went wrong.
    pub message: String,
}

impl StepError {
    /// Create a step error.
    #[must_use]
    pub fn new(step: CycleStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

/// Outcome of one perception cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    /// When the cycle started.
    pub timestamp: DateTime<Utc>,
    /// Whether a frame reached volatile storage.
    pub capture_success: bool,
    /// The description, if inference succeeded.
    pub description: Option<DescriptionResult>,
    /// Whether the description was spoken.
    pub speech_success: bool,
    /// Retention audit for this cycle.
    pub audit: AuditRecord,
    /// Wall-clock duration of the whole cycle.
    #[serde(rename = "total_latency_secs", serialize_with = "serialize_secs")]
    pub total_latency: Duration,
    /// Step failures, in the order they occurred.
    pub errors: Vec<StepError>,
}

impl CycleRecord {
    /// Whether zero retention held for this cycle.
    #[must_use]
    pub fn retention_verified(&self) -> bool {
        self.audit.retention_verified
    }

    /// Whether every step succeeded and retention held.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.capture_success
            && self.description.is_some()
            && self.speech_success
            && self.audit.is_clean()
            && self.errors.is_empty()
    }

    /// Inference latency, if a description was produced.
    #[must_use]
    pub fn inference_latency(&self) -> Option<Duration> {
        self.description.as_ref().map(|d| d.latency)
    }
}
