//! `chitti` - A zero-retention edge perception loop
//!
//! This library captures a camera frame into RAM-backed storage, describes it
//! with a remote vision-language model, speaks the description, deletes the
//! frame and certifies from persistent-storage usage that nothing was written
//! to disk during the cycle.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod audit;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod inference;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod shutdown;
pub mod speech;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditRecord, PurgeOutcome, RetentionAuditor, UsageProbe, VolumeUsageProbe};
pub use capture::{FfmpegDevice, FrameDevice, FrameSource};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{VolatileFrameHandle, VolatileRoot};
pub use inference::{DescriptionResult, Describer, VlmClient};
pub use logging::init_logging;
pub use pipeline::{PerceptionPipeline, PipelineSettings, RunSummary};
pub use record::CycleRecord;
pub use shutdown::StopHandle;
pub use speech::{EspeakSpeaker, Speaker};
