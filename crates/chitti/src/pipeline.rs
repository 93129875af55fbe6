//! The perception cycle: capture, describe, speak, purge, audit.
//!
//! Every cycle converges on the retention audit. Step failures (no frame,
//! inference timeout, upstream error, silent speaker) are folded into the
//! [`CycleRecord`]; safety violations (a handle outside the volatile root, an
//! audit that can't be measured) abort the cycle after a best-effort
//! emergency purge and produce no record at all.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::audit::RetentionAuditor;
use crate::capture::FrameSource;
use crate::config::Config;
use crate::error::Result;
use crate::inference::Describer;
use crate::record::{CycleRecord, CycleStep, StepError};
use crate::shutdown::StopHandle;
use crate::speech::Speaker;

/// Tunables for the cycle and the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Prompt sent with every frame.
    pub prompt: String,
    /// Bound on each inference call.
    pub inference_timeout: Duration,
    /// Pause between cycles in continuous mode.
    pub cycle_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    /// Take the settings from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt: config.inference.prompt.clone(),
            inference_timeout: config.inference_timeout(),
            cycle_delay: config.cycle_delay(),
        }
    }
}

/// Totals for a continuous run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Cycles attempted.
    pub cycles_run: u64,
    /// Cycles that could not be accounted for and produced no record.
    pub cycles_failed: u64,
    /// Recorded cycles whose audit found persistent growth.
    pub retention_violations: u64,
    /// Whether the loop ended on a stop signal.
    pub interrupted: bool,
}

impl RunSummary {
    /// Cycles that produced a record.
    #[must_use]
    pub fn cycles_recorded(&self) -> u64 {
        self.cycles_run - self.cycles_failed
    }
}

/// Everything a cycle needs besides the frame source.
struct Stages {
    describer: Box<dyn Describer>,
    speaker: Box<dyn Speaker>,
    auditor: RetentionAuditor,
    prompt: String,
    inference_timeout: Duration,
}

impl Stages {
    async fn run_cycle(&mut self, source: &mut FrameSource) -> Option<CycleRecord> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let mut errors = Vec::new();

        // The baseline comes first so the whole cycle sits inside the audit window.
        if let Err(e) = self.auditor.start_audit() {
            error!(error = %e, "Cycle aborted: audit could not start");
            self.auditor.emergency_purge(source.slot());
            return None;
        }

        let handle = match source.capture().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                errors.push(StepError::new(CycleStep::Capture, e.to_string()));
                None
            }
        };

        let mut description = None;
        if let Some(handle) = &handle {
            match self
                .describer
                .infer(handle, &self.prompt, self.inference_timeout)
                .await
            {
                Ok(result) => description = Some(result),
                Err(e) if e.is_defect() => {
                    error!(error = %e, kind = e.kind(), "Cycle aborted");
                    self.auditor.emergency_purge(source.slot());
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "Inference failed; skipping speech");
                    errors.push(StepError::new(CycleStep::Inference, e.to_string()));
                }
            }
        }

        let speech_success = match &description {
            Some(result) if result.text.trim().is_empty() => {
                warn!("No description to speak");
                false
            }
            Some(result) => {
                let spoken = self.speaker.speak(&result.text).await;
                if !spoken {
                    errors.push(StepError::new(CycleStep::Speech, "speech output failed"));
                }
                spoken
            }
            None => false,
        };

        let audit = match self.auditor.enforce_cycle(handle.as_ref()) {
            Ok(audit) => audit,
            Err(e) => {
                error!(error = %e, "Cycle aborted: audit failed");
                self.auditor.emergency_purge(source.slot());
                return None;
            }
        };

        if !audit.purge_succeeded {
            errors.push(StepError::new(CycleStep::Purge, "frame purge failed"));
        }
        if !audit.retention_verified {
            errors.push(StepError::new(
                CycleStep::Audit,
                format!("persistent usage grew by {} bytes", audit.delta_bytes),
            ));
        }

        let record = CycleRecord {
            timestamp,
            capture_success: handle.is_some(),
            description,
            speech_success,
            audit,
            total_latency: started.elapsed(),
            errors,
        };

        info!(
            capture = record.capture_success,
            described = record.description.is_some(),
            spoken = record.speech_success,
            retention_verified = record.retention_verified(),
            total_ms = record.total_latency.as_millis(),
            errors = record.errors.len(),
            "Cycle complete"
        );
        Some(record)
    }
}

/// Composes the perception components into cycles and a run loop.
///
/// The pipeline owns the frame source, so only one pipeline can drive a
/// device and cycles never overlap.
pub struct PerceptionPipeline {
    source: FrameSource,
    stages: Stages,
    cycle_delay: Duration,
}

impl std::fmt::Debug for PerceptionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptionPipeline")
            .field("source", &self.source)
            .field("auditor", &self.stages.auditor)
            .field("cycle_delay", &self.cycle_delay)
            .finish_non_exhaustive()
    }
}

impl PerceptionPipeline {
    /// Assemble a pipeline from its components.
    #[must_use]
    pub fn new(
        source: FrameSource,
        describer: Box<dyn Describer>,
        speaker: Box<dyn Speaker>,
        auditor: RetentionAuditor,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            stages: Stages {
                describer,
                speaker,
                auditor,
                prompt: settings.prompt,
                inference_timeout: settings.inference_timeout,
            },
            cycle_delay: settings.cycle_delay,
        }
    }

    /// Run one cycle against an already-open device.
    ///
    /// Returns `None` when the cycle hit a safety violation and could not be
    /// accounted for.
    pub async fn run_cycle(&mut self) -> Option<CycleRecord> {
        self.stages.run_cycle(&mut self.source).await
    }

    /// Acquire the device, run one cycle, release the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device can't be opened. The device is released
    /// on every path.
    pub async fn run_single_cycle(&mut self) -> Result<Option<CycleRecord>> {
        let mut lease = self.source.lease()?;
        Ok(self.stages.run_cycle(&mut lease).await)
    }

    /// Acquire the device once and run cycles until `max_cycles` records have
    /// been produced or `stop` is signalled.
    ///
    /// Cycles that end without a record don't count toward `max_cycles`.
    ///
    /// `on_cycle` is called after every cycle with its 1-based number and its
    /// record, if any. A stop signal interrupts the inter-cycle delay but
    /// never a running cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device can't be opened. The device is released
    /// on every path.
    pub async fn run_continuous<F>(
        &mut self,
        max_cycles: Option<u64>,
        stop: &StopHandle,
        mut on_cycle: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(u64, Option<&CycleRecord>),
    {
        let delay = self.cycle_delay;
        let mut lease = self.source.lease()?;
        let mut summary = RunSummary::default();

        info!(
            max_cycles = %max_cycles.map_or_else(|| "unlimited".to_string(), |n| n.to_string()),
            delay_ms = delay.as_millis(),
            "Continuous mode started"
        );

        loop {
            if stop.should_stop() {
                summary.interrupted = true;
                break;
            }
            if max_cycles.is_some_and(|max| summary.cycles_recorded() >= max) {
                break;
            }

            summary.cycles_run += 1;
            info!(cycle = summary.cycles_run, "Cycle started");

            let record = self.stages.run_cycle(&mut lease).await;
            match &record {
                Some(record) if !record.retention_verified() => summary.retention_violations += 1,
                Some(_) => {}
                None => summary.cycles_failed += 1,
            }
            on_cycle(summary.cycles_run, record.as_ref());

            if max_cycles.is_some_and(|max| summary.cycles_recorded() >= max) {
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = stop.stopped() => {
                    summary.interrupted = true;
                    break;
                }
            }
        }

        drop(lease);
        info!(
            cycles_run = summary.cycles_run,
            cycles_failed = summary.cycles_failed,
            retention_violations = summary.retention_violations,
            interrupted = summary.interrupted,
            "Continuous mode stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::{CaptureError, Error, InferenceError};
    use crate::frame::VolatileRoot;
    use crate::testing::{FakeDescriber, FakeDevice, FakeProbe, FakeSpeaker};

    const GB: u64 = 1024 * 1024 * 1024;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            prompt: "Describe what you see.".to_string(),
            inference_timeout: Duration::from_secs(1),
            cycle_delay: Duration::from_millis(1),
        }
    }

    fn pipeline_with(
        dir: &Path,
        device: FakeDevice,
        describer: Box<dyn Describer>,
        speaker: Box<dyn Speaker>,
        probe: FakeProbe,
    ) -> PerceptionPipeline {
        let root = VolatileRoot::new(dir);
        let source = FrameSource::new(Box::new(device), root.clone(), "frame.jpg").unwrap();
        let auditor = RetentionAuditor::new(Box::new(probe), root);
        PerceptionPipeline::new(source, describer, speaker, auditor, settings())
    }

    fn pipeline(
        dir: &Path,
        device: FakeDevice,
        describer: FakeDescriber,
        speaker: FakeSpeaker,
    ) -> PerceptionPipeline {
        pipeline_with(
            dir,
            device,
            Box::new(describer),
            Box::new(speaker),
            FakeProbe::constant(10 * GB),
        )
    }

    /// Replaces the frame with a directory while "speaking", so the purge
    /// that follows fails.
    struct SabotagingSpeaker {
        slot: PathBuf,
    }

    #[async_trait::async_trait]
    impl Speaker for SabotagingSpeaker {
        async fn speak(&self, _text: &str) -> bool {
            std::fs::remove_file(&self.slot).unwrap();
            std::fs::create_dir(&self.slot).unwrap();
            true
        }
    }

    #[tokio::test]
    async fn test_happy_path_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let speaker = FakeSpeaker::working();
        let spoken = speaker.spoken();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            FakeDescriber::replying("a red chair"),
            speaker,
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(record.capture_success);
        let description = record.description.as_ref().unwrap();
        assert_eq!(description.text, "a red chair");
        assert_eq!(description.latency, Duration::from_millis(800));
        assert!(record.speech_success);
        assert!(record.audit.retention_verified);
        assert!(record.audit.purge_succeeded);
        assert!(record.errors.is_empty());
        assert!(record.is_complete());
        assert_eq!(*spoken.lock().unwrap(), ["a red chair"]);
        assert!(!dir.path().join("frame.jpg").exists());
    }

    #[tokio::test]
    async fn test_capture_failure_still_audits() {
        let dir = tempfile::tempdir().unwrap();
        let describer = FakeDescriber::replying("unused");
        let calls = describer.call_count();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_read_failure(),
            describer,
            FakeSpeaker::working(),
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(!record.capture_success);
        assert!(record.description.is_none());
        assert!(!record.speech_success);
        assert!(record.audit.retention_verified);
        assert!(record.audit.purge_succeeded);
        assert_eq!(record.errors[0].step, CycleStep::Capture);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inference_timeout_skips_speech() {
        let dir = tempfile::tempdir().unwrap();
        let speaker = FakeSpeaker::working();
        let spoken = speaker.spoken();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            FakeDescriber::replying("late").slow(Duration::from_secs(5)),
            speaker,
        );
        pipeline.stages.inference_timeout = Duration::from_millis(50);

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(record.capture_success);
        assert!(record.description.is_none());
        assert!(!record.speech_success);
        assert!(record.audit.retention_verified);
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.errors[0].step, CycleStep::Inference);
        assert!(spoken.lock().unwrap().is_empty());
        assert!(!dir.path().join("frame.jpg").exists());
    }

    #[tokio::test]
    async fn test_purge_failure_is_reported_in_record() {
        let dir = tempfile::tempdir().unwrap();
        let slot = dir.path().join("frame.jpg");
        let mut pipeline = pipeline_with(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            Box::new(FakeDescriber::replying("a lamp")),
            Box::new(SabotagingSpeaker { slot }),
            FakeProbe::constant(10 * GB),
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(!record.audit.purge_succeeded);
        assert!(record.audit.retention_verified);
        assert!(record.errors.iter().any(|e| e.step == CycleStep::Purge));
        assert!(!record.is_complete());
    }

    #[tokio::test]
    async fn test_every_failure_point_has_full_audit() {
        let failure_points: Vec<(&str, FakeDevice, FakeDescriber, FakeSpeaker)> = vec![
            (
                "capture",
                FakeDevice::new().with_read_failure(),
                FakeDescriber::replying("x"),
                FakeSpeaker::working(),
            ),
            (
                "timeout",
                FakeDevice::new().with_frame(b"jpeg"),
                FakeDescriber::replying("x")
                    .failing_with(InferenceError::Timeout(Duration::from_secs(1))),
                FakeSpeaker::working(),
            ),
            (
                "upstream",
                FakeDevice::new().with_frame(b"jpeg"),
                FakeDescriber::replying("x").failing_with(InferenceError::Upstream {
                    status: 500,
                    message: "boom".to_string(),
                }),
                FakeSpeaker::working(),
            ),
            (
                "transport",
                FakeDevice::new().with_frame(b"jpeg"),
                FakeDescriber::replying("x")
                    .failing_with(InferenceError::Transport("refused".to_string())),
                FakeSpeaker::working(),
            ),
            (
                "unreadable frame",
                FakeDevice::new().with_frame(b"jpeg"),
                FakeDescriber::replying("x").failing_with(InferenceError::FrameUnreadable {
                    path: PathBuf::from("/dev/shm/chitti/frame.jpg"),
                    reason: "permission denied".to_string(),
                }),
                FakeSpeaker::working(),
            ),
            (
                "speech",
                FakeDevice::new().with_frame(b"jpeg"),
                FakeDescriber::replying("a cup"),
                FakeSpeaker::broken(),
            ),
        ];

        for (name, device, describer, speaker) in failure_points {
            let dir = tempfile::tempdir().unwrap();
            let mut pipeline = pipeline_with(
                dir.path(),
                device,
                Box::new(describer),
                Box::new(speaker),
                FakeProbe::sequence([7 * GB, 7 * GB - 4096]),
            );

            let record = pipeline
                .run_single_cycle()
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("{name}: cycle produced no record"));

            assert_eq!(record.audit.baseline_used_bytes, 7 * GB, "{name}");
            assert_eq!(record.audit.final_used_bytes, 7 * GB - 4096, "{name}");
            assert!(record.audit.retention_verified, "{name}");
            assert!(!record.errors.is_empty(), "{name}");
            assert!(!dir.path().join("frame.jpg").exists(), "{name}");
        }
    }

    #[tokio::test]
    async fn test_speech_failure_keeps_description() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            FakeDescriber::replying("a cup"),
            FakeSpeaker::broken(),
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(record.description.is_some());
        assert!(!record.speech_success);
        assert_eq!(record.errors[0].step, CycleStep::Speech);
        assert!(record.audit.is_clean());
    }

    #[tokio::test]
    async fn test_blank_description_skips_speech() {
        let dir = tempfile::tempdir().unwrap();
        let speaker = FakeSpeaker::working();
        let spoken = speaker.spoken();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            FakeDescriber::replying("  \n "),
            speaker,
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(record.description.is_some());
        assert!(!record.speech_success);
        assert!(record.errors.is_empty());
        assert!(spoken.lock().unwrap().is_empty());
        assert!(record.audit.is_clean());
    }

    #[tokio::test]
    async fn test_invalid_handle_aborts_cycle_with_emergency_purge() {
        let dir = tempfile::tempdir().unwrap();
        let describer = FakeDescriber::replying("x").failing_with(InferenceError::InvalidHandle {
            path: PathBuf::from("/home/robot/frame.jpg"),
            reason: "outside volatile root".to_string(),
        });
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            describer,
            FakeSpeaker::working(),
        );

        let record = pipeline.run_single_cycle().await.unwrap();

        assert!(record.is_none());
        assert!(!dir.path().join("frame.jpg").exists());
        assert!(!pipeline.source.is_open());
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline_with(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            Box::new(FakeDescriber::replying("x")),
            Box::new(FakeSpeaker::working()),
            FakeProbe::failing(),
        );

        assert!(pipeline.run_single_cycle().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_growth_is_a_retention_violation() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline_with(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            Box::new(FakeDescriber::replying("a door")),
            Box::new(FakeSpeaker::working()),
            FakeProbe::sequence([GB, GB + 4096]),
        );

        let record = pipeline.run_single_cycle().await.unwrap().unwrap();

        assert!(!record.retention_verified());
        assert_eq!(record.audit.delta_bytes, 4096);
        assert!(record.errors.iter().any(|e| e.step == CycleStep::Audit));
    }

    #[tokio::test]
    async fn test_single_cycle_releases_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new().with_frame(b"jpeg");
        let closes = device.close_count();
        let mut pipeline = pipeline(
            dir.path(),
            device,
            FakeDescriber::replying("a plant"),
            FakeSpeaker::working(),
        );

        pipeline.run_single_cycle().await.unwrap();

        assert!(!pipeline.source.is_open());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_cycle_device_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::unavailable();
        let closes = device.close_count();
        let mut pipeline = pipeline(
            dir.path(),
            device,
            FakeDescriber::replying("x"),
            FakeSpeaker::working(),
        );

        let err = pipeline.run_single_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Capture(CaptureError::DeviceUnavailable { .. })
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_cycle_requires_open_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().with_frame(b"jpeg"),
            FakeDescriber::replying("x"),
            FakeSpeaker::working(),
        );

        let record = pipeline.run_cycle().await.unwrap();
        assert!(!record.capture_success);
        assert!(record.errors[0].message.contains("not open"));
    }

    #[tokio::test]
    async fn test_continuous_stops_at_max_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new().repeating(b"jpeg");
        let closes = device.close_count();
        let mut pipeline = pipeline(
            dir.path(),
            device,
            FakeDescriber::replying("a window"),
            FakeSpeaker::working(),
        );
        let stop = StopHandle::new();
        let mut seen = Vec::new();

        let summary = pipeline
            .run_continuous(Some(3), &stop, |n, record| seen.push((n, record.is_some())))
            .await
            .unwrap();

        assert_eq!(summary.cycles_run, 3);
        assert_eq!(summary.cycles_failed, 0);
        assert_eq!(summary.cycles_recorded(), 3);
        assert!(!summary.interrupted);
        assert_eq!(seen, [(1, true), (2, true), (3, true)]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!pipeline.source.is_open());
    }

    #[tokio::test]
    async fn test_continuous_max_cycles_counts_only_recorded_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let describer = FakeDescriber::replying("x").failing_with(InferenceError::InvalidHandle {
            path: PathBuf::from("/tmp/frame.jpg"),
            reason: "outside volatile root".to_string(),
        });
        let mut pipeline = pipeline(
            dir.path(),
            FakeDevice::new().repeating(b"jpeg"),
            describer,
            FakeSpeaker::working(),
        );
        let mut seen = Vec::new();

        let summary = pipeline
            .run_continuous(Some(2), &StopHandle::new(), |n, record| {
                seen.push((n, record.is_some()));
            })
            .await
            .unwrap();

        assert_eq!(summary.cycles_run, 3);
        assert_eq!(summary.cycles_failed, 1);
        assert_eq!(summary.cycles_recorded(), 2);
        assert_eq!(seen, [(1, false), (2, true), (3, true)]);
    }

    #[tokio::test]
    async fn test_stop_interrupts_delay() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new().repeating(b"jpeg");
        let closes = device.close_count();
        let mut pipeline = pipeline(
            dir.path(),
            device,
            FakeDescriber::replying("a hallway"),
            FakeSpeaker::working(),
        );
        pipeline.cycle_delay = Duration::from_secs(60);

        let stop = StopHandle::new();
        let stopper = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.stop();
        });

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run_continuous(None, &stop, |_, _| {}),
        )
        .await
        .expect("stop signal should interrupt the delay")
        .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.cycles_run, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_before_first_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new().repeating(b"jpeg");
        let closes = device.close_count();
        let mut pipeline = pipeline(
            dir.path(),
            device,
            FakeDescriber::replying("x"),
            FakeSpeaker::working(),
        );
        let stop = StopHandle::new();
        stop.stop();

        let summary = pipeline.run_continuous(None, &stop, |_, _| {}).await.unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.cycles_run, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::default();
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.prompt, config.inference.prompt);
        assert_eq!(settings.inference_timeout, Duration::from_secs(30));
        assert_eq!(settings.cycle_delay, Duration::from_millis(100));
    }
}
