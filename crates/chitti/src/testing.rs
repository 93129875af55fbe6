//! In-process fakes for the collaborator traits.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audit::UsageProbe;
use crate::capture::FrameDevice;
use crate::error::{CaptureError, InferenceError};
use crate::frame::VolatileFrameHandle;
use crate::inference::{DescriptionResult, Describer};
use crate::speech::Speaker;

/// Scripted camera.
#[derive(Debug)]
pub(crate) struct FakeDevice {
    available: bool,
    open: bool,
    frames: VecDeque<Result<Vec<u8>, String>>,
    repeat: Option<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            available: true,
            open: false,
            frames: VecDeque::new(),
            repeat: None,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A device whose `open` always fails.
    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub(crate) fn with_frame(mut self, frame: &[u8]) -> Self {
        self.frames.push_back(Ok(frame.to_vec()));
        self
    }

    pub(crate) fn with_read_failure(mut self) -> Self {
        self.frames.push_back(Err("no frame".to_string()));
        self
    }

    /// Frame returned once the scripted queue is exhausted.
    pub(crate) fn repeating(mut self, frame: &[u8]) -> Self {
        self.repeat = Some(frame.to_vec());
        self
    }

    pub(crate) fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait::async_trait]
impl FrameDevice for FakeDevice {
    fn name(&self) -> String {
        "fake".to_string()
    }

    fn open(&mut self) -> Result<(), CaptureError> {
        if !self.available {
            return Err(CaptureError::device_unavailable("fake", "unplugged"));
        }
        self.open = true;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.open {
            return Err(CaptureError::DeviceNotOpen);
        }
        match self.frames.pop_front() {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(message)) => Err(CaptureError::capture_failed(message)),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| CaptureError::capture_failed("no frames left")),
        }
    }

    fn close(&mut self) {
        self.open = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Scripted describer. Falls back to a fixed description once the script
/// runs out.
#[derive(Debug)]
pub(crate) struct FakeDescriber {
    script: Mutex<VecDeque<Result<DescriptionResult, InferenceError>>>,
    fallback: String,
    latency: Duration,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeDescriber {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: text.to_string(),
            latency: Duration::from_millis(800),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing_with(self, err: InferenceError) -> Self {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Err(err));
        self
    }

    /// Sleep for `delay` before answering, honouring the caller's timeout.
    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl Describer for FakeDescriber {
    async fn infer(
        &self,
        handle: &VolatileFrameHandle,
        _prompt: &str,
        timeout: Duration,
    ) -> Result<DescriptionResult, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !handle.path.exists() {
            return Err(InferenceError::FrameUnreadable {
                path: handle.path.clone(),
                reason: "missing".to_string(),
            });
        }
        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(InferenceError::Timeout(timeout));
        }
        tokio::time::sleep(self.delay).await;

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(DescriptionResult {
                text: self.fallback.clone(),
                latency: self.latency,
                model: "fake-vlm".to_string(),
            })
        })
    }
}

/// Speaker that records what it was asked to say.
#[derive(Debug)]
pub(crate) struct FakeSpeaker {
    succeeds: bool,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl FakeSpeaker {
    pub(crate) fn working() -> Self {
        Self {
            succeeds: true,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn broken() -> Self {
        Self {
            succeeds: false,
            ..Self::working()
        }
    }

    pub(crate) fn spoken(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

#[async_trait::async_trait]
impl Speaker for FakeSpeaker {
    async fn speak(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.spoken
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_string());
        self.succeeds
    }
}

/// Usage probe replaying a sequence of readings; the last one repeats.
#[derive(Debug)]
pub(crate) struct FakeProbe {
    readings: Mutex<VecDeque<u64>>,
    last: Mutex<Option<u64>>,
    fails: bool,
}

impl FakeProbe {
    pub(crate) fn sequence(readings: impl IntoIterator<Item = u64>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(None),
            fails: false,
        }
    }

    pub(crate) fn constant(used: u64) -> Self {
        Self::sequence([used])
    }

    pub(crate) fn failing() -> Self {
        Self {
            fails: true,
            ..Self::sequence([])
        }
    }
}

impl UsageProbe for FakeProbe {
    fn used_bytes(&self) -> io::Result<u64> {
        if self.fails {
            return Err(io::Error::new(io::ErrorKind::Other, "probe offline"));
        }
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let next = self
            .readings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no readings"))
    }

    fn describe(&self) -> String {
        "fake volume".to_string()
    }
}
