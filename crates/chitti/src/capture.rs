//! Frame acquisition.
//!
//! This module defines the [`FrameDevice`] trait for camera backends and the
//! [`FrameSource`] that turns device reads into frames held only in volatile
//! storage. A frame is written to exactly one place, the single slot inside
//! the volatile root; there is no fallback location.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::{CaptureError, Error, Result};
use crate::frame::{VolatileFrameHandle, VolatileRoot};

/// Upper bound on a single frame grab.
const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Write `frame` into the slot without following a symlink at the slot path.
///
/// A symlinked slot could land the frame on persistent storage.
async fn write_slot(slot: &Path, frame: &[u8]) -> std::result::Result<(), CaptureError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.custom_flags(libc::O_NOFOLLOW);

    let write = async {
        let mut file = options.open(slot).await?;
        file.write_all(frame).await?;
        file.flush().await
    };

    write.await.map_err(|e| {
        #[cfg(unix)]
        if e.raw_os_error() == Some(libc::ELOOP) {
            return CaptureError::capture_failed(format!(
                "frame slot {} is a symlink",
                slot.display()
            ));
        }
        CaptureError::capture_failed(format!("volatile write to {} failed: {e}", slot.display()))
    })
}

/// A camera backend.
///
/// Implementors acquire the physical device in [`open`](Self::open), hand back
/// one encoded frame per [`read_frame`](Self::read_frame) call, and release the
/// device in [`close`](Self::close). Frame bytes must be returned in memory;
/// a device never writes them anywhere itself.
#[async_trait::async_trait]
pub trait FrameDevice: Send + Sync {
    /// Identifier for logging (device node, URL, ...).
    fn name(&self) -> String;

    /// Acquire the device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if the device can't be opened.
    fn open(&mut self) -> std::result::Result<(), CaptureError>;

    /// Read one encoded (JPEG) frame.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::CaptureFailed`] if no frame could be read, or
    /// [`CaptureError::DeviceNotOpen`] if called before `open`.
    async fn read_frame(&mut self) -> std::result::Result<Vec<u8>, CaptureError>;

    /// Release the device. Must be safe to call repeatedly.
    fn close(&mut self);

    /// Whether the device is currently held.
    fn is_open(&self) -> bool;
}

/// A V4L2 camera read through ffmpeg.
///
/// The device node is held open for the lifetime of the session to prove it
/// exists and is readable. Each frame is grabbed by an ffmpeg child whose
/// JPEG output is piped to our stdout buffer, so no intermediate file exists.
#[derive(Debug)]
pub struct FfmpegDevice {
    config: CameraConfig,
    node: Option<std::fs::File>,
}

impl FfmpegDevice {
    /// Create a device for the configured camera node.
    #[must_use]
    pub fn new(config: CameraConfig) -> Self {
        Self { config, node: None }
    }

    /// Arguments for a single-frame grab.
    fn grab_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "v4l2".to_string(),
            "-video_size".to_string(),
            format!("{}x{}", self.config.width, self.config.height),
            "-i".to_string(),
            self.config.device.display().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "mjpeg".to_string(),
            "-q:v".to_string(),
            jpeg_qscale(self.config.jpeg_quality).to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait::async_trait]
impl FrameDevice for FfmpegDevice {
    fn name(&self) -> String {
        self.config.device.display().to_string()
    }

    fn open(&mut self) -> std::result::Result<(), CaptureError> {
        if self.node.is_some() {
            return Ok(());
        }

        let node = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.config.device)
            .map_err(|e| CaptureError::device_unavailable(self.name(), e.to_string()))?;

        self.node = Some(node);
        info!(
            device = %self.config.device.display(),
            resolution = %format!("{}x{}", self.config.width, self.config.height),
            "Camera opened"
        );
        Ok(())
    }

    async fn read_frame(&mut self) -> std::result::Result<Vec<u8>, CaptureError> {
        if self.node.is_none() {
            return Err(CaptureError::DeviceNotOpen);
        }

        let child = Command::new(&self.config.ffmpeg_path)
            .args(self.grab_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::capture_failed(format!(
                    "failed to spawn {}: {e}",
                    self.config.ffmpeg_path.display()
                ))
            })?;

        let output = timeout(FRAME_READ_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                CaptureError::capture_failed(format!(
                    "frame grab timed out after {FRAME_READ_TIMEOUT:?}"
                ))
            })?
            .map_err(|e| CaptureError::capture_failed(format!("frame grab failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().next().unwrap_or("no diagnostic output");
            return Err(CaptureError::capture_failed(format!(
                "ffmpeg exited with code {}: {detail}",
                output.status.code().unwrap_or(-1)
            )));
        }

        Ok(output.stdout)
    }

    fn close(&mut self) {
        if self.node.take().is_some() {
            info!(device = %self.config.device.display(), "Camera released");
        }
    }

    fn is_open(&self) -> bool {
        self.node.is_some()
    }
}

/// Map a JPEG quality (1-100, higher is better) onto ffmpeg's `-q:v` scale
/// (2-31, lower is better).
#[must_use]
pub fn jpeg_qscale(quality: u8) -> u8 {
    let quality = u32::from(quality.clamp(1, 100));
    let scale = 2 + (100 - quality) * 29 / 99;
    u8::try_from(scale).unwrap_or(31)
}

/// Captures frames from a device into the volatile frame slot.
pub struct FrameSource {
    device: Box<dyn FrameDevice>,
    slot: PathBuf,
    last_digest: Option<String>,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("device", &self.device.name())
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl FrameSource {
    /// Create a frame source writing to `frame_file_name` inside `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting slot would not be inside the root.
    pub fn new(
        device: Box<dyn FrameDevice>,
        root: VolatileRoot,
        frame_file_name: &str,
    ) -> Result<Self> {
        let slot = root.slot(frame_file_name);
        if !root.contains(&slot) {
            return Err(Error::config_validation(format!(
                "frame slot {} is outside the volatile root {}",
                slot.display(),
                root.path().display()
            )));
        }

        Ok(Self {
            device,
            slot,
            last_digest: None,
        })
    }

    /// Get the frame slot path.
    #[must_use]
    pub fn slot(&self) -> &Path {
        &self.slot
    }

    /// Acquire the capture device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if the device can't be opened.
    pub fn open(&mut self) -> std::result::Result<(), CaptureError> {
        self.device.open()
    }

    /// Acquire the device for a scope; it is released when the lease drops.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if the device can't be
    /// opened. The device is released before the error is returned.
    pub fn lease(&mut self) -> std::result::Result<DeviceLease<'_>, CaptureError> {
        if let Err(e) = self.open() {
            self.release();
            return Err(e);
        }
        Ok(DeviceLease { source: self })
    }

    /// Capture one frame into the volatile slot, replacing any previous frame.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::CaptureFailed`] if the device read or the
    /// volatile write fails, and [`CaptureError::DeviceNotOpen`] if the device
    /// hasn't been opened.
    pub async fn capture(&mut self) -> std::result::Result<VolatileFrameHandle, CaptureError> {
        if !self.device.is_open() {
            return Err(CaptureError::DeviceNotOpen);
        }

        let frame = self.device.read_frame().await.map_err(|e| {
            warn!(error = %e, "Frame read failed");
            e
        })?;
        if frame.is_empty() {
            warn!("Device returned an empty frame");
            return Err(CaptureError::capture_failed("device returned no frame"));
        }

        write_slot(&self.slot, &frame).await?;

        let handle = VolatileFrameHandle::new(self.slot.clone(), &frame);
        drop(frame);

        if self.last_digest.as_deref() == Some(handle.digest.as_str()) {
            warn!(digest = handle.short_digest(), "Camera returned an identical frame; feed may be frozen");
        }
        self.last_digest = Some(handle.digest.clone());

        info!(
            path = %handle.path.display(),
            size_bytes = handle.size_bytes,
            digest = handle.short_digest(),
            "Frame captured"
        );
        Ok(handle)
    }

    /// Release the capture device. Safe to call at any time, any number of times.
    pub fn release(&mut self) {
        self.device.close();
        debug!(device = %self.device.name(), "Frame source released");
    }

    /// Whether the capture device is currently held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.device.is_open()
    }
}

/// Scoped acquisition of a [`FrameSource`]'s device.
///
/// Dereferences to the source; releases the device when dropped, on every
/// exit path.
#[derive(Debug)]
pub struct DeviceLease<'a> {
    source: &'a mut FrameSource,
}

impl Deref for DeviceLease<'_> {
    type Target = FrameSource;

    fn deref(&self) -> &Self::Target {
        self.source
    }
}

impl DerefMut for DeviceLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.source
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        self.source.release();
    }
}
