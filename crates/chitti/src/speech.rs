//! Spoken output.
//!
//! [`EspeakSpeaker`] pipes synthesized audio from the engine's stdout straight
//! into the player's stdin, so the audio only ever exists in a kernel pipe.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;

/// Upper bound on the engine availability check.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces ephemeral audio from text.
#[async_trait::async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`, returning whether it was played.
    ///
    /// Empty or whitespace-only text is a no-op that returns `false`.
    async fn speak(&self, text: &str) -> bool;
}

/// espeak piped into aplay.
#[derive(Debug, Clone)]
pub struct EspeakSpeaker {
    config: SpeechConfig,
}

impl EspeakSpeaker {
    /// Create a speaker from configuration.
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        Self { config }
    }

    /// Check whether the speech engine can be run.
    pub async fn probe(&self) -> bool {
        let result = timeout(
            PROBE_TIMEOUT,
            Command::new(&self.config.engine)
                .arg("--version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;

        match result {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(engine = %self.config.engine.display(), error = %e, "Speech engine not runnable");
                false
            }
            Err(_) => false,
        }
    }

    fn engine_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = &self.config.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        if let Some(wpm) = self.config.words_per_minute {
            args.push("-s".to_string());
            args.push(wpm.to_string());
        }
        args.push("--stdin".to_string());
        args.push("--stdout".to_string());
        args
    }

    /// Run engine and player to completion.
    async fn play(&self, text: &str) -> Result<(), String> {
        let mut engine = Command::new(&self.config.engine)
            .args(self.engine_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.config.engine.display()))?;

        let audio: Stdio = engine
            .stdout
            .take()
            .ok_or("speech engine has no stdout")?
            .try_into()
            .map_err(|e| format!("failed to pipe speech audio: {e}"))?;

        let mut player = Command::new(&self.config.player)
            .arg("-q")
            .stdin(audio)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.config.player.display()))?;

        if let Some(mut stdin) = engine.stdin.take() {
            // An engine that exits early is judged by its exit status below.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                debug!(error = %e, "Speech engine closed its input early");
            }
        }

        let speech_timeout = self.config.timeout();
        let (engine_status, player_status) =
            timeout(speech_timeout, async { tokio::join!(engine.wait(), player.wait()) })
                .await
                .map_err(|_| format!("speech timed out after {speech_timeout:?}"))?;

        let engine_status = engine_status.map_err(|e| format!("speech engine failed: {e}"))?;
        let player_status = player_status.map_err(|e| format!("audio player failed: {e}"))?;

        if !engine_status.success() {
            return Err(format!(
                "speech engine exited with code {}",
                engine_status.code().unwrap_or(-1)
            ));
        }
        if !player_status.success() {
            return Err(format!(
                "audio player exited with code {}",
                player_status.code().unwrap_or(-1)
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Speaker for EspeakSpeaker {
    async fn speak(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            warn!("Nothing to speak");
            return false;
        }

        let started = Instant::now();
        match self.play(text).await {
            Ok(()) => {
                info!(
                    text_length = text.len(),
                    duration_ms = started.elapsed().as_millis(),
                    "Speech completed"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Speech failed");
                false
            }
        }
    }
}
