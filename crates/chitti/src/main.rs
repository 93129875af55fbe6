//! `chitti` - CLI for the zero-retention perception loop
//!
//! This binary wires the configured camera, inference service, speech engine
//! and retention auditor together and runs perception cycles.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use chitti::cli::{
    format_audit, format_cycle, format_summary, Cli, Command, ConfigCommand, RunCommand,
};
use chitti::{
    init_logging, Config, EspeakSpeaker, FfmpegDevice, FrameSource, PerceptionPipeline,
    PipelineSettings, RetentionAuditor, StopHandle, UsageProbe, VlmClient, VolatileRoot,
    VolumeUsageProbe,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), cli.log_format());

    // These must work even when the active configuration doesn't load.
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", Config::default_config_path().display());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return Ok(handle_validate(file.clone().or_else(|| cli.config.clone())));
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Cycle(cmd) => handle_cycle(&config, cmd.json).await,
        Command::Run(cmd) => handle_run(config, &cmd).await,
        Command::Audit(cmd) => handle_audit(&config, cmd.json),
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Config(ConfigCommand::Show { json }) => handle_show(&config, json),
        Command::Config(ConfigCommand::Path | ConfigCommand::Validate { .. }) => {
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Prepare the volatile root and assemble the pipeline.
fn build_pipeline(config: &Config) -> anyhow::Result<PerceptionPipeline> {
    let root = prepare_root(config)?;

    let source = FrameSource::new(
        Box::new(FfmpegDevice::new(config.camera.clone())),
        root.clone(),
        &config.volatile.frame_file_name,
    )?;
    let describer = VlmClient::new(&config.inference, root.clone());
    let speaker = EspeakSpeaker::new(config.speech.clone());
    let auditor = RetentionAuditor::new(
        Box::new(VolumeUsageProbe::new(&config.audit.mount_point)),
        root,
    );

    Ok(PerceptionPipeline::new(
        source,
        Box::new(describer),
        Box::new(speaker),
        auditor,
        PipelineSettings::from_config(config),
    ))
}

fn prepare_root(config: &Config) -> anyhow::Result<VolatileRoot> {
    let root = VolatileRoot::new(&config.volatile.root);
    root.prepare(config.volatile.require_ram_backed)
        .with_context(|| format!("volatile root {} is unusable", root.path().display()))?;
    Ok(root)
}

async fn handle_cycle(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let mut pipeline = build_pipeline(config)?;

    let Some(record) = pipeline.run_single_cycle().await? else {
        eprintln!("Cycle aborted: it could not be accounted for (see log)");
        return Ok(ExitCode::FAILURE);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", format_cycle(&record));
    }

    Ok(if record.retention_verified() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

async fn handle_run(mut config: Config, cmd: &RunCommand) -> anyhow::Result<ExitCode> {
    if let Some(delay_ms) = cmd.delay_ms {
        config.cycle.delay_ms = delay_ms;
    }
    if let Some(max_cycles) = cmd.max_cycles {
        config.cycle.max_cycles = max_cycles;
    }

    let mut pipeline = build_pipeline(&config)?;
    let stop = StopHandle::new();
    tokio::spawn(stop_on_signal(stop.clone()));

    let json = cmd.json;
    let summary = pipeline
        .run_continuous(config.max_cycles(), &stop, |n, record| match record {
            Some(record) if json => match serde_json::to_string(record) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize cycle record"),
            },
            Some(record) => print!("{}", format_cycle(record)),
            None => eprintln!("Cycle {n} aborted: it could not be accounted for (see log)"),
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }

    Ok(
        if summary.cycles_failed == 0 && summary.retention_violations == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        },
    )
}

/// Stop the run loop on Ctrl+C or SIGTERM.
async fn stop_on_signal(stop: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, stopping after the current cycle...");
        },
        () = terminate => {
            info!("Received SIGTERM, stopping after the current cycle...");
        },
    }
    stop.stop();
}

fn handle_audit(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let root = prepare_root(config)?;
    let slot = config.frame_path();
    let mut auditor = RetentionAuditor::new(
        Box::new(VolumeUsageProbe::new(&config.audit.mount_point)),
        root,
    );

    let record = auditor.enforce_slot(&slot)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Frame slot: {}", slot.display());
        print!("{}", format_audit(&record));
    }

    Ok(if record.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let root = VolatileRoot::new(&config.volatile.root);
    let root_exists = root.path().is_dir();
    let ram_backed = root.is_ram_backed().ok();
    let probe = VolumeUsageProbe::new(&config.audit.mount_point);
    let used_bytes = probe.used_bytes().ok();
    let camera_present = config.camera.device.exists();
    let speech_available = EspeakSpeaker::new(config.speech.clone()).probe().await;
    let frame_present = config.frame_path().exists();

    if json {
        let status = serde_json::json!({
            "platform": platform_name(),
            "volatile_root": root.path(),
            "volatile_root_exists": root_exists,
            "volatile_root_ram_backed": ram_backed,
            "frame_present": frame_present,
            "persistent_volume": config.audit.mount_point,
            "persistent_used_bytes": used_bytes,
            "camera_device": config.camera.device,
            "camera_present": camera_present,
            "speech_engine": config.speech.engine,
            "speech_available": speech_available,
            "inference_url": config.inference.url,
            "inference_model": config.inference.model,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("chitti status");
        println!("-------------");
        println!("Platform:          {}", platform_name());
        println!(
            "Volatile root:     {} ({})",
            root.path().display(),
            match (root_exists, ram_backed) {
                (false, _) => "missing",
                (true, Some(true)) => "RAM-backed",
                (true, Some(false)) => "NOT RAM-backed",
                (true, None) => "backing unknown",
            }
        );
        println!(
            "Frame slot:        {}",
            if frame_present { "occupied" } else { "empty" }
        );
        println!(
            "Persistent usage:  {} on {}",
            used_bytes.map_or_else(
                || "unavailable".to_string(),
                |b| format!("{:.3} GB", chitti::record::bytes_to_gb(i64::try_from(b).unwrap_or(i64::MAX)))
            ),
            config.audit.mount_point.display()
        );
        println!(
            "Camera:            {} ({})",
            config.camera.device.display(),
            if camera_present { "present" } else { "missing" }
        );
        println!(
            "Speech engine:     {} ({})",
            config.speech.engine.display(),
            if speech_available { "available" } else { "unavailable" }
        );
        println!(
            "Inference:         {} ({})",
            config.inference.url, config.inference.model
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_show(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("Current Configuration");
        println!("=====================");
        println!();
        println!("[Camera]");
        println!("  Device:             {}", config.camera.device.display());
        println!(
            "  Resolution:         {}x{}",
            config.camera.width, config.camera.height
        );
        println!("  JPEG quality:       {}", config.camera.jpeg_quality);
        println!();
        println!("[Volatile]");
        println!("  Root:               {}", config.volatile.root.display());
        println!("  Frame slot:         {}", config.frame_path().display());
        println!(
            "  Require RAM-backed: {}",
            config.volatile.require_ram_backed
        );
        println!();
        println!("[Inference]");
        println!("  URL:                {}", config.inference.url);
        println!("  Model:              {}", config.inference.model);
        println!("  Timeout (secs):     {}", config.inference.timeout_secs);
        println!("  Prompt:             {}", config.inference.prompt);
        println!();
        println!("[Speech]");
        println!("  Engine:             {}", config.speech.engine.display());
        println!("  Player:             {}", config.speech.player.display());
        println!("  Timeout (secs):     {}", config.speech.timeout_secs);
        println!();
        println!("[Audit]");
        println!("  Mount point:        {}", config.audit.mount_point.display());
        println!();
        println!("[Cycle]");
        println!("  Delay (ms):         {}", config.cycle.delay_ms);
        println!(
            "  Max cycles:         {}",
            config
                .max_cycles()
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_validate(path: Option<std::path::PathBuf>) -> ExitCode {
    let path = path.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Configuration error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_os = "linux")]
fn platform_name() -> &'static str {
    chitti_linux::platform_name()
}

#[cfg(not(target_os = "linux"))]
fn platform_name() -> &'static str {
    std::env::consts::OS
}
