use anyhow::Result;
use clap::Parser;
use sparring::audio::{AudioBackend, CaptureConfig, MicCapture};
use sparring::Config;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sparring", about = "Real-time debate rehearsal core")]
struct Cli {
    /// Config file (without extension), resolved by the config crate.
    #[arg(long, default_value = "config/sparring")]
    config: String,

    /// List available input devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Capture the microphone for N seconds, logging volume and frames.
    #[arg(long, value_name = "SECS")]
    mic_check: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("no config at {} ({e}); using defaults", cli.config);
            Config::default()
        }
    };

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "audio: {} Hz, {} samples/frame; debate {}s, closing {}s (cutoff {}s)",
        cfg.audio.sample_rate,
        cfg.audio.frame_samples,
        cfg.policy.debate_duration_secs,
        cfg.policy.closing_timer_start_secs,
        cfg.policy.overtime_cutoff_secs,
    );

    if cli.list_devices {
        let devices = MicCapture::list_input_devices();
        if devices.is_empty() {
            info!("no input devices found");
        }
        for name in devices {
            info!("input device: {name}");
        }
        return Ok(());
    }

    if let Some(secs) = cli.mic_check {
        return mic_check(&cfg, secs).await;
    }

    info!("this binary is a diagnostics shell; embed the library to run sessions");
    Ok(())
}

/// Run capture briefly and report what comes out of it.
async fn mic_check(cfg: &Config, secs: u64) -> Result<()> {
    let capture_config = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        frame_samples: cfg.audio.frame_samples,
        volume_window_ms: cfg.audio.volume_window_ms,
    };
    let mut capture = MicCapture::new(capture_config);
    let mut streams = capture.start().await?;

    info!("mic check for {secs}s; speak into the microphone");

    let mut frames = 0usize;
    let mut peak = 0.0f32;
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(secs);

    loop {
        tokio::select! {
            Some(frame) = streams.frames.recv() => {
                frames += 1;
                if frames % 8 == 0 {
                    info!("{} frames ({} samples each)", frames, frame.samples.len());
                }
            }
            Some(level) = streams.volume.recv() => {
                if level > peak {
                    peak = level;
                    info!("peak volume {peak:.3}");
                }
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    capture.stop().await;
    info!("mic check done: {frames} frames, peak volume {peak:.3}");
    if frames == 0 {
        warn!("no frames captured; check microphone permissions");
    }
    Ok(())
}
