use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioBackend, CaptureConfig, CaptureStreams};
use super::encoder::FrameEncoder;
use super::level::VolumeMeter;
use crate::error::SparringError;

const FRAME_CHANNEL_CAPACITY: usize = 32;
const VOLUME_CHANNEL_CAPACITY: usize = 64;

/// Microphone capture via cpal.
///
/// The cpal stream lives on a dedicated thread because it is not `Send`.
/// The device callback converts and frames samples in place and posts the
/// results through bounded channels with `try_send`; it never blocks and
/// never allocates per sample. Dropped messages are counted, not waited on.
pub struct MicCapture {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicUsize::new(0)),
            worker: None,
        }
    }

    /// Frames or volume samples discarded because the control thread fell
    /// behind.
    pub fn dropped_messages(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Names of available input devices, for diagnostics.
    pub fn list_input_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.input_devices() {
            Ok(devices) => devices
                .map(|d| d.name().unwrap_or_else(|_| "<unknown>".to_string()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicCapture {
    async fn start(&mut self) -> Result<CaptureStreams, SparringError> {
        if self.running.load(Ordering::SeqCst) {
            // The live streams were handed out by the first start; a second
            // caller cannot receive them again.
            return Err(SparringError::Capture(
                "capture already started".to_string(),
            ));
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (volume_tx, volume_rx) = mpsc::channel(VOLUME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), SparringError>>();

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let dropped = Arc::clone(&self.dropped);
        running.store(true, Ordering::SeqCst);

        let worker = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                run_capture_thread(config, running, dropped, frame_tx, volume_tx, ready_tx);
            })
            .map_err(|e| SparringError::Capture(format!("failed to spawn audio thread: {e}")))?;

        // Wait for the stream to come up without blocking the control thread.
        let startup = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| SparringError::Capture(format!("audio thread startup failed: {e}")))?;

        match startup {
            Ok(Ok(())) => {
                self.worker = Some(worker);
                info!("microphone capture started ({} Hz)", self.config.sample_rate);
                Ok(CaptureStreams {
                    frames: frame_rx,
                    volume: volume_rx,
                })
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(SparringError::Capture(
                    "audio thread exited before starting".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }
        info!("microphone capture stopped");
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

fn run_capture_thread(
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    frame_tx: mpsc::Sender<super::backend::AudioFrame>,
    volume_tx: mpsc::Sender<f32>,
    ready_tx: std::sync::mpsc::Sender<Result<(), SparringError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(SparringError::Permission(
                "no default input device".to_string(),
            )));
            return;
        }
    };

    let stream_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut encoder = FrameEncoder::new(config.frame_samples, config.sample_rate);
    let mut meter = VolumeMeter::new(config.sample_rate, config.volume_window_ms);
    let cb_dropped = Arc::clone(&dropped);
    let err_running = Arc::clone(&running);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            encoder.push(data, |frame| {
                if frame_tx.try_send(frame).is_err() {
                    cb_dropped.fetch_add(1, Ordering::Relaxed);
                }
            });
            for &sample in data {
                if let Some(level) = meter.push(sample) {
                    if volume_tx.try_send(level).is_err() {
                        cb_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        },
        move |err| {
            // Device loss stops capture silently; receivers observe the
            // channel close as the stop signal.
            warn!("input stream error, stopping capture: {err}");
            err_running.store(false, Ordering::SeqCst);
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(SparringError::Permission(format!(
                "failed to open input stream: {e}"
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SparringError::Permission(format!(
            "failed to start input stream: {e}"
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }
    // Dropping the stream tears down the audio graph; the channel senders
    // drop with the callback and close both receivers.
    drop(stream);
}
